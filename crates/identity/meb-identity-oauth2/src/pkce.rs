//! PKCE (RFC 7636) material and one-time state generation.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use meb_core::{Error, Result};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use tracing::error;

/// Random bytes behind a code verifier (64 hex characters).
pub const CODE_VERIFIER_BYTES: usize = 32;

/// Random bytes behind a state parameter (48 hex characters).
pub const STATE_BYTES: usize = 24;

pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// PKCE code challenge and verifier
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl PkceChallenge {
    /// Generate a new verifier from the OS random source.
    pub fn generate() -> Result<Self> {
        let code_verifier = random_hex(CODE_VERIFIER_BYTES)?;
        let code_challenge = code_challenge(&code_verifier);

        Ok(Self {
            code_verifier,
            code_challenge,
        })
    }
}

/// `len` bytes from the OS random source, hex encoded.
///
/// A failing source is reported, never retried or replaced.
pub fn random_hex(len: usize) -> Result<String> {
    let mut bytes = vec![0u8; len];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
        error!("OS random source failed: {}", e);
        Error::RandomGeneration(e.to_string())
    })?;
    Ok(hex::encode(bytes))
}

/// base64url-no-padding(SHA-256(verifier))
pub fn code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_pkce_generation() {
        let pkce1 = PkceChallenge::generate().unwrap();
        let pkce2 = PkceChallenge::generate().unwrap();

        assert_ne!(pkce1.code_verifier, pkce2.code_verifier);
        assert_ne!(pkce1.code_challenge, pkce2.code_challenge);

        assert_eq!(pkce1.code_verifier.len(), 64);
        assert!(pkce1.code_verifier.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(pkce1.code_challenge, code_challenge(&pkce1.code_verifier));
    }

    #[test]
    fn test_state_length() {
        let state = random_hex(STATE_BYTES).unwrap();
        assert_eq!(state.len(), 48);
    }

    #[test]
    fn test_rfc7636_appendix_b_vector() {
        assert_eq!(
            code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_challenge_of_empty_and_long_verifiers() {
        // SHA-256 of the empty string.
        assert_eq!(code_challenge(""), "47DEQpj8HBSa-_TImW-5JCeuQeRkm5NMpJWZG3hSuFU");

        let long = "a".repeat(1 << 20);
        let challenge = code_challenge(&long);
        assert_eq!(challenge.len(), 43);
        assert!(!challenge.contains('='));
        assert!(!challenge.contains('+') && !challenge.contains('/'));
        assert_eq!(challenge, URL_SAFE_NO_PAD.encode(Sha256::digest(long.as_bytes())));
    }

    #[test]
    fn test_verifiers_do_not_repeat() {
        let mut seen = HashSet::new();
        for _ in 0..100_000 {
            assert!(seen.insert(random_hex(CODE_VERIFIER_BYTES).unwrap()));
        }
    }
}
