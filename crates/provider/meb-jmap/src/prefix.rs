//! Derivation of a masked email prefix from a target site.
//!
//! The heuristic is deliberately approximate: it picks the second-to-last host
//! label, which is wrong for multi-label public suffixes (`example.co.uk`
//! yields `co`).

use crate::error::{JmapError, JmapResult};
use url::{Host, Url};

/// Label remaps applied after the host label is picked.
const REMAPS: &[(&str, &str)] = &[("fastmail", "mail"), ("github", "dev")];

/// Prefix used when the host is a literal IP address.
const IP_ADDRESS_PREFIX: &str = "ipaddr";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPrefix {
    /// `scheme://host[:port]` of the target, without path, query or user info.
    pub for_domain: String,
    pub email_prefix: String,
}

/// Derive the `forDomain` and email prefix for a URL-like target.
///
/// Input without a scheme is read as `https://` + input.
pub fn email_prefix_for(target: &str) -> JmapResult<TargetPrefix> {
    let url = parse_target(target.trim())?;
    let host = url
        .host()
        .ok_or_else(|| JmapError::InvalidTarget(format!("no host in {target:?}")))?;

    let for_domain = match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    };

    let label = match host {
        Host::Ipv4(_) | Host::Ipv6(_) => IP_ADDRESS_PREFIX.to_string(),
        Host::Domain(domain) => pick_label(domain),
    };

    let remapped = REMAPS
        .iter()
        .find(|(from, _)| *from == label)
        .map(|(_, to)| (*to).to_string())
        .unwrap_or(label);

    let email_prefix = remapped
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    Ok(TargetPrefix {
        for_domain,
        email_prefix,
    })
}

fn parse_target(target: &str) -> JmapResult<Url> {
    if target.is_empty() {
        return Err(JmapError::InvalidTarget("empty target".to_string()));
    }

    match Url::parse(target) {
        Ok(url) if url.host().is_some() => Ok(url),
        // `example.com:8080` parses with `example.com` as the scheme.
        Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) if !target.contains("://") => {
            Url::parse(&format!("https://{target}"))
                .map_err(|e| JmapError::InvalidTarget(format!("{target:?}: {e}")))
        }
        Ok(url) => Ok(url),
        Err(e) => Err(JmapError::InvalidTarget(format!("{target:?}: {e}"))),
    }
}

fn pick_label(domain: &str) -> String {
    let labels: Vec<&str> = domain.split('.').collect();
    match labels.len() {
        0..=2 => labels.first().copied().unwrap_or_default().to_string(),
        n => labels[n - 2].to_string(),
    }
}
