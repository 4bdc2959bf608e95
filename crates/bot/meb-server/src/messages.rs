//! Localized bot texts.
//!
//! Catalogues are TOML files embedded at build time. A user's language code is
//! matched on its primary subtag (`ru-RU` selects `ru`), falling back to
//! English for anything unknown.

use serde::Deserialize;
use std::collections::HashMap;

const EMAIL_PLACEHOLDER: &str = "{email}";

const EMBEDDED: &[(&str, &str)] = &[
    ("en", include_str!("../locales/en.toml")),
    ("ru", include_str!("../locales/ru.toml")),
];

/// One language's texts. Fields documented as MarkdownV2 are pre-escaped.
#[derive(Debug, Clone, Deserialize)]
pub struct Catalogue {
    pub error: String,
    pub unknown_command: String,
    pub authorize_first: String,
    pub start_button: String,
    pub email_keep_button: String,
    pub email_activated: String,
    pub inline_generate_button: String,
    pub inline_generated: String,
    /// MarkdownV2
    pub start: String,
    /// MarkdownV2, with an `{email}` placeholder inside a code span
    email: String,
    /// MarkdownV2, with an `{email}` placeholder inside a code span
    email_without_disclaimer: String,
    /// MarkdownV2
    pub authorization_complete: String,
    /// MarkdownV2
    pub authorization_failed: String,
}

impl Catalogue {
    /// The alias announcement, including the keep-it disclaimer.
    pub fn email(&self, email: &str) -> String {
        self.email
            .trim_end()
            .replace(EMAIL_PLACEHOLDER, &escape_code(email))
    }

    pub fn email_without_disclaimer(&self, email: &str) -> String {
        self.email_without_disclaimer
            .trim_end()
            .replace(EMAIL_PLACEHOLDER, &escape_code(email))
    }
}

/// All embedded catalogues.
#[derive(Debug, Clone)]
pub struct Messages {
    fallback: Catalogue,
    catalogues: HashMap<String, Catalogue>,
}

impl Messages {
    /// Parse the embedded catalogues.
    pub fn embedded() -> Result<Self, toml::de::Error> {
        let mut catalogues = HashMap::new();
        for (language, source) in EMBEDDED {
            let mut catalogue: Catalogue = toml::from_str(source)?;
            catalogue.start = catalogue.start.trim_end().to_string();
            catalogues.insert(language.to_string(), catalogue);
        }

        let fallback = catalogues
            .get("en")
            .cloned()
            .ok_or_else(|| <toml::de::Error as serde::de::Error>::custom("missing English catalogue"))?;

        Ok(Self {
            fallback,
            catalogues,
        })
    }

    /// The catalogue for an IETF language tag.
    pub fn for_language(&self, language_code: &str) -> &Catalogue {
        let primary = language_code
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        self.catalogues.get(&primary).unwrap_or(&self.fallback)
    }
}

/// Escape text for use inside a MarkdownV2 code span.
pub fn escape_code(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '`' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
