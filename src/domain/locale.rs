//! Reader locale used to select cached content variants.

use std::fmt;

use super::error::DomainError;

/// Normalized language tag such as `en-us` or `fr`.
///
/// Tags compare case-insensitively, so they are stored lowercased with `-`
/// as the only separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale(String);

impl Locale {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let normalized = raw.trim().replace('_', "-").to_ascii_lowercase();
        let valid = !normalized.is_empty()
            && normalized.split('-').all(|part| {
                !part.is_empty() && part.len() <= 8 && part.chars().all(|c| c.is_ascii_alphanumeric())
            });
        if !valid {
            return Err(DomainError::validation(format!(
                "`{raw}` is not a language tag"
            )));
        }
        Ok(Self(normalized))
    }

    /// Pick the locale for a request from its `Accept-Language` value.
    ///
    /// Only the first listed range is considered; quality weights are ignored
    /// and `*` or malformed values fall back to `default`.
    pub fn from_accept_language(header: Option<&str>, default: &Locale) -> Locale {
        header
            .and_then(|value| value.split(',').next())
            .map(|range| range.split(';').next().unwrap_or(range).trim())
            .filter(|range| !range.is_empty() && *range != "*")
            .and_then(|range| Locale::parse(range).ok())
            .unwrap_or_else(|| default.clone())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
