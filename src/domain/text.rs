//! Small string helpers shared by the cache and HTTP layers.

use super::error::DomainError;

/// Characters rejected in file names on any platform we deploy to.
const INVALID_FILE_NAME_CHARS: &[char] = &['"', '<', '>', '|', ':', '*', '?', '\\', '/'];

/// True when `value` is a non-empty run of ASCII digits.
pub fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Text before the first occurrence of `needle`, or all of `value`.
pub fn left_before<'a>(value: &'a str, needle: &str) -> &'a str {
    value.split_once(needle).map_or(value, |(head, _)| head)
}

/// Strip characters that are not allowed in file names.
pub fn safe_file_name(text: &str) -> Result<String, DomainError> {
    if text.is_empty() {
        return Err(DomainError::invalid_argument("text"));
    }

    Ok(text
        .chars()
        .filter(|c| !c.is_control() && !INVALID_FILE_NAME_CHARS.contains(c))
        .collect())
}
