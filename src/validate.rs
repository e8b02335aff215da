mod utils;

use crate::error::{Error, Result};
use url::Url;

pub use utils::validate_non_empty;

/// Sites the bot advertises. Matched as plain substrings of the message.
pub const SUPPORTED_DOMAINS: &[&str] = &[
    "vimeo.com",
    "instagram.com",
    "tiktok.com",
    "dailymotion.com",
    "facebook.com",
    "xvideos.com",
];

const SCHEMES: &[&str] = &["http://", "https://"];

/// Trait for validating platform-specific identifiers (e.g., shortcodes, URLs)
/// extracted from user input.
///
/// Implementors should:
/// - Check format (e.g., scheme, allowed domains).
/// - Canonicalize if needed (e.g., trim surrounding whitespace).
/// - Return `Ok(canonical_id)` on success or `Err(Error::InvalidUrl(...))` on failure.
pub trait Validate {
    /// Validate the input and return a canonicalized String.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` when the input is rejected.
    fn validate(&self, input: &str) -> Result<String>;
}

/// Accepts anything with an http(s) scheme that mentions a supported domain.
///
/// The domain check is a substring match, so a supported domain appearing in a
/// query string is accepted as well. This is not a security boundary; yt-dlp
/// decides what it can actually fetch.
#[must_use]
pub fn is_valid(text: &str) -> bool {
    SCHEMES.iter().any(|scheme| text.starts_with(scheme))
        && SUPPORTED_DOMAINS.iter().any(|domain| text.contains(domain))
}

/// Host part of the URL, for log fields only.
#[must_use]
pub fn host_of(text: &str) -> Option<String> {
    Url::parse(text)
        .ok()
        .and_then(|u| u.host_str().map(ToOwned::to_owned))
}

/// Validator for the supported video sites.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupportedUrl;

impl Validate for SupportedUrl {
    fn validate(&self, input: &str) -> Result<String> {
        let url = validate_non_empty(input)?;
        if !is_valid(url) {
            return Err(Error::invalid_url(url));
        }
        Ok(url.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_supported_urls() {
        assert!(is_valid("https://vimeo.com/12345"));
        assert!(is_valid("http://www.dailymotion.com/video/x7tgad0"));
        assert!(is_valid("https://www.tiktok.com/@user/video/1"));
    }

    #[test]
    fn rejects_missing_scheme() {
        assert!(!is_valid("not a url"));
        assert!(!is_valid("vimeo.com/12345"));
        assert!(!is_valid("ftp://vimeo.com/12345"));
        assert!(!is_valid(" https://vimeo.com/12345"));
    }

    #[test]
    fn rejects_unsupported_domain() {
        assert!(!is_valid("https://example.com/watch?v=1"));
        assert!(!is_valid("https://youtube.com/watch?v=1"));
    }

    #[test]
    fn domain_in_query_string_is_accepted() {
        assert!(is_valid("https://example.com/?ref=vimeo.com"));
    }

    #[test]
    fn validator_trims_input() {
        let url = SupportedUrl.validate("  https://vimeo.com/12345\n").unwrap();
        assert_eq!(url, "https://vimeo.com/12345");
    }

    #[test]
    fn validator_rejects_blank_and_invalid() {
        assert!(matches!(
            SupportedUrl.validate("   "),
            Err(Error::InvalidUrl(_))
        ));
        assert!(matches!(
            SupportedUrl.validate("hello"),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn host_of_parses_url() {
        assert_eq!(
            host_of("https://vimeo.com/12345").as_deref(),
            Some("vimeo.com")
        );
        assert_eq!(host_of("not a url"), None);
    }
}
