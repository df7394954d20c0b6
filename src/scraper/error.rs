//! Shared error type for the fetch client, adapters, and source resolution.

use thiserror::Error;

/// Errors raised by the scraping core.
///
/// Only [`ScraperError::UnknownSource`] and the fetch family ever reach callers;
/// missing selectors are never an error (every extraction has a default).
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Invalid URL: {input}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("No source adapter matches '{identifier}'. Known sources: royalroad, novelbin.")]
    UnknownSource { identifier: String },

    #[error("Network error: could not reach {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP 429. Adapter operations never return this; they degrade to an empty or default result.
    #[error("Rate limited (HTTP 429) when fetching: {url}")]
    RateLimited { url: String },

    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Unsupported content type '{content_type}' at {url}")]
    UnsupportedContentType { url: String, content_type: String },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ScraperError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ScraperError::RateLimited { .. })
    }

    /// True for transport, status, and body failures (everything except resolution and URL errors).
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            ScraperError::Network { .. }
                | ScraperError::RateLimited { .. }
                | ScraperError::HttpStatus { .. }
                | ScraperError::UnsupportedContentType { .. }
                | ScraperError::BodyRead { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_is_a_fetch_error() {
        let e = ScraperError::RateLimited {
            url: "https://www.royalroad.com/x".into(),
        };
        assert!(e.is_rate_limited());
        assert!(e.is_fetch_error());
    }

    #[test]
    fn unknown_source_is_not_a_fetch_error() {
        let e = ScraperError::UnknownSource {
            identifier: "example.com".into(),
        };
        assert!(!e.is_fetch_error());
        assert!(!e.is_rate_limited());
        assert!(e.to_string().contains("example.com"));
    }

    #[test]
    fn http_status_message_names_status_and_url() {
        let e = ScraperError::HttpStatus {
            status: 503,
            url: "https://novelbin.me/x".into(),
        };
        assert_eq!(e.to_string(), "HTTP 503 when fetching: https://novelbin.me/x");
        assert!(!e.is_rate_limited());
    }
}
