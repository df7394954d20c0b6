//! Async HTTP client shared by every adapter. One GET per call: no delay, retry, or cache.

use crate::scraper::document::Document;
use crate::scraper::error::ScraperError;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{StatusCode, Url};
use std::time::Duration;
use tracing::debug;

/// Desktop browser signature. Both sources serve degraded markup (or refuse) to library defaults.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: usize = 10;

/// Per-request options for [`HtmlClient::fetch`].
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Overrides the client's User-Agent for this request only.
    pub user_agent: Option<String>,
    /// Accept bodies whose Content-Type is not HTML/XML/text (e.g. JSON fragments from AJAX endpoints).
    pub accept_non_html: bool,
}

impl FetchOptions {
    pub fn accept_non_html() -> Self {
        Self {
            accept_non_html: true,
            ..Self::default()
        }
    }
}

/// A fetched page: final URL after redirects, and the raw body.
///
/// The body is kept as text so callers can both run regexes over the raw source and
/// build a [`Document`]. Documents are not `Send`, so they are built on demand and
/// never held across an `.await`.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub body: String,
}

impl Page {
    /// Parse the body into a queryable document whose relative URLs resolve against [`Page::url`].
    pub fn document(&self) -> Document {
        Document::parse(&self.body, Some(self.url.clone()))
    }
}

/// Async HTTP client with a browser-like User-Agent and a bounded timeout. Cheap to clone.
#[derive(Debug, Clone)]
pub struct HtmlClient {
    inner: reqwest::Client,
}

impl HtmlClient {
    /// Build a client with default User-Agent and timeout.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    pub fn builder() -> HtmlClientBuilder {
        HtmlClientBuilder::default()
    }

    /// GET `url` and return the page.
    ///
    /// HTTP 429 maps to [`ScraperError::RateLimited`]; any other non-2xx status to
    /// [`ScraperError::HttpStatus`]. Unless `options.accept_non_html` is set, a body
    /// with a non-HTML Content-Type is rejected.
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<Page, ScraperError> {
        let parsed = Url::parse(url).map_err(|e| ScraperError::InvalidUrl {
            input: url.to_string(),
            reason: e.to_string(),
        })?;
        let mut request = self.inner.get(parsed);
        if let Some(ref ua) = options.user_agent {
            request = request.header(USER_AGENT, ua.as_str());
        }
        debug!(url, "GET");
        let response = request.send().await.map_err(|e| ScraperError::Network {
            url: url.to_string(),
            source: e,
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ScraperError::RateLimited {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(ScraperError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        if !options.accept_non_html {
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            if let Some(ct) = content_type {
                if !is_markup_content_type(ct) {
                    return Err(ScraperError::UnsupportedContentType {
                        url: url.to_string(),
                        content_type: ct.to_string(),
                    });
                }
            }
        }

        let final_url = response.url().clone();
        let body = response.text().await.map_err(|e| ScraperError::BodyRead {
            url: url.to_string(),
            source: e,
        })?;
        debug!(url = %final_url, status = status.as_u16(), bytes = body.len(), "fetched");
        Ok(Page {
            url: final_url,
            body,
        })
    }
}

/// text/*, application/xml, and application/*+xml. A missing header is accepted by the caller.
fn is_markup_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime.starts_with("text/")
        || mime == "application/xml"
        || (mime.starts_with("application/") && mime.ends_with("+xml"))
}

/// Builder for [`HtmlClient`] with optional User-Agent and timeout.
#[derive(Debug)]
pub struct HtmlClientBuilder {
    user_agent: Option<String>,
    timeout_secs: u64,
}

impl Default for HtmlClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl HtmlClientBuilder {
    /// Set a custom User-Agent. If not set, [`DEFAULT_USER_AGENT`] is used.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set request timeout in seconds. Default 30.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs.max(1);
        self
    }

    pub fn build(self) -> Result<HtmlClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(HtmlClient { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_content_types_accepted() {
        assert!(is_markup_content_type("text/html; charset=utf-8"));
        assert!(is_markup_content_type("TEXT/HTML"));
        assert!(is_markup_content_type("text/plain"));
        assert!(is_markup_content_type("application/xhtml+xml"));
        assert!(is_markup_content_type("application/xml"));
    }

    #[test]
    fn non_markup_content_types_rejected() {
        assert!(!is_markup_content_type("application/json"));
        assert!(!is_markup_content_type("image/png"));
        assert!(!is_markup_content_type(""));
    }

    #[test]
    fn default_user_agent_looks_like_a_browser() {
        assert!(DEFAULT_USER_AGENT.starts_with("Mozilla/5.0"));
        assert!(DEFAULT_USER_AGENT.contains("Chrome"));
    }

    #[test]
    fn builder_clamps_zero_timeout() {
        let b = HtmlClient::builder().timeout_secs(0);
        assert_eq!(b.timeout_secs, 1);
    }

    #[test]
    fn fetch_options_accept_non_html_sets_flag_only() {
        let o = FetchOptions::accept_non_html();
        assert!(o.accept_non_html);
        assert!(o.user_agent.is_none());
    }
}
