//! Source adapters. Source resolution, the adapter trait, the shared fetch client, and the
//! per-site implementations.

mod client;
mod document;
mod error;
pub mod normalize;

pub mod novelbin;
pub mod royalroad;

pub use client::{FetchOptions, HtmlClient, HtmlClientBuilder, Page, DEFAULT_USER_AGENT};
pub use document::{Document, Element, Lookup};
pub use error::ScraperError;

use crate::model::{Chapter, Novel};
use async_trait::async_trait;
use std::fmt;
use tracing::{debug, warn};

/// Markup removed from chapter containers before their HTML is returned.
pub(crate) const NON_CONTENT_SELECTOR: &str = "script, style, div[id^=pf-]";

/// Known source sites. Resolution order is the declaration order of [`Source::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    RoyalRoad,
    NovelBin,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::RoyalRoad, Source::NovelBin];

    /// Short name, also stored as `Novel::source_id`.
    pub fn id(self) -> &'static str {
        match self {
            Source::RoyalRoad => "royalroad",
            Source::NovelBin => "novelbin",
        }
    }

    pub fn domain(self) -> &'static str {
        match self {
            Source::RoyalRoad => "royalroad.com",
            Source::NovelBin => "novelbin.me",
        }
    }

    pub fn base_url(self) -> &'static str {
        match self {
            Source::RoyalRoad => royalroad::ROYALROAD_BASE,
            Source::NovelBin => novelbin::NOVELBIN_BASE,
        }
    }

    fn matches(self, identifier: &str) -> bool {
        let ident = identifier.trim().to_lowercase();
        ident.contains(self.domain()) || ident == self.id()
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Resolve a source from a URL or short name (case-insensitive). First match wins.
/// Never defaults: an unmatched identifier is [`ScraperError::UnknownSource`].
pub fn resolve_source(identifier: &str) -> Result<Source, ScraperError> {
    Source::ALL
        .into_iter()
        .find(|s| s.matches(identifier))
        .ok_or_else(|| ScraperError::UnknownSource {
            identifier: identifier.to_string(),
        })
}

/// Build the adapter for `source` on top of `client`.
pub fn adapter_for(source: Source, client: HtmlClient) -> Box<dyn NovelSource> {
    match source {
        Source::RoyalRoad => Box::new(royalroad::RoyalRoadScraper::new(client)),
        Source::NovelBin => Box::new(novelbin::NovelBinScraper::new(client)),
    }
}

/// Factory: resolve `identifier` (URL or short name) to its adapter.
pub fn resolve(identifier: &str, client: HtmlClient) -> Result<Box<dyn NovelSource>, ScraperError> {
    let source = resolve_source(identifier)?;
    debug!(identifier, source = %source, "resolved source");
    Ok(adapter_for(source, client))
}

/// Catalog ranking. A source without a listing for the requested mode uses its closest one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RankMode {
    #[default]
    Latest,
    Popular,
    BestRated,
}

/// Optional catalog filters. Filters a source does not support are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFilters {
    pub genre: Option<String>,
    pub completed: bool,
    pub rank: RankMode,
}

/// Contract implemented once per source site.
///
/// Bulk operations (catalog pages, search) never fail: a broken page yields an empty list.
/// Single-item operations propagate fetch errors, except HTTP 429, which is never an error:
/// details fall back to a default-valued novel, and chapter lists and content come back empty.
/// Document order is preserved end to end.
#[async_trait]
pub trait NovelSource: Send + Sync {
    fn source(&self) -> Source;

    /// First page of the default listing.
    async fn fetch_novels(&self) -> Vec<Novel> {
        self.fetch_catalog_page(1, &CatalogFilters::default()).await
    }

    async fn fetch_catalog_page(&self, page: u32, filters: &CatalogFilters) -> Vec<Novel>;

    /// Query the site's own search endpoint.
    async fn search(&self, query: &str, page: u32) -> Vec<Novel>;

    /// Full metadata for one novel. A rate-limited page yields a default-valued novel.
    async fn fetch_novel_details(&self, novel_url: &str) -> Result<Novel, ScraperError>;

    async fn fetch_novel_chapters(&self, novel_url: &str) -> Result<Vec<Chapter>, ScraperError>;

    /// Inner HTML of the chapter's content container, or empty if none matches.
    async fn fetch_chapter_content(&self, chapter_url: &str) -> Result<String, ScraperError>;
}

/// Fetch a listing page and parse it with `parse`; any fetch error becomes an empty page.
pub(crate) async fn fetch_listing<F>(client: &HtmlClient, url: &str, parse: F) -> Vec<Novel>
where
    F: FnOnce(&Page) -> Vec<Novel>,
{
    match client.fetch(url, &FetchOptions::default()).await {
        Ok(page) => {
            let novels = parse(&page);
            debug!(url, count = novels.len(), "parsed listing");
            novels
        }
        Err(e) => {
            warn!(url, error = %e, "listing fetch failed; returning no novels");
            Vec::new()
        }
    }
}

/// Fetch a page for a single-item operation, mapping HTTP 429 to `Ok(None)`.
pub(crate) async fn fetch_tolerating_rate_limit(
    client: &HtmlClient,
    url: &str,
    options: &FetchOptions,
) -> Result<Option<Page>, ScraperError> {
    match client.fetch(url, options).await {
        Ok(page) => Ok(Some(page)),
        Err(e) if e.is_rate_limited() => {
            warn!(url, "rate limited; returning empty result");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Shared content fetch: first matching container, noise stripped, empty string on 429 or no match.
pub(crate) async fn fetch_content(
    client: &HtmlClient,
    url: &str,
    containers: &[&str],
) -> Result<String, ScraperError> {
    let Some(page) = fetch_tolerating_rate_limit(client, url, &FetchOptions::default()).await?
    else {
        return Ok(String::new());
    };
    Ok(extract_content(&page, containers))
}

fn extract_content(page: &Page, containers: &[&str]) -> String {
    let mut doc = page.document();
    match doc.inner_html_stripped(containers, NON_CONTENT_SELECTOR) {
        Some(html) => {
            debug!(url = %page.url, bytes = html.len(), "extracted chapter content");
            html
        }
        None => {
            debug!(url = %page.url, "no chapter content container found");
            String::new()
        }
    }
}
