//! Royal Road adapter. Latest-updates and best-rated rankings with a genre filter; the chapter
//! list is decoded from the `window.chapters` array embedded in the fiction page.

use crate::model::{Chapter, Novel};
use crate::scraper::document::{Document, Lookup};
use crate::scraper::normalize::{
    derive_id, parse_listing, placeholder_novel, strip_html_tags, strip_title_site_suffix, ListingLayout,
    UNKNOWN_AUTHOR, UNKNOWN_TITLE,
};
use crate::scraper::{
    fetch_content, fetch_listing, fetch_tolerating_rate_limit, CatalogFilters, FetchOptions,
    HtmlClient, NovelSource, Page, RankMode, ScraperError, Source,
};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

pub const ROYALROAD_BASE: &str = "https://www.royalroad.com";

const TITLE_SUFFIXES: &[&str] = &[" _ Royal Road", " - Royal Road", " | Royal Road"];

/// Status labels shown in the fiction header; other labels there are content warnings.
const KNOWN_STATUSES: &[&str] = &["ONGOING", "COMPLETED", "HIATUS", "STUB", "DROPPED", "INACTIVE"];

static CHAPTERS_ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"window\.chapters\s*=\s*\[").expect("valid regex"));

const LISTING: ListingLayout = ListingLayout {
    item: ".fiction-list-item",
    title_anchor: ".fiction-title > a",
    author: ".author",
    blurb: ".fiction-description",
    blurb_prefix: "",
    tags: Some("span.tags a.fiction-tag"),
    cover: &[
        Lookup::AbsUrl("figure.col-sm-2 img[data-type=cover]", "src"),
        Lookup::AbsUrl("img[data-type=cover]", "src"),
    ],
};

const TITLE: &[Lookup] = &[
    Lookup::Text("h1.profile-title"),
    Lookup::Text(".fic-title h1"),
    Lookup::Attr("meta[name=\"twitter:title\"]", "content"),
    Lookup::Attr("meta[property=\"og:title\"]", "content"),
];
const AUTHOR: &[Lookup] = &[
    Lookup::Attr("meta[property=\"books:author\"]", "content"),
    Lookup::Attr("meta[name=\"twitter:creator\"]", "content"),
    Lookup::Text(".fic-title h4 a"),
];
const COVER: &[Lookup] = &[Lookup::AbsUrl("meta[property=\"og:image\"]", "content")];
const DESCRIPTION_META: &[Lookup] = &[
    Lookup::Attr("meta[name=description]", "content"),
    Lookup::Attr("meta[property=\"og:description\"]", "content"),
];

const CONTENT_CONTAINERS: &[&str] = &["#chapter-content", ".chapter-content", ".chapter-inner"];

/// Royal Road scraper. Holds only a client handle and the site base, so calls may run concurrently.
#[derive(Debug, Clone)]
pub struct RoyalRoadScraper {
    client: HtmlClient,
    base: String,
}

/// One entry of the embedded `window.chapters` array.
///
/// Only `title` and `url` are used. Every field is optional and a field of unexpected shape
/// decodes to `None`, so upstream schema drift never drops the whole list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChapterEntry {
    #[serde(deserialize_with = "lenient")]
    pub id: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub volume_id: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub slug: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub date: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub order: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub visible: Option<i64>,
    /// Opaque; never interpreted.
    pub subscription_tiers: Option<serde_json::Value>,
    #[serde(deserialize_with = "lenient")]
    pub does_not_roll_over: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub is_unlocked: Option<bool>,
    /// Site-relative chapter URL.
    #[serde(deserialize_with = "lenient")]
    pub url: Option<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// The `@type: Book` JSON-LD block of a fiction page.
#[derive(Debug, Default)]
struct LdBook {
    name: Option<String>,
    author: Option<String>,
    description: Option<String>,
    image: Option<String>,
}

impl RoyalRoadScraper {
    pub fn new(client: HtmlClient) -> Self {
        Self::with_base_url(client, ROYALROAD_BASE)
    }

    /// Point the adapter at another origin (tests).
    pub fn with_base_url(client: HtmlClient, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { client, base }
    }

    fn catalog_url(&self, page: u32, filters: &CatalogFilters) -> String {
        let listing = match filters.rank {
            RankMode::Latest => "latest-updates",
            RankMode::Popular | RankMode::BestRated => "best-rated",
        };
        let genre = filters
            .genre
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(|g| format!("genre={}&", urlencoding::encode(g)))
            .unwrap_or_default();
        format!(
            "{}/fictions/{}?{}page={}",
            self.base,
            listing,
            genre,
            page.max(1)
        )
    }

    fn search_url(&self, query: &str, page: u32) -> String {
        format!(
            "{}/fictions/search?title={}&globalFilters=true&page={}",
            self.base,
            urlencoding::encode(query),
            page.max(1)
        )
    }
}

fn parse_catalog(page: &Page) -> Vec<Novel> {
    parse_listing(&page.document(), &LISTING, Source::RoyalRoad)
}

/// First `application/ld+json` script whose `@type` is `Book`.
fn json_ld_book(doc: &Document) -> Option<LdBook> {
    doc.select("script[type=\"application/ld+json\"]")
        .iter()
        .find_map(|script| {
            let v: serde_json::Value = serde_json::from_str(script.raw_text().trim()).ok()?;
            if v.get("@type").and_then(|t| t.as_str()) != Some("Book") {
                return None;
            }
            let text = |value: Option<&serde_json::Value>| {
                value
                    .and_then(|n| n.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            };
            Some(LdBook {
                name: text(v.get("name")),
                author: text(v.get("author").and_then(|a| a.get("name"))),
                description: text(v.get("description"))
                    .map(|d| strip_html_tags(&d))
                    .filter(|d| !d.is_empty()),
                image: text(v.get("image")),
            })
        })
}

fn parse_details(page: &Page, novel_url: &str) -> Novel {
    let doc = page.document();
    let ld = json_ld_book(&doc).unwrap_or_default();

    let title = ld
        .name
        .or_else(|| doc.first_match(TITLE))
        .map(|t| strip_title_site_suffix(&t, TITLE_SUFFIXES))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    let author = ld
        .author
        .or_else(|| doc.first_match(AUTHOR))
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
    let cover_url = ld
        .image
        .and_then(|img| page.url.join(&img).ok().map(String::from))
        .or_else(|| doc.first_match(COVER));

    let paragraphs: Vec<String> = doc
        .select(".description .hidden-content p")
        .iter()
        .map(|p| p.text())
        .filter(|p| !p.is_empty())
        .collect();
    let description = if !paragraphs.is_empty() {
        paragraphs.join("\n\n")
    } else {
        ld.description
            .or_else(|| doc.first_match(DESCRIPTION_META))
            .unwrap_or_default()
    };

    let tags = doc
        .select(".tags a.fiction-tag")
        .iter()
        .map(|t| t.text())
        .filter(|t| !t.is_empty())
        .collect();
    let status = doc
        .select(".fiction-info span.label")
        .iter()
        .map(|l| l.text())
        .find(|l| KNOWN_STATUSES.contains(&l.to_uppercase().as_str()));

    Novel {
        id: derive_id(novel_url, &title),
        title,
        author,
        description,
        url: novel_url.to_string(),
        tags,
        status,
        source_id: Source::RoyalRoad.id().to_string(),
        cover_url,
    }
}

/// Decode `window.chapters = [...]` from the raw page source. Entry URLs are site paths and
/// resolve against the site root `site`. A missing or undecodable array yields no chapters.
fn parse_embedded_chapters(html: &str, site: &Url, novel_url: &str) -> Vec<Chapter> {
    let Some(m) = CHAPTERS_ASSIGNMENT.find(html) else {
        warn!(novel_url, "window.chapters not found; no chapters");
        return Vec::new();
    };
    // The match ends just past '['; step back onto it.
    let array_start = m.end() - 1;
    let Some(array) = extract_json_array_with_strings(&html[array_start..]) else {
        warn!(novel_url, "window.chapters array is unterminated; no chapters");
        return Vec::new();
    };
    let entries: Vec<serde_json::Value> = match serde_json::from_str(array) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(novel_url, error = %e, "window.chapters is not a JSON array; no chapters");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter_map(|value| serde_json::from_value::<ChapterEntry>(value).ok())
        .filter_map(|entry| {
            let relative = entry.url.filter(|u| !u.trim().is_empty())?;
            let relative = relative.trim();
            let path = if relative.starts_with('/') || relative.contains("://") {
                relative.to_string()
            } else {
                format!("/{}", relative)
            };
            let url = site.join(&path).ok()?;
            Some(Chapter::new(url, entry.title.unwrap_or_default(), novel_url))
        })
        .collect()
}

/// Find the matching closing bracket for the first '[' in s, skipping content inside JSON strings.
fn extract_json_array_with_strings(s: &str) -> Option<&str> {
    let start = s.find('[')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;
    for (byte_offset, c) in s[start..].char_indices() {
        if in_string {
            if escape {
                escape = false;
                continue;
            }
            if c == '\\' {
                escape = true;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + byte_offset + 1]);
                }
            }
            '"' => in_string = true,
            _ => {}
        }
    }
    None
}

#[async_trait]
impl NovelSource for RoyalRoadScraper {
    fn source(&self) -> Source {
        Source::RoyalRoad
    }

    async fn fetch_catalog_page(&self, page: u32, filters: &CatalogFilters) -> Vec<Novel> {
        if filters.completed {
            debug!("royalroad listings have no completed filter; ignoring");
        }
        let url = self.catalog_url(page, filters);
        fetch_listing(&self.client, &url, parse_catalog).await
    }

    async fn search(&self, query: &str, page: u32) -> Vec<Novel> {
        let url = self.search_url(query, page);
        fetch_listing(&self.client, &url, parse_catalog).await
    }

    async fn fetch_novel_details(&self, novel_url: &str) -> Result<Novel, ScraperError> {
        match fetch_tolerating_rate_limit(&self.client, novel_url, &FetchOptions::default()).await? {
            Some(page) => Ok(parse_details(&page, novel_url)),
            None => Ok(placeholder_novel(novel_url, Source::RoyalRoad)),
        }
    }

    async fn fetch_novel_chapters(&self, novel_url: &str) -> Result<Vec<Chapter>, ScraperError> {
        let Some(page) =
            fetch_tolerating_rate_limit(&self.client, novel_url, &FetchOptions::default()).await?
        else {
            return Ok(Vec::new());
        };
        let site = Url::parse(&self.base).map_err(|e| ScraperError::InvalidUrl {
            input: self.base.clone(),
            reason: e.to_string(),
        })?;
        let chapters = parse_embedded_chapters(&page.body, &site, novel_url);
        info!(novel_url, count = chapters.len(), "fetched chapter list");
        Ok(chapters)
    }

    async fn fetch_chapter_content(&self, chapter_url: &str) -> Result<String, ScraperError> {
        fetch_content(&self.client, chapter_url, CONTENT_CONTAINERS).await
    }
}
