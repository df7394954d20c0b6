//! NovelBin adapter. Paginated "daily update" and "popular" rankings, each with a completed-only
//! variant; chapters come from the AJAX chapter archive keyed by the novel's canonical slug.

use crate::model::{Chapter, Novel};
use crate::scraper::document::{Document, Lookup};
use crate::scraper::normalize::{
    derive_id, parse_listing, placeholder_novel, ListingLayout, UNKNOWN_AUTHOR, UNKNOWN_TITLE,
};
use crate::scraper::{
    fetch_content, fetch_listing, fetch_tolerating_rate_limit, CatalogFilters, FetchOptions,
    HtmlClient, NovelSource, Page, RankMode, ScraperError, Source,
};
use async_trait::async_trait;
use tracing::{debug, info, warn};

pub const NOVELBIN_BASE: &str = "https://novelbin.me";

const LISTING: ListingLayout = ListingLayout {
    item: ".list-novel .row",
    title_anchor: ".novel-title a",
    author: ".author",
    blurb: ".col-xs-2 .chapter-title",
    blurb_prefix: "Latest: ",
    tags: None,
    // Listing pages lazy-load covers via data-src; search results use src.
    cover: &[
        Lookup::AbsUrl("img.cover", "data-src"),
        Lookup::AbsUrl("img.cover", "src"),
    ],
};

const TITLE: &[Lookup] = &[
    Lookup::Text("h3.title[itemprop=name]"),
    Lookup::Attr("meta[property=\"og:title\"]", "content"),
];
const AUTHOR_META: &[Lookup] = &[Lookup::Attr(
    "span[itemprop=author] meta[itemprop=name]",
    "content",
)];
const COVER: &[Lookup] = &[
    Lookup::AbsUrl("meta[itemprop=image]", "content"),
    Lookup::AbsUrl(".book img.lazy", "data-src"),
    Lookup::AbsUrl(".book img", "src"),
];
const DESCRIPTION: &[Lookup] = &[
    Lookup::Text("div.desc-text[itemprop=description]"),
    Lookup::Attr("meta[name=description]", "content"),
];

const CONTENT_CONTAINERS: &[&str] = &["div#chr-content", "#chapter-content", ".chapter-content"];

/// NovelBin scraper. Holds only a client handle and the site base, so calls may run concurrently.
#[derive(Debug, Clone)]
pub struct NovelBinScraper {
    client: HtmlClient,
    base: String,
}

impl NovelBinScraper {
    pub fn new(client: HtmlClient) -> Self {
        Self::with_base_url(client, NOVELBIN_BASE)
    }

    /// Point the adapter at another origin (mirrors, tests).
    pub fn with_base_url(client: HtmlClient, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { client, base }
    }

    fn catalog_url(&self, page: u32, filters: &CatalogFilters) -> String {
        let ranking = match filters.rank {
            RankMode::Latest => "novelbin-daily-update",
            RankMode::Popular | RankMode::BestRated => "novelbin-popular",
        };
        let completed = if filters.completed { "/completed" } else { "" };
        format!(
            "{}/sort/{}{}?page={}",
            self.base,
            ranking,
            completed,
            page.max(1)
        )
    }

    fn search_url(&self, query: &str, page: u32) -> String {
        format!(
            "{}/search?keyword={}&page={}",
            self.base,
            urlencoding::encode(query),
            page.max(1)
        )
    }

    fn chapter_archive_url(&self, novel_key: &str) -> String {
        format!(
            "{}/ajax/chapter-archive?novelId={}",
            self.base,
            urlencoding::encode(novel_key)
        )
    }
}

fn parse_catalog(page: &Page) -> Vec<Novel> {
    parse_listing(&page.document(), &LISTING, Source::NovelBin)
}

/// `ul.info.info-meta li` rows are labelled by an `h3` ("Author:", "Genre:", "Status:").
fn info_row_links(doc: &Document, label: &str) -> Vec<String> {
    let label = label.to_lowercase();
    doc.select("ul.info.info-meta li")
        .into_iter()
        .find(|li| {
            li.select_first("h3")
                .map(|h| h.text().to_lowercase().contains(&label))
                .unwrap_or(false)
        })
        .map(|li| {
            li.select("a")
                .iter()
                .map(|a| a.text())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_details(page: &Page, novel_url: &str) -> Novel {
    let doc = page.document();
    let title = doc
        .first_match(TITLE)
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    let author = doc
        .first_match(AUTHOR_META)
        .or_else(|| info_row_links(&doc, "Author").into_iter().next())
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
    let cover_url = doc.first_match(COVER);
    let description = doc.first_match(DESCRIPTION).unwrap_or_default();
    let tags = info_row_links(&doc, "Genre");
    let status = info_row_links(&doc, "Status").into_iter().next();

    Novel {
        id: derive_id(novel_url, &title),
        title,
        author,
        description,
        url: novel_url.to_string(),
        tags,
        status,
        source_id: Source::NovelBin.id().to_string(),
        cover_url,
    }
}

/// Canonical slug: last path segment of `og:url`.
fn canonical_key(page: &Page) -> Option<String> {
    let og_url = page
        .document()
        .first_match(&[Lookup::Attr("meta[property=\"og:url\"]", "content")])?;
    og_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|key| !key.is_empty())
        .map(String::from)
}

fn parse_chapter_archive(page: &Page, novel_url: &str) -> Vec<Chapter> {
    page.document()
        .select("li a")
        .iter()
        .filter_map(|a| {
            let url = a.abs_url("href")?;
            Some(Chapter::new(url, a.text(), novel_url))
        })
        .collect()
}

#[async_trait]
impl NovelSource for NovelBinScraper {
    fn source(&self) -> Source {
        Source::NovelBin
    }

    async fn fetch_catalog_page(&self, page: u32, filters: &CatalogFilters) -> Vec<Novel> {
        if filters.genre.is_some() {
            debug!("novelbin has no genre filter; ignoring");
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
            None => Ok(placeholder_novel(novel_url, Source::NovelBin)),
        }
    }

    async fn fetch_novel_chapters(&self, novel_url: &str) -> Result<Vec<Chapter>, ScraperError> {
        let Some(detail) =
            fetch_tolerating_rate_limit(&self.client, novel_url, &FetchOptions::default()).await?
        else {
            return Ok(Vec::new());
        };
        let Some(key) = canonical_key(&detail) else {
            warn!(novel_url, "og:url not found; no chapters");
            return Ok(Vec::new());
        };

        let archive_url = self.chapter_archive_url(&key);
        let Some(archive) =
            fetch_tolerating_rate_limit(&self.client, &archive_url, &FetchOptions::accept_non_html())
                .await?
        else {
            return Ok(Vec::new());
        };
        let chapters = parse_chapter_archive(&archive, novel_url);
        info!(novel_url, count = chapters.len(), "fetched chapter list");
        Ok(chapters)
    }

    async fn fetch_chapter_content(&self, chapter_url: &str) -> Result<String, ScraperError> {
        fetch_content(&self.client, chapter_url, CONTENT_CONTAINERS).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;
    use std::error::Error;

    fn page(url: &str, body: &str) -> Result<Page, Box<dyn Error>> {
        Ok(Page {
            url: Url::parse(url)?,
            body: body.to_string(),
        })
    }

    fn scraper() -> Result<NovelBinScraper, Box<dyn Error>> {
        Ok(NovelBinScraper::new(HtmlClient::new()?))
    }

    #[test]
    fn catalog_urls_cover_rank_and_completed() -> Result<(), Box<dyn Error>> {
        let s = scraper()?;
        let latest = CatalogFilters::default();
        assert_eq!(
            s.catalog_url(2, &latest),
            "https://novelbin.me/sort/novelbin-daily-update?page=2"
        );
        let completed_popular = CatalogFilters {
            completed: true,
            rank: RankMode::Popular,
            ..CatalogFilters::default()
        };
        assert_eq!(
            s.catalog_url(1, &completed_popular),
            "https://novelbin.me/sort/novelbin-popular/completed?page=1"
        );
        let best = CatalogFilters {
            rank: RankMode::BestRated,
            genre: Some("fantasy".into()),
            ..CatalogFilters::default()
        };
        assert_eq!(
            s.catalog_url(0, &best),
            "https://novelbin.me/sort/novelbin-popular?page=1"
        );
        Ok(())
    }

    #[test]
    fn search_url_encodes_query() -> Result<(), Box<dyn Error>> {
        let s = scraper()?;
        assert_eq!(
            s.search_url("shadow slave & co", 3),
            "https://novelbin.me/search?keyword=shadow%20slave%20%26%20co&page=3"
        );
        Ok(())
    }

    #[test]
    fn with_base_url_trims_trailing_slash() -> Result<(), Box<dyn Error>> {
        let s = NovelBinScraper::with_base_url(HtmlClient::new()?, "http://127.0.0.1:9000/");
        assert_eq!(
            s.chapter_archive_url("shadow-slave"),
            "http://127.0.0.1:9000/ajax/chapter-archive?novelId=shadow-slave"
        );
        Ok(())
    }

    #[test]
    fn catalog_item_uses_latest_chapter_blurb() -> Result<(), Box<dyn Error>> {
        let p = page(
            "https://novelbin.me/sort/novelbin-daily-update?page=1",
            r##"<div class="list list-novel">
              <div class="row">
                <div class="col-xs-3"><img class="cover" data-src="https://img.novelbin.me/a.jpg"></div>
                <div class="col-xs-7"><h3 class="novel-title"><a href="https://novelbin.me/b/shadow-slave">Shadow Slave</a></h3>
                  <span class="author">Guiltythree</span></div>
                <div class="col-xs-2"><a href="#"><span class="chapter-title">Chapter 2000</span></a></div>
              </div>
            </div>"##,
        )?;
        let novels = parse_catalog(&p);
        assert_eq!(novels.len(), 1);
        assert_eq!(novels[0].id, "shadow-slave");
        assert_eq!(novels[0].title, "Shadow Slave");
        assert_eq!(novels[0].author, "Guiltythree");
        assert_eq!(novels[0].description, "Latest: Chapter 2000");
        assert_eq!(novels[0].cover_url.as_deref(), Some("https://img.novelbin.me/a.jpg"));
        assert!(novels[0].tags.is_empty());
        Ok(())
    }

    #[test]
    fn details_full_page() -> Result<(), Box<dyn Error>> {
        let p = page(
            "https://novelbin.me/b/shadow-slave",
            r#"<html><head><meta itemprop="image" content="https://img.novelbin.me/cover.jpg"></head><body>
            <div class="book"><img class="lazy" data-src="/other.jpg"></div>
            <h3 class="title" itemprop="name">Shadow Slave</h3>
            <span itemprop="author"><meta itemprop="name" content="Guiltythree"></span>
            <ul class="info info-meta">
              <li><h3>Author:</h3><a href="/a/g">Someone Else</a></li>
              <li><h3>Genre:</h3><a href="/g/1">Action</a>, <a href="/g/2">Fantasy</a></li>
              <li><h3>Status:</h3><a href="/s/ongoing">Ongoing</a></li>
            </ul>
            <div class="desc-text" itemprop="description"><p>Growing up in poverty...</p></div>
            </body></html>"#,
        )?;
        let novel = parse_details(&p, "https://novelbin.me/b/shadow-slave");
        assert_eq!(novel.id, "shadow-slave");
        assert_eq!(novel.title, "Shadow Slave");
        assert_eq!(novel.author, "Guiltythree");
        assert_eq!(novel.cover_url.as_deref(), Some("https://img.novelbin.me/cover.jpg"));
        assert_eq!(novel.description, "Growing up in poverty...");
        assert_eq!(novel.tags, vec!["Action", "Fantasy"]);
        assert_eq!(novel.status.as_deref(), Some("Ongoing"));
        assert_eq!(novel.source_id, "novelbin");
        Ok(())
    }

    #[test]
    fn details_fall_back_to_info_row_and_defaults() -> Result<(), Box<dyn Error>> {
        let p = page(
            "https://novelbin.me/b/x",
            r#"<ul class="info info-meta"><li><h3>Author:</h3><a href="/a/j">Jane</a></li></ul>
               <div class="book"><img class="lazy" data-src="/covers/x.jpg"></div>"#,
        )?;
        let novel = parse_details(&p, "https://novelbin.me/b/x");
        assert_eq!(novel.title, UNKNOWN_TITLE);
        assert_eq!(novel.author, "Jane");
        assert_eq!(novel.cover_url.as_deref(), Some("https://novelbin.me/covers/x.jpg"));
        assert_eq!(novel.description, "");
        assert!(novel.tags.is_empty());
        assert!(novel.status.is_none());

        let bare = page("https://novelbin.me/b/y", "<html><body></body></html>")?;
        let novel = parse_details(&bare, "https://novelbin.me/b/y");
        assert_eq!(novel.author, UNKNOWN_AUTHOR);
        assert!(novel.cover_url.is_none());
        Ok(())
    }

    #[test]
    fn canonical_key_from_og_url() -> Result<(), Box<dyn Error>> {
        let p = page(
            "https://novelbin.me/b/shadow-slave",
            r#"<head><meta property="og:url" content="https://novelbin.me/novel-book/shadow-slave/"></head>"#,
        )?;
        assert_eq!(canonical_key(&p).as_deref(), Some("shadow-slave"));
        let missing = page("https://novelbin.me/b/x", "<head></head>")?;
        assert!(canonical_key(&missing).is_none());
        Ok(())
    }

    #[test]
    fn chapter_archive_resolves_links_in_order() -> Result<(), Box<dyn Error>> {
        let p = page(
            "https://novelbin.me/ajax/chapter-archive?novelId=shadow-slave",
            r#"<ul class="list-chapter">
                 <li><a href="https://novelbin.me/b/shadow-slave/chapter-1" title="Chapter 1">Chapter 1 Nightmare Begins</a></li>
                 <li><a href="/b/shadow-slave/chapter-2">Chapter 2</a></li>
                 <li><span>no link</span></li>
               </ul>"#,
        )?;
        let chapters = parse_chapter_archive(&p, "https://novelbin.me/b/shadow-slave");
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "Chapter 1 Nightmare Begins");
        assert_eq!(chapters[1].url, "https://novelbin.me/b/shadow-slave/chapter-2");
        assert_eq!(chapters[1].novel_url, "https://novelbin.me/b/shadow-slave");
        assert!(chapters[0].content.is_none());
        Ok(())
    }
}
