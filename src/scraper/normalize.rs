//! Normalization shared by the adapters: sentinels, ID derivation, text cleanup, and the
//! common catalog-item extraction.

use crate::model::Novel;
use crate::scraper::document::{Document, Element, Lookup};
use crate::scraper::Source;
use reqwest::Url;
use tracing::debug;

pub const UNKNOWN_AUTHOR: &str = "Unknown Author";
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Stable novel ID: last non-empty path segment of `url`, else `fallback` (the title).
pub fn derive_id(url: &str, fallback: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(String::from))
        })
        .unwrap_or_else(|| fallback.to_string())
}

/// Detail record for a page that could not be read (rate limited): every field at its default.
pub(crate) fn placeholder_novel(novel_url: &str, source: Source) -> Novel {
    Novel {
        id: derive_id(novel_url, UNKNOWN_TITLE),
        title: UNKNOWN_TITLE.to_string(),
        author: UNKNOWN_AUTHOR.to_string(),
        description: String::new(),
        url: novel_url.to_string(),
        tags: Vec::new(),
        status: None,
        source_id: source.id().to_string(),
        cover_url: None,
    }
}

/// Collapse runs of whitespace to one space and trim.
pub fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip known site suffix from the end of a page title (e.g. " - Royal Road", " | Royal Road")
/// so that titles containing " - " or " | " in the actual title are preserved.
pub fn strip_title_site_suffix(s: &str, suffixes: &[&str]) -> String {
    let mut t = s.trim();
    for suffix in suffixes {
        if t.ends_with(suffix) {
            t = t[..t.len() - suffix.len()].trim();
            break;
        }
    }
    t.to_string()
}

pub fn strip_html_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("\n\n\n", "\n\n").trim().to_string()
}

/// Selectors describing one source's repeated catalog item (listing, ranking, and search pages).
#[derive(Debug, Clone, Copy)]
pub(crate) struct ListingLayout {
    pub item: &'static str,
    /// Anchor carrying title and detail URL. Items without it are skipped.
    pub title_anchor: &'static str,
    pub author: &'static str,
    pub blurb: &'static str,
    /// Prepended to a non-empty blurb (e.g. "Latest: ").
    pub blurb_prefix: &'static str,
    pub tags: Option<&'static str>,
    pub cover: &'static [Lookup],
}

/// Extract every catalog item in document order. A malformed item is dropped; it never
/// aborts the page.
pub(crate) fn parse_listing(doc: &Document, layout: &ListingLayout, source: Source) -> Vec<Novel> {
    let items = doc.select(layout.item);
    let total = items.len();
    let novels: Vec<Novel> = items
        .into_iter()
        .filter_map(|item| parse_listing_item(&item, layout, source))
        .collect();
    if novels.len() < total {
        debug!(
            source = %source,
            skipped = total - novels.len(),
            "catalog items without a title anchor"
        );
    }
    novels
}

fn parse_listing_item(item: &Element<'_>, layout: &ListingLayout, source: Source) -> Option<Novel> {
    let anchor = item.select_first(layout.title_anchor)?;
    let url = anchor.abs_url("href")?;
    let title = anchor.text();
    let author = item
        .first_match(&[Lookup::Text(layout.author)])
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
    let description = item
        .first_match(&[Lookup::Text(layout.blurb)])
        .map(|b| format!("{}{}", layout.blurb_prefix, b))
        .unwrap_or_default();
    let tags = layout
        .tags
        .map(|css| {
            item.select(css)
                .iter()
                .map(|t| t.text())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();
    let cover_url = item.first_match(layout.cover);

    Some(Novel {
        id: derive_id(&url, &title),
        title,
        author,
        description,
        url,
        tags,
        status: None,
        source_id: source.id().to_string(),
        cover_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: ListingLayout = ListingLayout {
        item: ".item",
        title_anchor: ".title a",
        author: ".author",
        blurb: ".blurb",
        blurb_prefix: "Latest: ",
        tags: Some(".tag"),
        cover: &[Lookup::AbsUrl("img", "data-src"), Lookup::AbsUrl("img", "src")],
    };

    fn listing_doc(html: &str) -> Document {
        Document::parse(html, Url::parse("https://site.example/list").ok())
    }

    #[test]
    fn derive_id_uses_trailing_segment() {
        assert_eq!(derive_id("https://site/x/novel-slug-123", "T"), "novel-slug-123");
        assert_eq!(derive_id("https://site/x/novel-slug-123/", "T"), "novel-slug-123");
    }

    #[test]
    fn derive_id_falls_back_to_title() {
        assert_eq!(derive_id("https://site", "My Title"), "My Title");
        assert_eq!(derive_id("https://site/", "My Title"), "My Title");
        assert_eq!(derive_id("not a url", "My Title"), "My Title");
    }

    #[test]
    fn placeholder_novel_has_defaults_and_derived_id() {
        let n = placeholder_novel("https://www.royalroad.com/fiction/9/x", Source::RoyalRoad);
        assert_eq!(n.id, "x");
        assert_eq!(n.url, "https://www.royalroad.com/fiction/9/x");
        assert_eq!(n.title, UNKNOWN_TITLE);
        assert_eq!(n.author, UNKNOWN_AUTHOR);
        assert!(n.description.is_empty());
        assert!(n.tags.is_empty());
        assert!(n.status.is_none());
        assert!(n.cover_url.is_none());
        assert_eq!(n.source_id, "royalroad");
    }

    #[test]
    fn clean_text_collapses() {
        assert_eq!(clean_text("  a \n b\t\tc "), "a b c");
        assert_eq!(clean_text("   "), "");
    }

    #[test]
    fn strip_title_site_suffix_removes_trailing_suffix_only() {
        assert_eq!(
            strip_title_site_suffix(
                "1. Good Morning - Brother - Book _ Royal Road",
                &[" _ Royal Road", " - Royal Road", " | Royal Road"]
            ),
            "1. Good Morning - Brother - Book"
        );
        assert_eq!(
            strip_title_site_suffix("Mother of Learning | Royal Road", &[" | Royal Road"]),
            "Mother of Learning"
        );
        assert_eq!(strip_title_site_suffix("A | B", &[" | Royal Road"]), "A | B");
    }

    #[test]
    fn strip_html_tags_keeps_text() {
        assert_eq!(strip_html_tags("<p>Hello <b>there</b></p>"), "Hello there");
    }

    #[test]
    fn listing_skips_item_without_anchor_and_keeps_order() {
        let doc = listing_doc(
            r#"
            <div class="item"><div class="title"><a href="/n/first">First</a></div></div>
            <div class="item"><div class="title">No anchor here</div></div>
            <div class="item"><div class="title"><a href="/n/third">Third</a></div></div>
            "#,
        );
        let novels = parse_listing(&doc, &LAYOUT, Source::NovelBin);
        let titles: Vec<&str> = novels.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Third"]);
    }

    #[test]
    fn listing_item_defaults_and_fields() {
        let doc = listing_doc(
            r#"
            <div class="item">
              <img data-src="/covers/a.jpg" src="/placeholder.gif">
              <div class="title"><a href="https://site.example/n/alpha-1">Alpha</a></div>
              <span class="author"> Jane </span>
              <span class="blurb">Chapter 9</span>
              <a class="tag">Fantasy</a><a class="tag"> </a><a class="tag">Action</a>
            </div>
            <div class="item"><div class="title"><a href="/n/beta">Beta</a></div><img src="/b.jpg"></div>
            "#,
        );
        let novels = parse_listing(&doc, &LAYOUT, Source::NovelBin);
        assert_eq!(novels.len(), 2);
        let a = &novels[0];
        assert_eq!(a.id, "alpha-1");
        assert_eq!(a.author, "Jane");
        assert_eq!(a.description, "Latest: Chapter 9");
        assert_eq!(a.tags, vec!["Fantasy", "Action"]);
        assert_eq!(a.cover_url.as_deref(), Some("https://site.example/covers/a.jpg"));
        assert_eq!(a.source_id, "novelbin");

        let b = &novels[1];
        assert_eq!(b.url, "https://site.example/n/beta");
        assert_eq!(b.author, UNKNOWN_AUTHOR);
        assert_eq!(b.description, "");
        assert!(b.tags.is_empty());
        assert_eq!(b.cover_url.as_deref(), Some("https://site.example/b.jpg"));
        assert!(b.status.is_none());
    }
}
