//! Queryable document tree over `scraper::Html`.
//!
//! Selectors are plain CSS strings. An invalid selector is logged and matches nothing, so
//! extraction code never has to handle a parse error.

use crate::scraper::normalize::clean_text;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(sel) => Some(sel),
        Err(e) => {
            warn!(selector = css, error = %e, "invalid selector");
            None
        }
    }
}

/// One step of an ordered fallback chain. Each step looks only at the first element its
/// selector matches; an empty result falls through to the next step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Whitespace-normalized text of the element.
    Text(&'static str),
    /// Raw attribute value.
    Attr(&'static str, &'static str),
    /// Attribute value resolved to an absolute URL against the document base.
    AbsUrl(&'static str, &'static str),
}

/// Parsed HTML document with an optional base URL for resolving relative links.
pub struct Document {
    html: Html,
    base: Option<Url>,
}

impl Document {
    pub fn parse(body: &str, base: Option<Url>) -> Self {
        Self {
            html: Html::parse_document(body),
            base,
        }
    }

    /// The `<html>` element.
    pub fn root(&self) -> Element<'_> {
        Element {
            el: self.html.root_element(),
            base: self.base.as_ref(),
        }
    }

    /// All matches in document order.
    pub fn select(&self, css: &str) -> Vec<Element<'_>> {
        let Some(sel) = selector(css) else {
            return Vec::new();
        };
        self.html
            .select(&sel)
            .map(|el| Element {
                el,
                base: self.base.as_ref(),
            })
            .collect()
    }

    pub fn select_first(&self, css: &str) -> Option<Element<'_>> {
        let sel = selector(css)?;
        self.html.select(&sel).next().map(|el| Element {
            el,
            base: self.base.as_ref(),
        })
    }

    /// First non-empty value produced by `chain`, in order.
    pub fn first_match(&self, chain: &[Lookup]) -> Option<String> {
        self.root().first_match(chain)
    }

    /// Serialized markup of the whole document.
    pub fn html(&self) -> String {
        self.html.html()
    }

    /// Inner markup of the first element matched by any of `containers` (tried in order),
    /// after detaching every descendant that matches `strip`. `None` if no container matches.
    pub fn inner_html_stripped(&mut self, containers: &[&str], strip: &str) -> Option<String> {
        let container_id = containers
            .iter()
            .find_map(|css| self.select_first(css).map(|e| e.el.id()))?;

        let doomed: Vec<_> = match selector(strip) {
            Some(sel) => {
                let container = self.html.tree.get(container_id).and_then(ElementRef::wrap)?;
                container.select(&sel).map(|e| e.id()).collect()
            }
            None => Vec::new(),
        };
        for id in doomed {
            if let Some(mut node) = self.html.tree.get_mut(id) {
                node.detach();
            }
        }

        let container = self.html.tree.get(container_id).and_then(ElementRef::wrap)?;
        Some(container.inner_html())
    }
}

/// An element borrowed from a [`Document`].
#[derive(Clone, Copy)]
pub struct Element<'a> {
    el: ElementRef<'a>,
    base: Option<&'a Url>,
}

impl<'a> Element<'a> {
    /// Descendant text with runs of whitespace collapsed to a single space, trimmed.
    pub fn text(&self) -> String {
        clean_text(&self.el.text().collect::<String>())
    }

    /// Descendant text exactly as in the source (script bodies, preformatted text).
    pub fn raw_text(&self) -> String {
        self.el.text().collect()
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.el.value().attr(name)
    }

    /// Attribute value resolved against the document base. `None` if the attribute is
    /// missing or blank, or the value cannot be resolved.
    pub fn abs_url(&self, name: &str) -> Option<String> {
        let raw = self.attr(name)?.trim();
        if raw.is_empty() {
            return None;
        }
        match self.base {
            Some(base) => base.join(raw).ok().map(String::from),
            None => Url::parse(raw).ok().map(String::from),
        }
    }

    /// Inner markup.
    pub fn html(&self) -> String {
        self.el.inner_html()
    }

    pub fn select(&self, css: &str) -> Vec<Element<'a>> {
        let Some(sel) = selector(css) else {
            return Vec::new();
        };
        let base = self.base;
        self.el
            .select(&sel)
            .map(|el| Element { el, base })
            .collect()
    }

    pub fn select_first(&self, css: &str) -> Option<Element<'a>> {
        let sel = selector(css)?;
        let base = self.base;
        self.el.select(&sel).next().map(|el| Element { el, base })
    }

    /// First non-empty value produced by `chain` within this element's subtree.
    pub fn first_match(&self, chain: &[Lookup]) -> Option<String> {
        chain.iter().find_map(|step| {
            let value = match *step {
                Lookup::Text(css) => self.select_first(css).map(|e| e.text()),
                Lookup::Attr(css, name) => self
                    .select_first(css)
                    .and_then(|e| e.attr(name))
                    .map(|v| v.trim().to_string()),
                Lookup::AbsUrl(css, name) => self.select_first(css).and_then(|e| e.abs_url(name)),
            };
            value.filter(|v| !v.is_empty())
        })
    }
}
