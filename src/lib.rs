//! novelscrape: source adapters that turn NovelBin and Royal Road pages into a normalized
//! catalog of novels and chapters.

pub mod cli;
pub mod config;
pub mod model;
pub mod scraper;

// Re-exports for CLI and consumers.
pub use model::{Chapter, Novel};
pub use scraper::{
    adapter_for, resolve, resolve_source, CatalogFilters, FetchOptions, HtmlClient,
    HtmlClientBuilder, NovelSource, RankMode, ScraperError, Source,
};
