//! CLI parsing and orchestration. Resolves a source, runs one adapter operation, and prints
//! the normalized result as text or JSON. Maps errors to exit codes.

use crate::config;
use crate::model::{Chapter, Novel};
use crate::scraper::{
    resolve, CatalogFilters, HtmlClient, NovelSource, RankMode, ScraperError, Source,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Scraper(#[from] ScraperError),

    #[error("Failed to write output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Scraper(e) if e.is_fetch_error() => 2,
            CliRunError::Scraper(_) => 1,
            CliRunError::Output(_) => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "novelscrape")]
#[command(about = "Browse NovelBin and Royal Road catalogs, novels, and chapters")]
#[command(
    after_help = "Config file keys (user_agent, timeout_secs, default_source) are read from ./novelscrape.toml or the user config dir. CLI flags override config."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Source short name or URL (royalroad, novelbin). Overrides detection from URLs.
    #[arg(long, global = true)]
    pub source: Option<String>,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    /// HTTP User-Agent (overrides config).
    #[arg(long, global = true)]
    pub user_agent: Option<String>,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Suppress the progress spinner.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Debug logging and verbose error chain.
    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List known sources.
    Sources,
    /// One catalog page.
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Completed novels only (NovelBin).
        #[arg(long)]
        completed: bool,
        /// Genre filter (Royal Road), e.g. fantasy or sci_fi.
        #[arg(long)]
        genre: Option<String>,
        /// Ranking: latest, popular, or best-rated.
        #[arg(long, default_value = "latest", value_parser = parse_rank)]
        rank: RankMode,
    },
    /// Search the source's own search endpoint.
    Search {
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Full metadata for one novel.
    Details { url: String },
    /// Chapter list for one novel.
    Chapters { url: String },
    /// Content HTML of one chapter.
    Read { url: String },
}

fn parse_rank(s: &str) -> Result<RankMode, String> {
    match s.to_lowercase().as_str() {
        "latest" | "recent" => Ok(RankMode::Latest),
        "popular" => Ok(RankMode::Popular),
        "best-rated" | "best_rated" | "best" => Ok(RankMode::BestRated),
        _ => Err(format!(
            "Invalid --rank value: '{}'. Use latest, popular, or best-rated.",
            s
        )),
    }
}

/// Identifier used to pick the adapter: --source wins, then the command's URL, then config.
fn source_identifier(
    args: &Args,
    config: Option<&config::Config>,
) -> Result<String, CliRunError> {
    if let Some(ref s) = args.source {
        return Ok(s.clone());
    }
    match &args.command {
        Command::Details { url } | Command::Chapters { url } | Command::Read { url } => {
            Ok(url.clone())
        }
        _ => config
            .and_then(|c| c.default_source.clone())
            .ok_or_else(|| {
                CliRunError::InvalidInput(
                    "No source given. Use --source royalroad or --source novelbin (or set default_source in the config file).".to_string(),
                )
            }),
    }
}

async fn with_spinner<F, T>(quiet: bool, message: String, fut: F) -> T
where
    F: Future<Output = T>,
{
    if quiet {
        return fut.await;
    }
    let spinner = indicatif::ProgressBar::new_spinner();
    if let Ok(style) = indicatif::ProgressStyle::default_spinner().template("{spinner} {msg} ({elapsed})") {
        spinner.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(80));
    let out = fut.await;
    spinner.finish_and_clear();
    out
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliRunError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_novel_line(index: usize, novel: &Novel) -> String {
    let mut line = format!("{:>3}. {} by {}\n     {}", index + 1, novel.title, novel.author, novel.url);
    if !novel.description.is_empty() {
        line.push_str(&format!("\n     {}", novel.description));
    }
    line
}

fn format_details(novel: &Novel) -> String {
    let mut out = format!("{}\nby {}\n{}\n", novel.title, novel.author, novel.url);
    if let Some(ref status) = novel.status {
        out.push_str(&format!("Status: {}\n", status));
    }
    if !novel.tags.is_empty() {
        out.push_str(&format!("Tags: {}\n", novel.tags.join(", ")));
    }
    if let Some(ref cover) = novel.cover_url {
        out.push_str(&format!("Cover: {}\n", cover));
    }
    if !novel.description.is_empty() {
        out.push_str(&format!("\n{}\n", novel.description));
    }
    out
}

fn format_chapter_line(index: usize, chapter: &Chapter) -> String {
    format!("{:>4}. {}\n      {}", index + 1, chapter.title, chapter.url)
}

fn print_novels(novels: &[Novel], json: bool) -> Result<(), CliRunError> {
    if json {
        return print_json(novels);
    }
    if novels.is_empty() {
        eprintln!("No novels found.");
    }
    for (i, novel) in novels.iter().enumerate() {
        println!("{}", format_novel_line(i, novel));
    }
    Ok(())
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub async fn run(args: &Args) -> Result<(), CliRunError> {
    if let Command::Sources = args.command {
        for source in Source::ALL {
            println!("{:<10} {}", source.id(), source.base_url());
        }
        return Ok(());
    }

    let config = config::load_config().map_err(CliRunError::InvalidInput)?;

    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    let timeout_secs = args
        .timeout
        .or_else(|| config.as_ref().and_then(|c| c.timeout_secs))
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let user_agent = args
        .user_agent
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.user_agent.clone()));

    let mut builder = HtmlClient::builder().timeout_secs(timeout_secs);
    if let Some(ua) = user_agent {
        builder = builder.user_agent(ua);
    }
    let client = builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;

    let identifier = source_identifier(args, config.as_ref())?;
    let adapter: Box<dyn NovelSource> = resolve(&identifier, client)?;

    match &args.command {
        Command::Sources => Ok(()),
        Command::List {
            page,
            completed,
            genre,
            rank,
        } => {
            let filters = CatalogFilters {
                genre: genre.clone(),
                completed: *completed,
                rank: *rank,
            };
            let novels = with_spinner(
                args.quiet,
                format!("Fetching {} page {}", adapter.source(), page),
                adapter.fetch_catalog_page(*page, &filters),
            )
            .await;
            print_novels(&novels, args.json)
        }
        Command::Search { query, page } => {
            let novels = with_spinner(
                args.quiet,
                format!("Searching {} for '{}'", adapter.source(), query),
                adapter.search(query, *page),
            )
            .await;
            print_novels(&novels, args.json)
        }
        Command::Details { url } => {
            let novel = with_spinner(
                args.quiet,
                "Fetching novel details".to_string(),
                adapter.fetch_novel_details(url),
            )
            .await?;
            if args.json {
                return print_json(&novel);
            }
            print!("{}", format_details(&novel));
            Ok(())
        }
        Command::Chapters { url } => {
            let chapters = with_spinner(
                args.quiet,
                "Fetching chapter list".to_string(),
                adapter.fetch_novel_chapters(url),
            )
            .await?;
            if args.json {
                return print_json(&chapters);
            }
            if chapters.is_empty() {
                eprintln!("No chapters found.");
            }
            for (i, chapter) in chapters.iter().enumerate() {
                println!("{}", format_chapter_line(i, chapter));
            }
            Ok(())
        }
        Command::Read { url } => {
            let content = with_spinner(
                args.quiet,
                "Fetching chapter".to_string(),
                adapter.fetch_chapter_content(url),
            )
            .await?;
            if args.json {
                return print_json(&serde_json::json!({ "url": url, "content": content }));
            }
            if content.is_empty() {
                eprintln!("No chapter content found (or rate limited).");
            }
            println!("{}", content);
            Ok(())
        }
    }
}
