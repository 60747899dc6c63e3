//! `localtriage` diagnostics binary.
//!
//! Probes the configured providers, inspects the review ledger and
//! exercises bookmark distillation from the command line. Output is JSON.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Arg, Command};

use localtriage::capabilities::{Bookmark, BookmarkSource, ChromeBookmarks, HttpContentFetcher};
use localtriage::classifier::distill;
use localtriage::commands::{select_bookmarks, BookmarkQuery};
use localtriage::config::Settings;
use localtriage::inference::ProviderKind;
use localtriage::ledger::LedgerDatabase;
use localtriage::privacy::PrivacyRouter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn cli() -> Command {
    Command::new("localtriage")
        .version(VERSION)
        .about("LocalTriage - privacy-first email and bookmark triage")
        .subcommand(Command::new("health").about("Probe every registered provider"))
        .subcommand(
            Command::new("batches")
                .about("List pending review batches")
                .arg(
                    Arg::new("account")
                        .short('a')
                        .long("account")
                        .value_name("ID")
                        .help("Only this account (default: every active account)")
                        .value_parser(clap::value_parser!(i64)),
                ),
        )
        .subcommand(
            Command::new("bookmarks")
                .about("List Chrome bookmarks")
                .arg(
                    Arg::new("path")
                        .short('p')
                        .long("path")
                        .value_name("FILE")
                        .help("Bookmarks file (default: auto-discovered)"),
                )
                .arg(
                    Arg::new("folder")
                        .short('f')
                        .long("folder")
                        .value_name("TEXT")
                        .help("Only bookmarks whose folder path contains this text"),
                )
                .arg(
                    Arg::new("since-days")
                        .short('s')
                        .long("since-days")
                        .value_name("DAYS")
                        .help("Only bookmarks added within this many days")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    Arg::new("limit")
                        .short('n')
                        .long("limit")
                        .value_name("COUNT")
                        .help("Maximum bookmarks to list, newest first (default: 50)")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
        .subcommand(
            Command::new("digest")
                .about("Fetch and summarize one page")
                .arg(Arg::new("url").required(true).value_name("URL"))
                .arg(
                    Arg::new("provider")
                        .long("provider")
                        .value_name("NAME")
                        .help("Preferred provider for clean content"),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let settings = Settings::load().context("failed to load settings")?;
    localtriage::init_tracing(settings.log_filter.as_deref());

    match matches.subcommand() {
        Some(("batches", sub)) => {
            let ledger = open_ledger(&settings)?;
            let accounts: Vec<i64> = match sub.get_one::<i64>("account") {
                Some(id) => vec![*id],
                None => ledger
                    .list_active_accounts()?
                    .into_iter()
                    .map(|a| a.id)
                    .collect(),
            };
            let mut batches = Vec::new();
            for account in accounts {
                batches.extend(ledger.list_pending_batches(account)?);
            }
            print_json(&batches)
        }
        Some(("bookmarks", sub)) => {
            let source = match sub.get_one::<String>("path") {
                Some(path) => ChromeBookmarks::from_path(path),
                None => ChromeBookmarks::discover().context("no Chrome bookmarks file found")?,
            };
            let query = BookmarkQuery {
                folder: sub.get_one::<String>("folder").cloned(),
                since_days: sub.get_one::<u32>("since-days").copied(),
                limit: sub.get_one::<usize>("limit").copied(),
                provider: None,
            };
            let bookmarks = select_bookmarks(source.list_bookmarks().await?, &query, Utc::now());
            print_json(&bookmarks)
        }
        Some(("digest", sub)) => {
            let Some(url) = sub.get_one::<String>("url") else {
                bail!("missing URL");
            };
            let preferred = sub
                .get_one::<String>("provider")
                .map(|p| p.parse::<ProviderKind>())
                .transpose()?;
            let router = build_router(&settings)?;
            let fetcher =
                HttpContentFetcher::new(Duration::from_secs(settings.bookmark_fetch_timeout_secs))?;
            let bookmark = Bookmark {
                url: url.clone(),
                title: String::new(),
                date_added: None,
                folder: String::new(),
                tags: Vec::new(),
            };
            let digest = distill(&router, &fetcher, &bookmark, preferred).await;
            print_json(&digest)
        }
        _ => {
            let router = build_router(&settings)?;
            let health = router.health().await;
            print_json(&serde_json::json!({
                "version": VERSION,
                "database": localtriage::resolve_db_path(&settings),
                "default_provider": settings.routing.default_provider,
                "high_quality_provider": settings.routing.high_quality_provider,
                "providers": health,
            }))
        }
    }
}

fn build_router(settings: &Settings) -> Result<Arc<PrivacyRouter>> {
    let router = PrivacyRouter::from_settings(settings).context("failed to build providers")?;
    tracing::info!(providers = ?router.available_providers(), "router ready");
    Ok(Arc::new(router))
}

fn open_ledger(settings: &Settings) -> Result<LedgerDatabase> {
    let path = localtriage::resolve_db_path(settings);
    LedgerDatabase::open(&path).with_context(|| format!("failed to open ledger at {path}"))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
