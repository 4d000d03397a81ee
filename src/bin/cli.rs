//! novel-notify CLI
//!
//! Subscription management, one-off checks and the long-running scheduler.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use novel_notify::{
    error::Result,
    models::Config,
    notify::build_notifier,
    pipeline::{CheckOutcome, CheckReport, Dispatch, NovelChecker, Scheduler, TickSummary},
    services::{CatalogParser, HttpFetcher},
    storage::{LocalStorage, NovelStore},
    utils::normalize_novel_url,
};

/// novel-notify - Web Novel Chapter Update Tracker
#[derive(Parser, Debug)]
#[command(
    name = "novel-notify",
    version,
    about = "Track web novels and get notified about new free chapters"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Subscribe a user to a novel and record its current chapter
    Add {
        /// Novel URL (any form containing /book/<id>)
        url: String,
        #[arg(short, long)]
        user: String,
    },

    /// Unsubscribe a user from a novel
    Remove {
        url: String,
        #[arg(short, long)]
        user: String,
    },

    /// List tracked novels, or one user's subscriptions
    List {
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Check one novel, or run a single tick over every tracked novel
    Check {
        /// Novel URL; omit to check everything
        url: Option<String>,
    },

    /// Run the scheduler until Ctrl-C
    Run,

    /// Validate configuration and selectors
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn build_checker(config: &Config, store: Arc<dyn NovelStore>) -> Result<Arc<NovelChecker>> {
    let fetcher = Arc::new(HttpFetcher::new(&config.fetcher)?);
    let parser = CatalogParser::new(&config.selectors)?;
    Ok(Arc::new(NovelChecker::new(
        fetcher,
        store,
        parser,
        config.fetcher.base_url.clone(),
    )))
}

fn build_scheduler(config: &Config, store: Arc<dyn NovelStore>) -> Result<Scheduler> {
    let checker = build_checker(config, store.clone())?;
    Ok(Scheduler::new(
        checker,
        store,
        build_notifier(&config.notify),
        config.scheduler.clone(),
    ))
}

fn log_report(report: &CheckReport) {
    let latest = report
        .state
        .as_ref()
        .and_then(|s| s.last_effective_chapter.as_ref())
        .map(|c| c.label())
        .unwrap_or_else(|| "-".to_string());
    match &report.outcome {
        CheckOutcome::Failed { stage, error, .. } => {
            log::error!("{}: failed while {}: {}", report.novel_id, stage, error)
        }
        CheckOutcome::Untracked => {
            log::warn!("{}: nobody is subscribed, nothing recorded", report.novel_id)
        }
        outcome => {
            log::info!("{}: {:?}, latest free chapter {}", report.novel_id, outcome, latest)
        }
    }
}

fn log_summary(summary: &TickSummary) {
    log::info!(
        "{} novels: {} updated, {} unchanged, {} seeded, {} regressed, {} reset, {} failed",
        summary.total,
        summary.updated,
        summary.unchanged,
        summary.seeded,
        summary.regressed,
        summary.reset,
        summary.failed
    );
    for (id, error) in &summary.failures {
        log::warn!("  {}: {}", id, error);
    }
    for id in &summary.undelivered {
        log::warn!("  {}: update could not be delivered", id);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    config.apply_env_overrides();

    let store = Arc::new(LocalStorage::new(&config.storage.root_dir));
    log::debug!("Using storage at {}", config.storage.root_dir.display());

    match cli.command {
        Command::Add { url, user } => {
            let novel = normalize_novel_url(&url, &config.fetcher.base_url)?;
            if !store.add_subscription(&user, &novel.id).await? {
                log::info!("{} is already subscribed to {}", user, novel.id);
                return Ok(());
            }
            log::info!("Subscribed {} to {}", user, novel.canonical_url);

            let seeded = store
                .get_novel_state(&novel.id)
                .await?
                .is_some_and(|state| !state.is_unseeded());
            if !seeded {
                let checker = build_checker(&config, store.clone())?;
                log_report(&checker.check(&novel.id).await);
            }
        }

        Command::Remove { url, user } => {
            let novel = normalize_novel_url(&url, &config.fetcher.base_url)?;
            if store.remove_subscription(&user, &novel.id).await? {
                log::info!("Unsubscribed {} from {}", user, novel.id);
            } else {
                log::warn!("{} was not subscribed to {}", user, novel.id);
            }
        }

        Command::List { user: Some(user) } => {
            let ids = store.list_user_subscriptions(&user).await?;
            if ids.is_empty() {
                log::info!("{} has no subscriptions.", user);
            }
            for id in ids {
                let title = store
                    .get_novel_state(&id)
                    .await?
                    .map(|state| state.display_title().to_string())
                    .unwrap_or_else(|| "(not checked yet)".into());
                let last_notified = store
                    .get_subscription(&user, &id)
                    .await?
                    .and_then(|sub| sub.last_notified)
                    .map(|c| c.label())
                    .unwrap_or_else(|| "nothing yet".into());
                log::info!("{} {} | last notified: {}", id, title, last_notified);
            }
        }

        Command::List { user: None } => {
            let ids = store.list_tracked_novel_ids().await?;
            if ids.is_empty() {
                log::info!("No novels tracked.");
            }
            for id in ids {
                let subscribers = store.list_subscribers(&id).await?.len();
                match store.get_novel_state(&id).await? {
                    Some(state) => log::info!(
                        "{} {} | {} | paid gap: {} | failures: {} | {} subscribers",
                        id,
                        state.display_title(),
                        state
                            .last_effective_chapter
                            .as_ref()
                            .map(|c| c.label())
                            .unwrap_or_else(|| "not checked yet".into()),
                        state.has_paid_gap,
                        state.consecutive_failures,
                        subscribers
                    ),
                    None => log::info!("{} (not checked yet) | {} subscribers", id, subscribers),
                }
            }
        }

        Command::Check { url: Some(url) } => {
            let novel = normalize_novel_url(&url, &config.fetcher.base_url)?;
            let run = build_scheduler(&config, store)?.check_novel(&novel.id).await;
            log_report(&run.report);
            match run.dispatch {
                Dispatch::Sent => log::info!(
                    "Notified {} subscribers ({} failed)",
                    run.delivery.delivered(),
                    run.delivery.failed
                ),
                Dispatch::Undelivered => log::error!("Update could not be delivered"),
                Dispatch::Orphaned | Dispatch::NoEvent => {}
            }
        }

        Command::Check { url: None } => {
            if let Some(summary) = build_scheduler(&config, store)?.try_tick().await? {
                log_summary(&summary);
            }
        }

        Command::Run => {
            config.validate()?;
            build_scheduler(&config, store)?
                .run(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        log::error!("Failed to listen for Ctrl-C: {}", e);
                        std::future::pending::<()>().await;
                    }
                    log::info!("Shutdown requested");
                })
                .await;
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            CatalogParser::new(&config.selectors)?;
            log::info!("✓ Config OK ({} selectors compiled)", config.selectors.all().count());
        }
    }

    Ok(())
}
