//! keylapse - operator CLI
//!
//! Manages scheduled deletions in a JSON file store. One-shot commands exit
//! right away; the expiry records they write are durable, so `watch` (or any
//! later `restore`) carries the deletions out.

use anyhow::Context;
use clap::{Parser, Subcommand};
use keylapse::store::{FileStore, PersistentStore};
use keylapse::{Clock, DeletionScheduler, SchedulerConfig, SystemClock, DEFAULT_META_PREFIX};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "keylapse", version, about = "Durable key eviction for a JSON file store")]
struct Cli {
    /// Path of the store file
    #[arg(short = 's', long = "store", default_value = "keylapse.json")]
    store: PathBuf,

    /// Key prefix for expiry records
    #[arg(long = "prefix", default_value = DEFAULT_META_PREFIX)]
    prefix: String,

    /// Longest single timer chunk in milliseconds
    #[arg(long = "max-timeout-ms")]
    max_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a value
    Set { key: String, value: String },
    /// Print a value
    Get { key: String },
    /// Schedule a key for deletion (default: the configured retention)
    Schedule {
        key: String,
        #[arg(long = "days", conflicts_with = "ms")]
        days: Option<f64>,
        #[arg(long = "ms")]
        ms: Option<i64>,
    },
    /// Cancel a key's scheduled deletion
    Cancel { key: String },
    /// List pending deletions
    Pending,
    /// Execute overdue deletions and report what is still pending
    Restore,
    /// Restore, then keep carrying out deletions until Ctrl+C
    Watch,
}

impl Cli {
    fn scheduler_config(&self) -> SchedulerConfig {
        let config = SchedulerConfig::default().with_meta_prefix(self.prefix.clone());
        match self.max_timeout_ms {
            Some(ms) => config.with_max_timeout(Duration::from_millis(ms)),
            None => config,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let store = Arc::new(
        FileStore::open(&cli.store)
            .with_context(|| format!("failed to open store {}", cli.store.display()))?,
    );
    let scheduler = DeletionScheduler::new(store.clone(), cli.scheduler_config());

    match cli.command {
        Commands::Set { key, value } => {
            store.set(&key, &value)?;
            println!("OK");
        }
        Commands::Get { key } => match store.get(&key)? {
            Some(value) => println!("{}", value),
            None => println!("(nil)"),
        },
        Commands::Schedule { key, days, ms } => {
            match (days, ms) {
                (_, Some(ms)) => scheduler.schedule_deletion_after_ms(&key, ms),
                (Some(days), None) => {
                    scheduler.schedule_deletion_after_days(&key, days);
                }
                (None, None) => {
                    scheduler.schedule_default_deletion(&key);
                }
            }
            match scheduler.expires_at(&key) {
                Some(expires_at) => println!(
                    "{} will be deleted in {}",
                    key,
                    format_remaining(expires_at - SystemClock.now_ms())
                ),
                None if store.get(&key)?.is_none() => println!("{} deleted", key),
                None => anyhow::bail!("could not persist the schedule for {}", key),
            }
        }
        Commands::Cancel { key } => {
            scheduler.cancel_scheduled_deletion(&key);
            println!("OK");
        }
        Commands::Pending => print_pending(&scheduler),
        Commands::Restore => {
            scheduler.restore_scheduled_deletions();
            let stats = scheduler.stats();
            println!(
                "deleted {}, dropped {} corrupt record(s)",
                stats.deletions, stats.corrupt_records
            );
            print_pending(&scheduler);
        }
        Commands::Watch => {
            scheduler.restore_scheduled_deletions();
            info!(
                store = %cli.store.display(),
                armed = scheduler.armed_count(),
                "Watching scheduled deletions, Ctrl+C to stop"
            );

            signal::ctrl_c()
                .await
                .context("failed to install Ctrl+C handler")?;

            scheduler.shutdown();
            let stats = scheduler.stats();
            info!(deletions = stats.deletions, "Shutdown complete");
        }
    }

    Ok(())
}

fn print_pending(scheduler: &DeletionScheduler) {
    let mut pending = scheduler.pending();
    if pending.is_empty() {
        println!("(no pending deletions)");
        return;
    }

    pending.sort_by_key(|(_, expires_at)| *expires_at);
    let now = SystemClock.now_ms();
    for (key, expires_at) in pending {
        let state = match scheduler.armed_expiry(&key) {
            Some(_) => "armed",
            None => "stored",
        };
        println!(
            "{:<32} {:>15}  {:<6}  in {}",
            key,
            expires_at,
            state,
            format_remaining(expires_at - now)
        );
    }
}

/// Renders a millisecond span as `1d 2h 3m 4s`.
fn format_remaining(ms: i64) -> String {
    if ms <= 0 {
        return "0s (overdue)".to_string();
    }

    let secs = ms / 1000;
    let (days, hours, mins, secs) = (secs / 86_400, secs % 86_400 / 3600, secs % 3600 / 60, secs % 60);

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if mins > 0 {
        parts.push(format!("{}m", mins));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{}s", secs));
    }
    parts.join(" ")
}
