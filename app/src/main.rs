//! Pricewatch command-line entry point.
//!
//! Thin shell over the workspace crates: parses the command line, installs
//! logging, opens configuration and the database, and dispatches.

mod commands;
mod state;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::WatchToggle;
use state::AppState;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pricewatch",
    version,
    about = "Crawl watched product pages on a schedule and report what changed"
)]
struct Cli {
    /// Config file (defaults to ~/.config/pricewatch/config.toml).
    #[arg(long, short, env = "PRICEWATCH_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl due items every day at the configured time until Ctrl-C.
    Run {
        /// Also run once right away.
        #[arg(long, default_value_t = false)]
        now: bool,
    },
    /// Crawl a single item now.
    Crawl {
        /// Item ID
        item: String,
    },
    /// Crawl a list of items in paced batches.
    Batch {
        /// Item IDs
        #[arg(required = true)]
        items: Vec<String>,
        /// Items crawled concurrently per batch.
        #[arg(long)]
        batch_size: Option<usize>,
        /// Seconds to wait between batches.
        #[arg(long)]
        pacing_secs: Option<u64>,
    },
    /// Crawl every watched item that is due, once.
    Due,
    /// Show what changed since the prior observation.
    Diff {
        /// Item ID
        item: String,
    },
    /// Show the change history of an item.
    History {
        /// Item ID
        item: String,
        /// How many days back to look.
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Manage the watch-list.
    Watch {
        #[command(subcommand)]
        action: WatchCommand,
    },
}

#[derive(Subcommand, Debug)]
enum WatchCommand {
    /// Start watching an item (or reactivate it).
    Add {
        /// Item ID
        item: String,
        /// daily, weekly or monthly
        #[arg(long, default_value = "daily")]
        cadence: String,
        /// Free-form note
        #[arg(long)]
        note: Option<String>,
    },
    /// Stop watching an item. History is kept.
    Remove {
        /// Item ID
        item: String,
    },
    /// Temporarily stop crawling an item.
    Pause {
        /// Item ID
        item: String,
    },
    /// Resume crawling a paused item.
    Resume {
        /// Item ID
        item: String,
    },
    /// List watched items.
    List,
}

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pricewatch=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn dispatch(state: &AppState, command: Command) -> Result<()> {
    match command {
        Command::Run { now } => commands::run(state, now).await,
        Command::Crawl { item } => commands::crawl(state, &item).await,
        Command::Batch {
            items,
            batch_size,
            pacing_secs,
        } => commands::batch(state, &items, batch_size, pacing_secs).await,
        Command::Due => commands::due(state).await,
        Command::Diff { item } => commands::diff(state, &item).await,
        Command::History { item, days } => commands::history(state, &item, days).await,
        Command::Watch { action } => match action {
            WatchCommand::Add {
                item,
                cadence,
                note,
            } => commands::watch_add(state, &item, &cadence, note.as_deref()).await,
            WatchCommand::Remove { item } => {
                commands::watch_toggle(state, &item, WatchToggle::Remove).await
            }
            WatchCommand::Pause { item } => {
                commands::watch_toggle(state, &item, WatchToggle::Pause).await
            }
            WatchCommand::Resume { item } => {
                commands::watch_toggle(state, &item, WatchToggle::Resume).await
            }
            WatchCommand::List => commands::watch_list(state).await,
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    tracing::info!("Starting Pricewatch v{}", env!("CARGO_PKG_VERSION"));

    let state = AppState::open(cli.config.as_deref()).await?;
    let result = dispatch(&state, cli.command).await;
    state.close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_history_days() {
        let cli = Cli::try_parse_from(["pricewatch", "history", "B019QZBS10", "--days", "30"])
            .expect("parse");
        assert!(matches!(cli.command, Command::History { days: 30, .. }));
    }

    #[test]
    fn test_batch_requires_items() {
        assert!(Cli::try_parse_from(["pricewatch", "batch"]).is_err());
    }

    #[test]
    fn test_watch_add_defaults_to_daily() {
        let cli = Cli::try_parse_from(["pricewatch", "watch", "add", "B019QZBS10"]).expect("parse");
        match cli.command {
            Command::Watch {
                action: WatchCommand::Add { cadence, note, .. },
            } => {
                assert_eq!(cadence, "daily");
                assert!(note.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
