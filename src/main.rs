use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use clap::{Parser as ClapParser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use tracing_subscriber::EnvFilter;

use activity_feed::api::{self, AppState};
use activity_feed::config::Config;
use activity_feed::events::shutdown_signal;
use activity_feed::ingest::gateway::parse_log_file;
use activity_feed::report;
use activity_feed::store::{ActivityLog, LiveHandle, LiveStore, TranscriptArchive};
use activity_feed::tail::{log_path_for, watch, Tailer};

/// Events printed by `transcripts` without `--serve`.
const CLI_LIMIT: usize = 100;
/// `--serve` without a value.
const DEFAULT_PORT_ARG: &str = "8742";
/// Pending store queries before HTTP handlers wait.
const REQUEST_BUFFER: usize = 64;

#[derive(ClapParser, Debug)]
#[command(name = "activity-feed", about = "Activity feed for an OpenClaw gateway")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tail today's gateway log into the persisted live store.
    Watch {
        /// Serve the HTTP API on this port.
        #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_PORT_ARG)]
        serve: Option<u16>,

        /// Directory holding openclaw-YYYY-MM-DD.log files.
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Where live events are persisted.
        #[arg(long)]
        activity_file: Option<PathBuf>,

        /// Number of events kept in memory.
        #[arg(long)]
        capacity: Option<usize>,
    },
    /// Read recent session transcripts of every agent.
    Transcripts {
        /// Serve the HTTP API on this port instead of printing.
        #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_PORT_ARG)]
        serve: Option<u16>,

        /// Gateway data directory (contains agents/).
        #[arg(long)]
        openclaw_dir: Option<PathBuf>,

        /// Only this agent.
        #[arg(long)]
        agent: Option<String>,

        /// Print events as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
    /// Classify one day's gateway log in a single pass.
    Logs {
        /// Day to read, YYYY-MM-DD (default: today, UTC).
        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Print events as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::default();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("Failed to start runtime")?;

    match cli.command {
        Command::Watch {
            serve,
            log_dir,
            activity_file,
            capacity,
        } => {
            if let Some(dir) = log_dir {
                config.log_dir = dir;
            }
            if let Some(file) = activity_file {
                config.activity_file = file;
            }
            if let Some(n) = capacity {
                config.capacity = n;
            }
            runtime.block_on(run_watch(config, serve))
        }
        Command::Transcripts {
            serve,
            openclaw_dir,
            agent,
            json,
        } => {
            if let Some(dir) = openclaw_dir {
                config.openclaw_dir = dir;
            }
            let archive = TranscriptArchive::new(&config.openclaw_dir);
            match serve {
                Some(port) => runtime.block_on(serve_transcripts(archive, port)),
                None => print_transcripts(&archive, agent.as_deref(), json),
            }
        }
        Command::Logs {
            date,
            log_dir,
            json,
        } => {
            if let Some(dir) = log_dir {
                config.log_dir = dir;
            }
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            print_log(&config, date, json)
        }
    }
}

async fn run_watch(config: Config, serve: Option<u16>) -> Result<()> {
    tracing::info!(log_dir = %config.log_dir.display(), "starting activity watcher");

    let listener = match serve {
        Some(port) => Some(api::bind(port).await?),
        None => None,
    };

    let store = LiveStore::open(ActivityLog::new(&config.activity_file), config.capacity);
    let (handle, requests) = LiveHandle::channel(REQUEST_BUFFER);

    let server = listener.map(|listener| {
        let state = AppState::Live(handle.clone());
        tokio::spawn(api::serve(listener, state, shutdown_signal()))
    });

    let tailer = Tailer::new(config.log_dir.clone());
    watch::run(tailer, config.timing, store, requests, shutdown_signal()).await?;

    drop(handle);
    if let Some(server) = server {
        server.await.wrap_err("HTTP server task panicked")??;
    }
    Ok(())
}

async fn serve_transcripts(archive: TranscriptArchive, port: u16) -> Result<()> {
    let listener = api::bind(port).await?;
    tracing::info!(dir = %archive.agents_dir().display(), "serving transcripts");
    api::serve(listener, AppState::Batch(Arc::new(archive)), shutdown_signal()).await
}

fn print_transcripts(archive: &TranscriptArchive, agent: Option<&str>, json: bool) -> Result<()> {
    let events = archive.scan(agent, CLI_LIMIT);
    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
    } else {
        print!("{}", report::transcript_summary(&events));
    }
    Ok(())
}

fn print_log(config: &Config, date: NaiveDate, json: bool) -> Result<()> {
    let path = log_path_for(&config.log_dir, date);
    tracing::info!(path = %path.display(), "parsing gateway log");

    let events = parse_log_file(&path);
    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
    } else {
        print!("{}", report::log_summary(&date.format("%Y-%m-%d").to_string(), &events));
    }
    Ok(())
}
