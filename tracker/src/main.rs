//! Codepulse Tracker - local editor-activity telemetry daemon.
//!
//! This binary consumes editor events as JSON lines on stdin, aggregates
//! them into per-project session payloads, and dispatches finished sessions
//! to the ingestion endpoint (falling back to a durable offline queue when
//! the network is down).
//!
//! # Commands
//!
//! - `codepulse-tracker run`: Start the tracker daemon
//! - `codepulse-tracker flush`: Drain the offline queue once and exit
//!
//! # Event feed
//!
//! Each stdin line is one JSON record:
//!
//! ```json
//! {"project": {"directory": "/home/u/proj", "identifier": "/home/u/proj", "resource": {}},
//!  "event": {"file": "src/main.rs", "kind": "typed", "lines_added": 1, "lines_removed": 0}}
//! ```
//!
//! # Environment Variables
//!
//! See the [`codepulse_tracker::config`] module for available options.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use codepulse_tracker::aggregator::EventAggregator;
use codepulse_tracker::clock::SystemClock;
use codepulse_tracker::config::Config;
use codepulse_tracker::dispatch::{DispatchError, DispatchRouter};
use codepulse_tracker::finalizer::finalize;
use codepulse_tracker::sender::HttpBatchSender;
use codepulse_tracker::store::FileOfflineStore;
use codepulse_tracker::types::{EditorEvent, EnvironmentInfo, ProjectIdentity, SessionPayload};
use codepulse_tracker::validator::has_signal;

/// How often idle sessions are checked for closing.
const IDLE_CHECK_INTERVAL_SECS: u64 = 30;

/// Codepulse Tracker - local editor-activity telemetry daemon.
///
/// Aggregates editor events into per-project session payloads and forwards
/// them to the Codepulse ingestion endpoint.
#[derive(Parser, Debug)]
#[command(name = "codepulse-tracker")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    CODEPULSE_API_URL                 Ingestion API base URL (required)
    CODEPULSE_API_TOKEN               Bearer token for the ingestion API
    CODEPULSE_OFFLINE_FILE            Offline queue file (default: ~/.codepulse/offline.json)
    CODEPULSE_PLUGIN_ID               Numeric plugin identifier (default: 2)
    CODEPULSE_SESSION_THRESHOLD_SECS  Idle seconds before a session closes (default: 900)
    CODEPULSE_FLUSH_INTERVAL_SECS     Seconds between offline flushes (default: 1800)

EXAMPLES:
    # Start the tracker, feeding it events from an editor bridge
    export CODEPULSE_API_URL=https://api.codepulse.dev
    editor-bridge | codepulse-tracker run

    # Drain the offline queue once
    codepulse-tracker flush
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Start the tracker daemon.
    ///
    /// Reads editor events from stdin until EOF or ctrl-c, closing idle
    /// sessions and flushing the offline queue on an interval.
    Run,

    /// Drain the offline queue once and exit.
    ///
    /// Sends every queued payload as a single batch; on failure the queue
    /// file is left untouched for the next attempt.
    Flush,
}

/// One stdin record: the event plus the project it belongs to.
#[derive(Debug, Deserialize)]
struct EventEnvelope {
    project: ProjectIdentity,
    event: EditorEvent,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    match cli.command {
        Command::Run => runtime.block_on(run_tracker()),
        Command::Flush => runtime.block_on(run_flush()),
    }
}

/// Runs the one-shot offline queue drain.
async fn run_flush() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    let sender = HttpBatchSender::new(config.api_url.clone(), config.api_token.clone());
    let store = FileOfflineStore::new(config.offline_file.clone());

    let flushed = store
        .flush(&sender)
        .await
        .context("Failed to flush offline queue")?;
    println!("Flushed {flushed} queued payload(s)");
    Ok(())
}

/// Runs the tracker daemon until stdin closes or ctrl-c arrives.
async fn run_tracker() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(api_url = %config.api_url, "Starting Codepulse tracker");

    let env = EnvironmentInfo::detect(config.plugin_id);
    let mut aggregator = EventAggregator::new(SystemClock, env);
    let router = DispatchRouter::new(
        HttpBatchSender::new(config.api_url.clone(), config.api_token.clone()),
        FileOfflineStore::new(config.offline_file.clone()),
    );

    // Last event time per project directory, for the idle-close trigger.
    let mut last_activity: HashMap<String, Instant> = HashMap::new();
    let session_threshold = Duration::from_secs(config.session_threshold_secs);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut idle_check = tokio::time::interval(Duration::from_secs(
        IDLE_CHECK_INTERVAL_SECS.min(config.session_threshold_secs),
    ));
    // The first flush tick fires immediately, draining any queue left over
    // from a previous run.
    let mut flush_tick = tokio::time::interval(Duration::from_secs(config.flush_interval_secs));

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    handle_line(&line, &mut aggregator, &mut last_activity);
                }
                Ok(None) => {
                    info!("Event feed closed, shutting down");
                    break;
                }
                Err(err) => {
                    error!(error = %err, "Failed to read event feed");
                    break;
                }
            },
            _ = idle_check.tick() => {
                close_idle_sessions(
                    &mut aggregator,
                    &mut last_activity,
                    session_threshold,
                    &router,
                )
                .await;
            }
            _ = flush_tick.tick() => {
                match router.store().flush(router.sender()).await {
                    Ok(0) => {}
                    Ok(flushed) => info!(flushed, "Drained offline queue"),
                    Err(err) => warn!(error = %err, "Offline flush failed, will retry"),
                }
            }
            _ = signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    // Flush-all at shutdown: close every live session, then try to drain
    // whatever ended up queued.
    for payload in aggregator.take_all() {
        close_session(payload, &mut aggregator, &router).await;
    }
    if let Err(err) = router.store().flush(router.sender()).await {
        warn!(error = %err, "Final offline flush failed; queue remains on disk");
    }

    Ok(())
}

/// Parses and records one stdin event line.
fn handle_line(
    line: &str,
    aggregator: &mut EventAggregator<SystemClock>,
    last_activity: &mut HashMap<String, Instant>,
) {
    if line.trim().is_empty() {
        return;
    }

    let envelope: EventEnvelope = match serde_json::from_str(line) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(error = %err, "Skipping unparsable event line");
            return;
        }
    };

    match aggregator.record(&envelope.project, &envelope.event) {
        Ok(()) => {
            last_activity.insert(envelope.project.directory.clone(), Instant::now());
        }
        Err(err) => {
            // A bad event is dropped on its own; the session is intact.
            warn!(error = %err, file = %envelope.event.file, "Rejected event");
        }
    }
}

/// Closes and dispatches every session idle past the threshold.
async fn close_idle_sessions(
    aggregator: &mut EventAggregator<SystemClock>,
    last_activity: &mut HashMap<String, Instant>,
    threshold: Duration,
    router: &DispatchRouter<HttpBatchSender, FileOfflineStore>,
) {
    let idle: Vec<String> = last_activity
        .iter()
        .filter(|(_, seen)| seen.elapsed() >= threshold)
        .map(|(directory, _)| directory.clone())
        .collect();

    for directory in idle {
        last_activity.remove(&directory);
        if let Some(payload) = aggregator.take(&directory) {
            debug!(project = %directory, "Closing idle session");
            close_session(payload, aggregator, router).await;
        }
    }
}

/// Validates, finalizes, and dispatches one detached session payload.
///
/// Sessions without signal are discarded. Finalization failure restores the
/// payload into the aggregator for a later retry. An immediate send is
/// attempted first; on transport failure the payload falls back to the
/// durable offline queue.
async fn close_session(
    mut payload: SessionPayload,
    aggregator: &mut EventAggregator<SystemClock>,
    router: &DispatchRouter<HttpBatchSender, FileOfflineStore>,
) {
    if !has_signal(&mut payload) {
        debug!(project = %payload.project.directory, "Discarding session without signal");
        return;
    }

    let finalized = match finalize(&payload, &SystemClock) {
        Ok(finalized) => finalized,
        Err(err) => {
            warn!(error = %err, "Finalization failed, session will retry");
            aggregator.restore(payload);
            return;
        }
    };

    match router.send(finalized, true).await {
        Ok(dispatch) => debug!(?dispatch, "Session dispatched"),
        Err(DispatchError::Transport { payload, source }) => {
            warn!(error = %source, "Immediate send failed, queuing payload");
            match router.send(*payload, false).await {
                Ok(_) => {}
                Err(err) => {
                    // Documented risk: the payload is lost for this attempt.
                    error!(error = %err, "Failed to queue payload after send failure");
                }
            }
        }
        Err(DispatchError::Store { source, .. }) => {
            error!(error = %source, "Failed to queue payload");
        }
    }
}
