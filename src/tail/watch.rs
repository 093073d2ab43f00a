//! The live pipeline loop.
//!
//! One task owns the [`Tailer`] and the [`LiveStore`] and multiplexes file
//! notifications, timers, store queries and shutdown with `select!`, so the
//! store never needs a lock.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use color_eyre::eyre::Result;
use notify::RecommendedWatcher;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior, Sleep};

use crate::config::Timing;
use crate::events::spawn_file_watcher;
use crate::ingest::{classify, SourceKind};
use crate::store::{LiveStore, StoreRequest};

use super::{Clock, Tailer};

/// Drive the tailer until `shutdown` resolves.
///
/// Every completed line is classified with the live gateway rules and
/// recorded (persisted, then inserted). Store queries are answered between
/// file reads, so a query never observes a half-processed batch.
pub async fn run<C, F>(
    mut tailer: Tailer<C>,
    timing: Timing,
    mut store: LiveStore,
    mut requests: mpsc::Receiver<StoreRequest>,
    shutdown: F,
) -> Result<()>
where
    C: Clock,
    F: Future<Output = ()>,
{
    let (change_tx, mut changes) = mpsc::unbounded_channel::<PathBuf>();
    let mut watcher: Option<RecommendedWatcher> = None;

    let mut retry = time::interval(timing.retry);
    retry.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut rotation = time::interval_at(Instant::now() + timing.rotation_check, timing.rotation_check);
    rotation.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut resume: Option<Pin<Box<Sleep>>> = None;
    let mut queries_open = true;

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutting down");
                break;
            }
            request = requests.recv(), if queries_open => match request {
                Some(request) => store.answer(request),
                None => queries_open = false,
            },
            Some(_) = changes.recv() => {
                ingest(&mut store, tailer.on_change());
            }
            _ = retry.tick(), if resume.is_none() => {
                tailer.try_open();
                if let Some(path) = tailer.watched_path().map(Path::to_path_buf) {
                    if watcher.is_none() {
                        watcher = watch(&path, &change_tx);
                    }
                    ingest(&mut store, tailer.on_change());
                }
            }
            _ = rotation.tick() => {
                if tailer.check_rotation().is_some() {
                    watcher = None;
                    resume = Some(Box::pin(time::sleep(timing.rotation_delay)));
                }
            }
            _ = wait(&mut resume), if resume.is_some() => {
                resume = None;
                tailer.finish_rotation();
                retry.reset_immediately();
            }
        }
    }

    drop(watcher);
    Ok(())
}

fn watch(path: &Path, tx: &mpsc::UnboundedSender<PathBuf>) -> Option<RecommendedWatcher> {
    match spawn_file_watcher(path, tx.clone()) {
        Ok(w) => Some(w),
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "cannot watch log, polling instead");
            None
        }
    }
}

fn ingest(store: &mut LiveStore, lines: Vec<String>) {
    for line in lines {
        for event in classify(&line, &SourceKind::GatewayLive) {
            tracing::info!("{}:{} - {}", event.event_type, event.action, event.status);
            store.record(event);
        }
    }
}

async fn wait(delay: &mut Option<Pin<Box<Sleep>>>) {
    match delay {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
