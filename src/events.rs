use std::path::{Path, PathBuf};

use notify::{Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Watch a single file and forward its change notifications into the
/// pipeline loop. Dropping the returned watcher stops the notifications.
pub fn spawn_file_watcher(
    path: &Path,
    tx: mpsc::UnboundedSender<PathBuf>,
) -> notify::Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<NotifyEvent>| {
        match res {
            Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
                for path in event.paths {
                    // The loop only goes away at shutdown.
                    let _ = tx.send(path);
                }
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(%err, "file watcher error"),
        }
    })?;
    watcher.watch(path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Resolve when the process is asked to stop (Ctrl-C, or SIGTERM on unix).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(%err, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::warn!(%err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[tokio::test]
    async fn test_watcher_forwards_modifications() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("gateway.log");
        std::fs::write(&path, b"").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _watcher = spawn_file_watcher(&path, tx).unwrap();

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "line").unwrap();
        f.sync_all().unwrap();

        let changed = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(changed.ends_with("gateway.log"));
    }

    #[test]
    fn test_watching_missing_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(spawn_file_watcher(&tmp.path().join("absent.log"), tx).is_err());
    }
}
