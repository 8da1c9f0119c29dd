//! The recorder: poll the clipboard and write new content into the history.

use std::future::Future;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::entry::ClipboardContent;
use crate::error::Result;
use crate::history::History;
use crate::monitor::{ClipboardMonitor, ClipboardSource, MonitorConfig, SystemClipboard};
use crate::platform;

/// Capacity of the monitor to recorder channel.
const CHANNEL_CAPACITY: usize = 32;

/// Record the system clipboard until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the history cannot be opened.
pub async fn run(config: Config) -> Result<()> {
    platform::init()?;
    let history = History::open(&config)?;
    info!(
        platform = platform::name(),
        database = %history.storage().path().display(),
        images = %history.images().dir().display(),
        "Recorder starting"
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };
    run_with(&config, &history, SystemClipboard, shutdown).await
}

/// Record from `source` until `shutdown` completes.
///
/// Auto-clean runs once at startup and again every
/// `cleanup.clean_interval_hours` while enabled.
///
/// # Errors
///
/// Currently infallible after startup; recording failures are logged and
/// the loop keeps going.
pub async fn run_with<S>(
    config: &Config,
    history: &History,
    source: S,
    shutdown: impl Future<Output = ()>,
) -> Result<()>
where
    S: ClipboardSource + 'static,
{
    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
    let mut monitor = ClipboardMonitor::new(source, MonitorConfig::from(&config.capture));
    let handle = monitor.stop_handle();
    let monitor_task = tokio::spawn(async move { monitor.run(tx).await });

    // The first tick fires immediately and covers the startup clean
    let mut cleanup = tokio::time::interval(config.clean_interval());
    let mut shutdown = std::pin::pin!(shutdown);

    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some(content) = received else {
                    warn!("Clipboard monitor exited");
                    break;
                };
                record(history, &content);
            }
            _ = cleanup.tick() => {
                if let Some(days) = config.auto_clean_days() {
                    if let Err(e) = history.clean_older_than_days(days) {
                        warn!(error = %e, "Automatic cleanup failed");
                    }
                }
            }
            () = shutdown.as_mut() => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    handle.stop();
    let drained = drain(history, rx).await;
    if drained > 0 {
        info!(drained, "Recorded pending clipboard content");
    }
    match monitor_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Clipboard monitor failed"),
        Err(e) => warn!(error = %e, "Clipboard monitor task panicked"),
    }

    info!("Recorder stopped");
    Ok(())
}

/// Record whatever the monitor already queued, then stop accepting more.
async fn drain(history: &History, mut rx: mpsc::Receiver<ClipboardContent>) -> usize {
    rx.close();
    let mut drained = 0;
    while let Some(content) = rx.recv().await {
        record(history, &content);
        drained += 1;
    }
    drained
}

fn record(history: &History, content: &ClipboardContent) {
    match history.record(content) {
        Ok(Some(entry)) => info!(
            id = entry.id,
            preview = %entry.preview(50),
            "Captured"
        ),
        Ok(None) => {}
        Err(e) => warn!(error = %e, kind = %content.kind(), "Failed to record clipboard content"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Utc;

    use crate::entry::Entry;
    use crate::images::ImageStore;
    use crate::monitor::MemoryClipboard;
    use crate::storage::Storage;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.capture.poll_interval_ms = 10;
        config
    }

    fn test_history(dir: &tempfile::TempDir) -> History {
        History::new(
            Storage::open_in_memory().unwrap(),
            ImageStore::new(dir.path().join("images")).unwrap(),
        )
    }

    async fn wait_for_entries(history: &History, count: i64) {
        for _ in 0..200 {
            if history.stats().unwrap().total_entries >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {count} entries");
    }

    #[tokio::test]
    async fn test_records_clipboard_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let history = test_history(&dir);
        let clipboard = MemoryClipboard::default();
        clipboard.set_text("first copy");

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let shutdown = async {
            let _ = stop_rx.await;
        };

        let driver = async {
            wait_for_entries(&history, 1).await;
            clipboard.set_text("second copy");
            wait_for_entries(&history, 2).await;
            clipboard.set_text("first copy");
            // Re-copying merges, so the count stays at two
            tokio::time::sleep(Duration::from_millis(100)).await;
            stop_tx.send(()).unwrap();
        };

        let config = test_config();
        let (result, ()) = tokio::join!(
            run_with(&config, &history, clipboard.clone(), shutdown),
            driver
        );
        result.unwrap();

        let entries = history.list(10, None).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].content, "first copy");
    }

    #[tokio::test]
    async fn test_drain_records_queued_content() {
        let dir = tempfile::tempdir().unwrap();
        let history = test_history(&dir);
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tx.send(ClipboardContent::Text("queued one".to_string()))
            .await
            .unwrap();
        tx.send(ClipboardContent::Text("queued two".to_string()))
            .await
            .unwrap();

        // The sender stays alive, as it does while the monitor winds down
        assert_eq!(drain(&history, rx).await, 2);
        assert!(tx.is_closed());

        let entries = history.list(10, None).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].content, "queued two");
    }

    #[tokio::test]
    async fn test_startup_clean_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let history = test_history(&dir);
        let mut old = Entry::text("stale");
        old.timestamp = Utc::now() - chrono::Duration::days(30);
        history.storage().insert(&old).unwrap();

        let mut config = test_config();
        config.cleanup.auto_clean_enabled = true;
        config.cleanup.auto_clean_days = 5;

        let shutdown = tokio::time::sleep(Duration::from_millis(100));
        run_with(&config, &history, MemoryClipboard::default(), shutdown)
            .await
            .unwrap();

        assert_eq!(history.stats().unwrap().total_entries, 0);
    }

    #[tokio::test]
    async fn test_no_clean_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let history = test_history(&dir);
        let mut old = Entry::text("kept");
        old.timestamp = Utc::now() - chrono::Duration::days(30);
        history.storage().insert(&old).unwrap();

        let shutdown = tokio::time::sleep(Duration::from_millis(50));
        run_with(&test_config(), &history, MemoryClipboard::default(), shutdown)
            .await
            .unwrap();

        assert_eq!(history.stats().unwrap().total_entries, 1);
    }
}
