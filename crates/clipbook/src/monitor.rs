//! Clipboard polling.
//!
//! [`ClipboardSource`] abstracts the system clipboard so the polling logic
//! can be driven by a fake in tests. [`ClipboardMonitor`] polls a source on
//! a fixed interval and forwards content whose hash differs from the last
//! one it saw.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clipboard_rs::common::{RustImage, RustImageData};
use clipboard_rs::{Clipboard, ClipboardContext, ContentFormat};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, trace, warn};

use crate::config::CaptureConfig;
use crate::entry::{ClipboardContent, ImageData};

/// Errors that can occur while talking to the clipboard.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The clipboard could not be opened, read or written.
    #[error("clipboard access failed: {0}")]
    Access(String),

    /// Image data on the clipboard could not be converted.
    #[error("clipboard image conversion failed: {0}")]
    ImageConversion(String),

    /// The monitor is already running.
    #[error("monitor already running")]
    AlreadyRunning,
}

/// Result type for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

impl From<MonitorError> for crate::Error {
    fn from(err: MonitorError) -> Self {
        Self::clipboard(err.to_string())
    }
}

/// Something that holds clipboard content.
pub trait ClipboardSource: Send {
    /// Read the current content. An image wins over text when both are
    /// present; an empty clipboard yields `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the clipboard cannot be accessed.
    fn read(&self) -> Result<Option<ClipboardContent>>;

    /// Replace the clipboard content with text.
    ///
    /// # Errors
    ///
    /// Returns an error if the clipboard cannot be written.
    fn write_text(&self, text: &str) -> Result<()>;

    /// Replace the clipboard content with a PNG image.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be decoded or the clipboard
    /// cannot be written.
    fn write_image(&self, png: &[u8]) -> Result<()>;
}

/// The system clipboard, via `clipboard-rs`.
///
/// A fresh context is opened for every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    fn context() -> Result<ClipboardContext> {
        ClipboardContext::new().map_err(|e| MonitorError::Access(e.to_string()))
    }
}

impl ClipboardSource for SystemClipboard {
    fn read(&self) -> Result<Option<ClipboardContent>> {
        let ctx = Self::context()?;

        if ctx.has(ContentFormat::Image) {
            match ctx.get_image() {
                Ok(image) => {
                    let (width, height) = image.get_size();
                    let png = image
                        .to_png()
                        .map_err(|e| MonitorError::ImageConversion(e.to_string()))?;
                    return Ok(Some(ClipboardContent::Image(ImageData {
                        png: png.get_bytes().to_vec(),
                        width,
                        height,
                    })));
                }
                Err(e) => debug!(error = %e, "Image format advertised but unreadable"),
            }
        }

        match ctx.get_text() {
            Ok(text) if !text.is_empty() => Ok(Some(ClipboardContent::Text(text))),
            // Non-text clipboard is not an error
            Ok(_) | Err(_) => Ok(None),
        }
    }

    fn write_text(&self, text: &str) -> Result<()> {
        Self::context()?
            .set_text(text.to_string())
            .map_err(|e| MonitorError::Access(e.to_string()))
    }

    fn write_image(&self, png: &[u8]) -> Result<()> {
        let image = RustImageData::from_bytes(png)
            .map_err(|e| MonitorError::ImageConversion(e.to_string()))?;
        Self::context()?
            .set_image(image)
            .map_err(|e| MonitorError::Access(e.to_string()))
    }
}

/// Configuration for the clipboard monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Interval between clipboard checks.
    pub poll_interval: Duration,
    /// Forward text content.
    pub text_enabled: bool,
    /// Forward image content.
    pub images_enabled: bool,
    /// Minimum text length in characters.
    pub min_content_length: usize,
    /// Maximum text length in characters; longer text is truncated.
    pub max_content_length: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

impl From<&CaptureConfig> for MonitorConfig {
    fn from(capture: &CaptureConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(capture.poll_interval_ms),
            text_enabled: capture.text_enabled,
            images_enabled: capture.images_enabled,
            min_content_length: capture.min_content_length,
            max_content_length: capture.max_content_length,
        }
    }
}

#[derive(Debug, Default)]
struct MonitorState {
    running: AtomicBool,
    stop_requested: AtomicBool,
}

/// Polls a [`ClipboardSource`] for new content.
#[derive(Debug)]
pub struct ClipboardMonitor<S> {
    source: S,
    config: MonitorConfig,
    state: Arc<MonitorState>,
    last_hash: Option<String>,
}

impl<S: ClipboardSource> ClipboardMonitor<S> {
    /// Create a monitor over `source`.
    #[must_use]
    pub fn new(source: S, config: MonitorConfig) -> Self {
        Self {
            source,
            config,
            state: Arc::new(MonitorState::default()),
            last_hash: None,
        }
    }

    /// The monitor configuration.
    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Check if the polling loop is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Check the clipboard for new content.
    ///
    /// Returns `Some` when the content differs from the last content seen.
    /// Text and images share one "last seen" hash, so copying A, then an
    /// image, then A again reports A twice.
    ///
    /// # Errors
    ///
    /// Returns an error if clipboard access fails.
    pub fn check_for_changes(&mut self) -> Result<Option<ClipboardContent>> {
        let Some(content) = self.source.read()? else {
            return Ok(None);
        };

        let content = match content {
            ClipboardContent::Image(image) => {
                if !self.config.images_enabled {
                    trace!("Image capture disabled, skipping");
                    return Ok(None);
                }
                ClipboardContent::Image(image)
            }
            ClipboardContent::Text(text) => {
                if !self.config.text_enabled {
                    trace!("Text capture disabled, skipping");
                    return Ok(None);
                }
                match self.prepare_text(text) {
                    Some(text) => ClipboardContent::Text(text),
                    None => return Ok(None),
                }
            }
        };

        let hash = content.hash();
        if self.last_hash.as_deref() == Some(hash.as_str()) {
            trace!("Clipboard content unchanged");
            return Ok(None);
        }

        debug!(hash = %hash, kind = %content.kind(), "New clipboard content detected");
        self.last_hash = Some(hash);
        Ok(Some(content))
    }

    /// Apply the length limits to captured text.
    fn prepare_text(&self, text: String) -> Option<String> {
        if text.is_empty() {
            return None;
        }

        let len = text.chars().count();
        if len < self.config.min_content_length {
            trace!(
                len,
                min = self.config.min_content_length,
                "Clipboard content too short, skipping"
            );
            return None;
        }

        if len > self.config.max_content_length {
            debug!(
                len,
                max = self.config.max_content_length,
                "Truncating clipboard content"
            );
            return Some(truncate_chars(&text, self.config.max_content_length).to_string());
        }

        Some(text)
    }

    /// Poll the clipboard and send new content through the channel.
    ///
    /// Runs until [`MonitorHandle::stop`] is called or the receiver is
    /// dropped. Read errors are logged and polling continues.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::AlreadyRunning`] if the loop is already active.
    pub async fn run(&mut self, tx: mpsc::Sender<ClipboardContent>) -> Result<()> {
        if self.state.running.swap(true, Ordering::SeqCst) {
            return Err(MonitorError::AlreadyRunning);
        }

        debug!(
            interval_ms = self.config.poll_interval.as_millis(),
            "Starting clipboard monitor"
        );

        let mut ticker = interval(self.config.poll_interval);

        while !self.state.stop_requested.load(Ordering::SeqCst) {
            ticker.tick().await;
            if self.state.stop_requested.load(Ordering::SeqCst) {
                break;
            }

            match self.check_for_changes() {
                Ok(Some(content)) => {
                    if tx.send(content).await.is_err() {
                        debug!("Content channel closed, stopping monitor");
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "Error checking clipboard");
                }
            }
        }

        self.state.running.store(false, Ordering::SeqCst);
        debug!("Clipboard monitor stopped");
        Ok(())
    }

    /// Get a handle that can stop the monitor from another task.
    #[must_use]
    pub fn stop_handle(&self) -> MonitorHandle {
        MonitorHandle {
            state: Arc::clone(&self.state),
        }
    }
}

/// A cloneable handle to stop a running monitor.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    state: Arc<MonitorState>,
}

impl MonitorHandle {
    /// Ask the monitor to stop after its current poll.
    pub fn stop(&self) {
        debug!("Stopping clipboard monitor");
        self.state.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Check if the monitor loop is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Check if a stop has been requested.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.state.stop_requested.load(Ordering::SeqCst)
    }
}

/// Cut `text` to at most `max_chars` characters.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// In-memory clipboard for tests.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryClipboard {
    content: Arc<std::sync::Mutex<Option<ClipboardContent>>>,
    fail_reads: Arc<AtomicBool>,
}

#[cfg(test)]
impl MemoryClipboard {
    pub(crate) fn set(&self, content: Option<ClipboardContent>) {
        *self.content.lock().unwrap() = content;
    }

    pub(crate) fn get(&self) -> Option<ClipboardContent> {
        self.content.lock().unwrap().clone()
    }

    pub(crate) fn set_text(&self, text: &str) {
        self.set(Some(ClipboardContent::Text(text.to_string())));
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

#[cfg(test)]
impl ClipboardSource for MemoryClipboard {
    fn read(&self) -> Result<Option<ClipboardContent>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(MonitorError::Access("clipboard busy".to_string()));
        }
        Ok(self.get())
    }

    fn write_text(&self, text: &str) -> Result<()> {
        self.set_text(text);
        Ok(())
    }

    fn write_image(&self, png: &[u8]) -> Result<()> {
        let decoded =
            crate::images::decode_png(png).map_err(|e| MonitorError::ImageConversion(e.to_string()))?;
        self.set(Some(ClipboardContent::Image(ImageData {
            png: png.to_vec(),
            width: decoded.width(),
            height: decoded.height(),
        })));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_millis(10),
            ..MonitorConfig::default()
        }
    }

    fn image(png: &[u8]) -> ClipboardContent {
        ClipboardContent::Image(ImageData {
            png: png.to_vec(),
            width: 1,
            height: 1,
        })
    }

    #[test]
    fn test_monitor_config_from_capture() {
        let config = MonitorConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert!(config.text_enabled);
        assert!(config.images_enabled);
        assert_eq!(config.min_content_length, 1);
    }

    #[test]
    fn test_empty_clipboard() {
        let mut monitor = ClipboardMonitor::new(MemoryClipboard::default(), fast_config());
        assert!(monitor.check_for_changes().unwrap().is_none());
    }

    #[test]
    fn test_detects_only_changes() {
        let clipboard = MemoryClipboard::default();
        let mut monitor = ClipboardMonitor::new(clipboard.clone(), fast_config());

        clipboard.set_text("first");
        assert_eq!(
            monitor.check_for_changes().unwrap(),
            Some(ClipboardContent::Text("first".to_string()))
        );
        assert!(monitor.check_for_changes().unwrap().is_none());

        clipboard.set_text("second");
        assert!(monitor.check_for_changes().unwrap().is_some());
    }

    #[test]
    fn test_shared_hash_between_text_and_image() {
        let clipboard = MemoryClipboard::default();
        let mut monitor = ClipboardMonitor::new(clipboard.clone(), fast_config());

        clipboard.set_text("A");
        assert!(monitor.check_for_changes().unwrap().is_some());
        clipboard.set(Some(image(&[1, 2, 3])));
        assert!(monitor.check_for_changes().unwrap().is_some());
        clipboard.set_text("A");
        assert!(monitor.check_for_changes().unwrap().is_some());
    }

    #[test]
    fn test_empty_text_ignored() {
        let clipboard = MemoryClipboard::default();
        let mut monitor = ClipboardMonitor::new(clipboard.clone(), fast_config());
        clipboard.set_text("");
        assert!(monitor.check_for_changes().unwrap().is_none());
    }

    #[test]
    fn test_min_length() {
        let clipboard = MemoryClipboard::default();
        let config = MonitorConfig {
            min_content_length: 5,
            ..fast_config()
        };
        let mut monitor = ClipboardMonitor::new(clipboard.clone(), config);

        clipboard.set_text("abcd");
        assert!(monitor.check_for_changes().unwrap().is_none());
        clipboard.set_text("abcde");
        assert!(monitor.check_for_changes().unwrap().is_some());
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let clipboard = MemoryClipboard::default();
        let config = MonitorConfig {
            max_content_length: 3,
            ..fast_config()
        };
        let mut monitor = ClipboardMonitor::new(clipboard.clone(), config);

        clipboard.set_text("héllo wörld");
        assert_eq!(
            monitor.check_for_changes().unwrap(),
            Some(ClipboardContent::Text("hél".to_string()))
        );
    }

    #[test]
    fn test_disabled_kinds() {
        let clipboard = MemoryClipboard::default();
        let config = MonitorConfig {
            images_enabled: false,
            ..fast_config()
        };
        let mut monitor = ClipboardMonitor::new(clipboard.clone(), config);
        clipboard.set(Some(image(&[9])));
        assert!(monitor.check_for_changes().unwrap().is_none());

        let config = MonitorConfig {
            text_enabled: false,
            ..fast_config()
        };
        let mut monitor = ClipboardMonitor::new(clipboard.clone(), config);
        clipboard.set_text("hidden");
        assert!(monitor.check_for_changes().unwrap().is_none());
    }

    #[test]
    fn test_read_error_propagates() {
        let clipboard = MemoryClipboard::default();
        clipboard.fail_reads(true);
        let mut monitor = ClipboardMonitor::new(clipboard, fast_config());
        assert!(matches!(
            monitor.check_for_changes(),
            Err(MonitorError::Access(_))
        ));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("abc", 2), "ab");
        assert_eq!(truncate_chars("日本語", 1), "日");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_handle_shares_state() {
        let monitor = ClipboardMonitor::new(MemoryClipboard::default(), fast_config());
        let handle = monitor.stop_handle();
        let clone = handle.clone();

        assert!(!handle.is_running());
        assert!(!clone.should_stop());
        handle.stop();
        assert!(clone.should_stop());
    }

    #[test]
    fn test_monitor_error_into_crate_error() {
        let err: crate::Error = MonitorError::Access("busy".to_string()).into();
        assert!(matches!(err, crate::Error::Clipboard(_)));
        assert!(err.to_string().contains("busy"));
    }

    #[tokio::test]
    async fn test_run_forwards_changes_until_stopped() {
        let clipboard = MemoryClipboard::default();
        clipboard.set_text("hello");

        let mut monitor = ClipboardMonitor::new(clipboard.clone(), fast_config());
        let handle = monitor.stop_handle();
        let (tx, mut rx) = mpsc::channel(8);
        let task = tokio::spawn(async move { monitor.run(tx).await });

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, ClipboardContent::Text("hello".to_string()));

        clipboard.set_text("world");
        let second = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second, ClipboardContent::Text("world".to_string()));

        handle.stop();
        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn test_run_survives_read_errors() {
        let clipboard = MemoryClipboard::default();
        clipboard.fail_reads(true);

        let mut monitor = ClipboardMonitor::new(clipboard.clone(), fast_config());
        let handle = monitor.stop_handle();
        let (tx, mut rx) = mpsc::channel(8);
        let task = tokio::spawn(async move { monitor.run(tx).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        clipboard.fail_reads(false);
        clipboard.set_text("recovered");

        let content = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(content, ClipboardContent::Text("recovered".to_string()));

        handle.stop();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_when_receiver_dropped() {
        let clipboard = MemoryClipboard::default();
        clipboard.set_text("orphan");

        let mut monitor = ClipboardMonitor::new(clipboard, fast_config());
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let result = tokio::time::timeout(Duration::from_secs(2), monitor.run(tx))
            .await
            .unwrap();
        assert!(result.is_ok());
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn test_run_twice_rejected() {
        let mut monitor = ClipboardMonitor::new(MemoryClipboard::default(), fast_config());
        monitor.state.running.store(true, Ordering::SeqCst);
        let (tx, _rx) = mpsc::channel(1);
        assert!(matches!(
            monitor.run(tx).await,
            Err(MonitorError::AlreadyRunning)
        ));
    }
}
