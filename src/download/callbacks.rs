// src/download/callbacks.rs

//! Download callback protocol
//!
//! The orchestrator reports task lifecycle events through this trait.
//! For each task it calls `add_new_download` exactly once before the
//! transfer starts; the returned value is an opaque context handed back
//! verbatim to every later call for that task. Callbacks for one task
//! are never invoked concurrently with each other, but callbacks for
//! different tasks may run on different workers at the same time, so
//! implementations must be `Send + Sync`.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{info, warn};

/// Terminal status of one download task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// Transfer completed and verified
    Successful,
    /// Destination already held valid content; nothing was transferred
    AlreadyExists,
    /// All mirrors exhausted or the task was canceled
    Error,
}

/// Callback interface invoked by the download orchestrator
///
/// All methods default to no-ops so implementations only override what
/// they care about.
pub trait DownloadCallbacks: Send + Sync {
    /// Called once before a task starts; the return value becomes the
    /// opaque context passed to every later callback for this task
    fn add_new_download(&self, user_data: u64, description: &str, total_size: u64) -> u64 {
        let _ = (description, total_size);
        user_data
    }

    /// Called zero or more times while a transfer runs
    fn progress(&self, context: u64, total: u64, downloaded: u64) {
        let _ = (context, total, downloaded);
    }

    /// Called once per failed mirror attempt, before falling back to
    /// the next mirror; the task is not terminated by this call
    fn mirror_failure(&self, context: u64, message: &str, url: &str) {
        let _ = (context, message, url);
    }

    /// Called exactly once per task; `message` is set only on `Error`
    fn end(&self, context: u64, status: TransferStatus, message: Option<&str>) {
        let _ = (context, status, message);
    }
}

/// Callbacks that ignore every event
#[derive(Debug, Default)]
pub struct NullCallbacks;

impl DownloadCallbacks for NullCallbacks {}

/// Console progress bars for a batch of downloads
///
/// Each task gets its own indicatif bar inside a `MultiProgress`;
/// contexts index into the bar table.
pub struct ProgressBarCallbacks {
    multi: MultiProgress,
    bars: Mutex<HashMap<u64, ProgressBar>>,
    next_context: AtomicU64,
}

impl ProgressBarCallbacks {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
            next_context: AtomicU64::new(1),
        }
    }

    fn styled_bar(size: u64, name: &str) -> ProgressBar {
        let pb = ProgressBar::new(size);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );
        pb.set_message(name.to_string());
        pb
    }
}

impl Default for ProgressBarCallbacks {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadCallbacks for ProgressBarCallbacks {
    fn add_new_download(&self, _user_data: u64, description: &str, total_size: u64) -> u64 {
        let context = self.next_context.fetch_add(1, Ordering::Relaxed);
        let bar = self.multi.add(Self::styled_bar(total_size, description));
        self.bars.lock().unwrap().insert(context, bar);
        context
    }

    fn progress(&self, context: u64, total: u64, downloaded: u64) {
        if let Some(bar) = self.bars.lock().unwrap().get(&context) {
            if total > 0 && bar.length() != Some(total) {
                bar.set_length(total);
            }
            bar.set_position(downloaded);
        }
    }

    fn mirror_failure(&self, context: u64, message: &str, url: &str) {
        warn!("Mirror {} failed: {}", url, message);
        if let Some(bar) = self.bars.lock().unwrap().get(&context) {
            bar.set_message(format!("retrying on next mirror ({message})"));
        }
    }

    fn end(&self, context: u64, status: TransferStatus, message: Option<&str>) {
        if let Some(bar) = self.bars.lock().unwrap().remove(&context) {
            match status {
                TransferStatus::Successful => bar.finish_with_message("[done]"),
                TransferStatus::AlreadyExists => bar.finish_with_message("[cached]"),
                TransferStatus::Error => {
                    bar.abandon_with_message(format!(
                        "[FAILED: {}]",
                        message.unwrap_or("unknown error")
                    ));
                }
            }
        }
        if status == TransferStatus::Successful {
            info!("Download finished (context {})", context);
        }
    }
}
