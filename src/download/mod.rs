// src/download/mod.rs

//! Download orchestrator
//!
//! Schedules a batch of transfers over a fixed-size worker pool with
//! mirror fallback and the callback protocol from
//! [`callbacks::DownloadCallbacks`]. Sources may be remote urls or
//! local paths; both go through the same task lifecycle so callers see
//! one protocol regardless of transport.
//!
//! Failure semantics: one task exhausting all of its mirrors ends that
//! task with `Error` and leaves the rest of the batch alone, unless
//! `fail_fast` is set, in which case remaining tasks are canceled.
//! Canceled tasks still receive a terminal `end` callback so callers
//! never wait on a callback that will not arrive.

mod callbacks;
mod client;

pub use callbacks::{DownloadCallbacks, NullCallbacks, ProgressBarCallbacks, TransferStatus};
pub use client::HttpClient;

use crate::error::{Error, Result};
use crate::hash::Checksum;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Default worker pool size for a batch
const DEFAULT_MAX_PARALLEL: usize = 4;

/// One pending transfer
#[derive(Debug, Clone)]
pub struct DownloadSpec {
    /// Candidate sources, tried in order; remote urls or local paths
    pub urls: Vec<String>,
    /// Where the finished file lands
    pub destination: PathBuf,
    /// Human-readable name for callbacks and progress display
    pub description: String,
    /// Declared size, passed to `add_new_download` (0 when unknown)
    pub expected_size: u64,
    /// Expected checksum; verified after transfer when present
    pub checksum: Option<Checksum>,
    /// Opaque value handed to `add_new_download`
    pub user_data: u64,
}

impl DownloadSpec {
    /// Transfer one source to one destination with no verification
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        let url = url.into();
        let description = url
            .rsplit('/')
            .next()
            .unwrap_or(&url)
            .to_string();
        Self {
            urls: vec![url],
            destination: destination.into(),
            description,
            expected_size: 0,
            checksum: None,
            user_data: 0,
        }
    }

    pub fn with_mirrors(mut self, urls: Vec<String>) -> Self {
        self.urls = urls;
        self
    }

    pub fn with_checksum(mut self, checksum: Checksum) -> Self {
        self.checksum = Some(checksum);
        self
    }

    pub fn with_expected_size(mut self, size: u64) -> Self {
        self.expected_size = size;
        self
    }

    pub fn with_user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }
}

/// Handle identifying a task within its batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(usize);

/// Terminal result of one task
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub handle: TaskHandle,
    pub status: TransferStatus,
    /// Set only when status is `Error`
    pub message: Option<String>,
}

impl TaskOutcome {
    pub fn is_error(&self) -> bool {
        self.status == TransferStatus::Error
    }
}

/// Concurrent download orchestrator for one batch of tasks
///
/// Owns its callback object for the lifetime of the batch; the
/// callbacks may be invoked from any worker thread, but never twice
/// concurrently for the same task context.
pub struct Downloader {
    client: HttpClient,
    callbacks: Box<dyn DownloadCallbacks>,
    tasks: Vec<DownloadSpec>,
    max_parallel: usize,
}

impl Downloader {
    /// Create an orchestrator that reports through `callbacks`
    pub fn new(callbacks: Box<dyn DownloadCallbacks>) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new()?,
            callbacks,
            tasks: Vec::new(),
            max_parallel: DEFAULT_MAX_PARALLEL,
        })
    }

    /// Cap the worker pool for this batch
    pub fn with_parallelism(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// Register a pending transfer; tasks run on the next `download`
    pub fn add(&mut self, spec: DownloadSpec) -> TaskHandle {
        let handle = TaskHandle(self.tasks.len());
        debug!("Queued download task {:?}: {}", handle, spec.description);
        self.tasks.push(spec);
        handle
    }

    /// Number of tasks queued for the next batch
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Execute all pending tasks concurrently
    ///
    /// `resume` short-circuits tasks whose destination already holds
    /// content matching the expected checksum (`AlreadyExists`).
    /// `fail_fast` cancels the rest of the batch on the first task
    /// error. Returns per-task outcomes; fails with a batch-level error
    /// only when fail_fast triggered or every task failed.
    pub fn download(&mut self, fail_fast: bool, resume: bool) -> Result<Vec<TaskOutcome>> {
        let tasks = std::mem::take(&mut self.tasks);
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        info!("Starting download batch of {} tasks", tasks.len());
        let cancel = AtomicBool::new(false);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_parallel.min(tasks.len()))
            .build()
            .map_err(|e| Error::Config(format!("failed to build worker pool: {e}")))?;

        let outcomes: Vec<TaskOutcome> = pool.install(|| {
            tasks
                .par_iter()
                .enumerate()
                .map(|(index, spec)| {
                    let outcome = self.run_task(TaskHandle(index), spec, resume, &cancel);
                    if outcome.is_error() && fail_fast {
                        cancel.store(true, Ordering::Relaxed);
                    }
                    outcome
                })
                .collect()
        });

        let failed = outcomes.iter().filter(|o| o.is_error()).count();
        if failed > 0 {
            warn!("{} of {} downloads failed", failed, outcomes.len());
        }

        if fail_fast && failed > 0 {
            return Err(Error::Download(format!(
                "batch aborted: {} of {} tasks failed with fail-fast enabled",
                failed,
                outcomes.len()
            )));
        }
        if failed == outcomes.len() {
            return Err(Error::Download(format!(
                "all {} download tasks failed",
                outcomes.len()
            )));
        }

        Ok(outcomes)
    }

    fn run_task(
        &self,
        handle: TaskHandle,
        spec: &DownloadSpec,
        resume: bool,
        cancel: &AtomicBool,
    ) -> TaskOutcome {
        let context =
            self.callbacks
                .add_new_download(spec.user_data, &spec.description, spec.expected_size);

        if cancel.load(Ordering::Relaxed) {
            return self.finish(handle, context, TransferStatus::Error, Some("canceled by fail-fast batch".to_string()));
        }

        // Cache hit: valid content already in place
        if resume && spec.destination.exists() {
            let valid = match &spec.checksum {
                Some(sum) => sum.verify_file(&spec.destination).is_ok(),
                None => true,
            };
            if valid {
                debug!("{} already present, skipping transfer", spec.destination.display());
                return self.finish(handle, context, TransferStatus::AlreadyExists, None);
            }
        }

        let mut last_error: Option<Error> = None;

        for url in &spec.urls {
            if cancel.load(Ordering::Relaxed) {
                last_error = Some(Error::Download("canceled by fail-fast batch".to_string()));
                break;
            }

            match self.transfer_one(url, spec, context, cancel) {
                Ok(()) => {
                    return self.finish(handle, context, TransferStatus::Successful, None);
                }
                Err(e) => {
                    self.callbacks.mirror_failure(context, &e.to_string(), url);
                    last_error = Some(e);
                }
            }
        }

        let message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no sources configured".to_string());
        self.finish(handle, context, TransferStatus::Error, Some(message))
    }

    /// Try a single source, including checksum verification
    fn transfer_one(
        &self,
        url: &str,
        spec: &DownloadSpec,
        context: u64,
        cancel: &AtomicBool,
    ) -> Result<()> {
        let expected_size = spec.expected_size;
        let callbacks = &self.callbacks;
        let hook = move |total: u64, downloaded: u64| {
            let total = if total == 0 { expected_size } else { total };
            callbacks.progress(context, total, downloaded);
        };

        if let Some(rest) = url.strip_prefix("file://") {
            client::copy_local(Path::new(rest), &spec.destination, Some(&hook), cancel)?;
        } else if url.starts_with("http://") || url.starts_with("https://") {
            self.client
                .download_file(url, &spec.destination, Some(&hook), cancel)?;
        } else {
            client::copy_local(Path::new(url), &spec.destination, Some(&hook), cancel)?;
        }

        if let Some(sum) = &spec.checksum {
            if let Err(e) = sum.verify_file(&spec.destination) {
                // A bad mirror must not pollute the destination
                let _ = std::fs::remove_file(&spec.destination);
                return Err(e);
            }
        }

        Ok(())
    }

    fn finish(
        &self,
        handle: TaskHandle,
        context: u64,
        status: TransferStatus,
        message: Option<String>,
    ) -> TaskOutcome {
        self.callbacks.end(context, status, message.as_deref());
        TaskOutcome {
            handle,
            status,
            message,
        }
    }
}
