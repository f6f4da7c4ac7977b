// src/download/client.rs

//! HTTP client for repository transfers
//!
//! Wraps reqwest's blocking client with per-mirror retry, streamed
//! writes through a temp file with an atomic rename, and a progress
//! hook the orchestrator uses to drive its callbacks. Mirror fallback
//! lives a level up, in the orchestrator; this client only knows about
//! one url at a time.

use crate::error::{Error, Result};
use reqwest::blocking::Client;
use url::Url;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry attempts per url before giving up on it
const MAX_RETRIES: u32 = 3;

/// Base retry delay in milliseconds, scaled by attempt number
const RETRY_DELAY_MS: u64 = 1000;

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// Progress hook: (total bytes or 0 when unknown, bytes so far)
pub type ProgressFn<'a> = &'a (dyn Fn(u64, u64) + Sync);

/// HTTP client wrapper with retry support
pub struct HttpClient {
    client: Client,
    max_retries: u32,
}

impl HttpClient {
    /// Create a new client with default timeouts
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Download a url to a file, streaming through a temp file
    ///
    /// Retries transient failures with backoff. The cancel flag is
    /// checked between chunks so a fail-fast batch can abort an
    /// in-flight transfer. Returns the number of bytes written.
    pub fn download_file(
        &self,
        url: &str,
        dest_path: &Path,
        progress: Option<ProgressFn<'_>>,
        cancel: &AtomicBool,
    ) -> Result<u64> {
        info!("Downloading {} to {}", url, dest_path.display());
        let url_parsed = parse_url(url)?;

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::io(format!("creating directory {}", parent.display()), e))?;
        }

        let mut attempt = 0;
        loop {
            attempt += 1;

            if cancel.load(Ordering::Relaxed) {
                return Err(Error::Download(format!("transfer of {url} canceled")));
            }

            match self.client.get(url_parsed.clone()).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::Download(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }

                    let total_size = response.content_length().unwrap_or(0);

                    // Write to a temp file first; rename only a complete
                    // download into place
                    let temp_path = dest_path.with_extension("part");
                    let mut file = File::create(&temp_path).map_err(|e| {
                        Error::io(format!("creating {}", temp_path.display()), e)
                    })?;

                    let written = match stream_response(
                        response,
                        &mut file,
                        total_size,
                        progress,
                        cancel,
                    ) {
                        Ok(n) => n,
                        Err(e) => {
                            let _ = fs::remove_file(&temp_path);
                            return Err(e);
                        }
                    };

                    fs::rename(&temp_path, dest_path).map_err(|e| {
                        Error::io(
                            format!(
                                "moving {} to {}",
                                temp_path.display(),
                                dest_path.display()
                            ),
                            e,
                        )
                    })?;

                    debug!("Downloaded {} bytes to {}", written, dest_path.display());
                    return Ok(written);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::Download(format!(
                            "failed to download {url} after {attempt} attempts: {e}"
                        )));
                    }
                    warn!("Download attempt {} for {} failed: {}, retrying", attempt, url, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| Error::Download(format!("invalid url '{url}': {e}")))
}

/// Stream an HTTP response body to a file in chunks
fn stream_response(
    mut response: reqwest::blocking::Response,
    file: &mut File,
    total_size: u64,
    progress: Option<ProgressFn<'_>>,
    cancel: &AtomicBool,
) -> Result<u64> {
    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];

    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(Error::Download("transfer canceled".to_string()));
        }

        let n = response
            .read(&mut buffer)
            .map_err(|e| Error::io("reading response body".to_string(), e))?;
        if n == 0 {
            break;
        }

        file.write_all(&buffer[..n])
            .map_err(|e| Error::io("writing downloaded data".to_string(), e))?;
        downloaded += n as u64;

        if let Some(report) = progress {
            report(total_size, downloaded);
        }
    }

    Ok(downloaded)
}

/// Copy a local source into place, reporting progress like a remote
/// transfer would
///
/// Local mirrors and `file:` base urls go through this path so the
/// callback protocol stays identical regardless of transport.
pub fn copy_local(
    source: &Path,
    dest_path: &Path,
    progress: Option<ProgressFn<'_>>,
    cancel: &AtomicBool,
) -> Result<u64> {
    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::io(format!("creating directory {}", parent.display()), e))?;
    }

    let mut input = File::open(source).map_err(|e| {
        Error::Download(format!("failed to open {}: {}", source.display(), e))
    })?;
    let total_size = input
        .metadata()
        .map(|m| m.len())
        .unwrap_or(0);

    let temp_path = dest_path.with_extension("part");
    let mut file = File::create(&temp_path)
        .map_err(|e| Error::io(format!("creating {}", temp_path.display()), e))?;

    let mut copied: u64 = 0;
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];
    loop {
        if cancel.load(Ordering::Relaxed) {
            let _ = fs::remove_file(&temp_path);
            return Err(Error::Download("transfer canceled".to_string()));
        }

        let n = input
            .read(&mut buffer)
            .map_err(|e| Error::io(format!("reading {}", source.display()), e))?;
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n])
            .map_err(|e| Error::io("writing copied data".to_string(), e))?;
        copied += n as u64;

        if let Some(report) = progress {
            report(total_size, copied);
        }
    }

    fs::rename(&temp_path, dest_path).map_err(|e| {
        Error::io(
            format!("moving {} to {}", temp_path.display(), dest_path.display()),
            e,
        )
    })?;

    Ok(copied)
}
