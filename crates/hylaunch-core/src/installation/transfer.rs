//! Streaming HTTP downloads with progress reporting and bounded retries

use crate::config::TransferConfig;
use crate::errors::{PipelineError, TransferError, TransferFailure};
use crate::progress::{ProgressReporter, TransferProgress};
use futures_util::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// HTTP transfer engine shared by every provisioner
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    max_attempts: u32,
    base_delay: Duration,
}

impl Downloader {
    /// Create a downloader with the given user agent and default retry policy
    pub fn new(user_agent: &str) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| PipelineError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(client))
    }

    pub fn from_config(config: &TransferConfig) -> Result<Self, PipelineError> {
        Ok(Self::new(&config.user_agent)?.with_retry_policy(
            config.max_attempts,
            Duration::from_millis(config.retry_base_delay_ms),
        ))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }

    pub fn with_retry_policy(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.base_delay = base_delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Stream `url` into `destination`, reporting progress as chunks arrive
    ///
    /// A partially written file is removed when the transfer fails.
    pub async fn download(
        &self,
        url: &str,
        destination: &Path,
        progress: &ProgressReporter,
    ) -> Result<PathBuf, PipelineError> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }

        log::debug!("Downloading {} to {}", url, destination.display());
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "*/*")
            .send()
            .await
            .map_err(|e| TransferError::from_reqwest(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::from_status(url, status).into());
        }

        let total = response.content_length().filter(|len| *len > 0);
        let mut file = fs::File::create(destination).await?;

        match self.stream_body(url, response, &mut file, total, progress).await {
            Ok(transferred) => {
                log::debug!("Downloaded {} bytes from {}", transferred, url);
                Ok(destination.to_path_buf())
            }
            Err(e) => {
                drop(file);
                if let Err(remove_err) = fs::remove_file(destination).await {
                    log::debug!(
                        "Could not remove partial download {}: {}",
                        destination.display(),
                        remove_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn stream_body(
        &self,
        url: &str,
        response: reqwest::Response,
        file: &mut fs::File,
        total: Option<u64>,
        progress: &ProgressReporter,
    ) -> Result<u64, PipelineError> {
        let started = Instant::now();
        let mut transferred: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TransferError::from_reqwest(url, &e))?;
            file.write_all(&chunk).await?;
            transferred += chunk.len() as u64;

            let event = match total {
                Some(total) => {
                    let percent = (transferred as f64 / total as f64 * 100.0).clamp(0.0, 100.0);
                    let elapsed = started.elapsed().as_secs_f64();
                    let speed = if elapsed > 0.0 {
                        transferred as f64 / elapsed
                    } else {
                        0.0
                    };
                    TransferProgress {
                        message: None,
                        percent: Some(percent),
                        bytes_per_second: Some(speed),
                        bytes_transferred: Some(transferred),
                        total_bytes: Some(total),
                    }
                }
                None => TransferProgress {
                    bytes_transferred: Some(transferred),
                    ..Default::default()
                },
            };
            progress.report(event);
        }

        file.flush().await?;

        if let Some(total) = total {
            if transferred < total {
                return Err(TransferError::new(
                    url,
                    TransferFailure::Transient,
                    format!("connection closed after {} of {} bytes", transferred, total),
                )
                .into());
            }
        }

        Ok(transferred)
    }

    /// Download with up to `max_attempts` tries and exponential backoff
    ///
    /// Only transient failures are retried. A lost connection or a rejected
    /// request is returned immediately so the caller can offer a manual retry
    /// or fail hard.
    pub async fn retry_download(
        &self,
        url: &str,
        destination: &Path,
        progress: &ProgressReporter,
    ) -> Result<PathBuf, PipelineError> {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                self.wait_for_retry(attempt).await;
            }

            match self.download(url, destination, progress).await {
                Ok(path) => return Ok(path),
                Err(PipelineError::Transfer(err)) if err.can_retry() => {
                    log::warn!(
                        "Download attempt {}/{} for {} failed: {}",
                        attempt + 1,
                        self.max_attempts,
                        url,
                        err
                    );
                    last_error = Some(PipelineError::Transfer(err));
                }
                Err(err) => {
                    log::warn!("Download of {} failed, not retrying: {}", url, err);
                    return Err(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            TransferError::new(url, TransferFailure::Transient, "no download attempts made").into()
        }))
    }

    /// Exponential backoff: base, 2x base, 4x base ... capped at 30 seconds
    async fn wait_for_retry(&self, attempt: u32) {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.base_delay.saturating_mul(factor).min(MAX_RETRY_DELAY);
        log::info!("Waiting {}ms before retry attempt {}", delay.as_millis(), attempt + 1);
        tokio::time::sleep(delay).await;
    }

    /// Fetch a small JSON document
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        timeout: Option<Duration>,
    ) -> Result<T, PipelineError> {
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransferError::from_reqwest(url, &e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::from_status(url, status).into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| TransferError::from_reqwest(url, &e))?;
        serde_json::from_str(&body)
            .map_err(|e| PipelineError::Manifest(format!("Failed to parse JSON from {}: {}", url, e)))
    }
}
