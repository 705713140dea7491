use std::path::Path;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_LOCATION, RETRY_AFTER};
use tracing::{info, instrument};

use crate::config::BulkConfig;
use crate::download::{DownloadReport, download_all};
use crate::error::{BulkError, Result};
use crate::manifest::{BulkManifest, parse_manifest};

/// Marker of a status URL in the Bulk Data API.
pub const POLL_STATUS_MARKER: &str = "$export-poll-status";

/// Returns true when `url` already points at a job status endpoint, so the
/// kickoff step has to be skipped.
pub fn is_poll_status_url(url: &str) -> bool {
    url.contains(POLL_STATUS_MARKER)
}

/// Client for one FHIR Bulk Data export server.
///
/// A job goes through kickoff, polling until the server reports the
/// manifest, and downloading the listed files. [`BulkClient::export`] runs
/// all three.
#[derive(Debug, Clone)]
pub struct BulkClient {
    http: reqwest::Client,
    config: BulkConfig,
}

impl BulkClient {
    pub fn new(config: BulkConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("fhirbase/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    /// Starts an export and returns the status URL from `Content-Location`.
    #[instrument(skip(self))]
    pub async fn kickoff(&self, url: &str) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .header("Prefer", "respond-async")
            .header(ACCEPT, &self.config.accept_header)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BulkError::Kickoff {
                status: status.as_u16(),
                body,
            });
        }

        let location = resp
            .headers()
            .get(CONTENT_LOCATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(BulkError::MissingContentLocation)?;

        info!(poll_url = location, "export job accepted");
        Ok(location.to_string())
    }

    /// Polls the status URL until the job completes or the attempt ceiling
    /// is reached.
    #[instrument(skip(self))]
    pub async fn poll(&self, poll_url: &str) -> Result<BulkManifest> {
        info!("waiting for Bulk Data API server to prepare files");

        for attempt in 0..self.config.max_attempts {
            let resp = self.http.get(poll_url).send().await?;

            match resp.status() {
                StatusCode::OK => {
                    let body = resp.bytes().await?;
                    let manifest = parse_manifest(&body)?;
                    info!(files = manifest.output.len(), "export is ready");
                    return Ok(manifest);
                }
                StatusCode::ACCEPTED => {
                    let retry_after = resp
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.trim().parse::<u64>().ok());

                    if attempt + 1 < self.config.max_attempts {
                        let delay = self.poll_delay(attempt, retry_after);
                        let progress = resp
                            .headers()
                            .get("X-Progress")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("");
                        info!(attempt, delay_secs = delay.as_secs_f64(), progress, "still waiting");
                        tokio::time::sleep(delay).await;
                    }
                }
                status => {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(BulkError::Poll {
                        status: status.as_u16(),
                        body,
                    });
                }
            }
        }

        Err(BulkError::RetriesExhausted {
            attempts: self.config.max_attempts,
        })
    }

    /// See [`BulkConfig::poll_delay`].
    pub fn poll_delay(&self, attempt: u32, retry_after: Option<u64>) -> std::time::Duration {
        self.config.poll_delay(attempt, retry_after)
    }

    pub async fn download_all(&self, urls: &[String], dest: &Path) -> Result<DownloadReport> {
        download_all(&self.http, urls, self.config.workers, dest).await
    }

    /// Runs a complete export into `dest`, creating the directory if
    /// needed. A status URL skips the kickoff.
    pub async fn export(&self, url: &str, dest: &Path) -> Result<DownloadReport> {
        tokio::fs::create_dir_all(dest)
            .await
            .map_err(|e| BulkError::io("failed to create directory", dest, e))?;

        let poll_url = if is_poll_status_url(url) {
            url.to_string()
        } else {
            self.kickoff(url).await?
        };

        let manifest = self.poll(&poll_url).await?;
        self.download_all(&manifest.urls(), dest).await
    }
}
