//! Parallel download of export files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::ACCEPT_ENCODING;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{BulkError, Result};

const NDJSON_SUFFIX: &str = ".ndjson";

/// Outcome of [`download_all`].
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// Files now present in the destination directory.
    pub files: Vec<PathBuf>,
    /// Number of URLs that could not be downloaded or moved.
    pub failed: usize,
}

/// Local file name for a download URL: the path basename, with `.ndjson`
/// appended unless already present.
pub fn file_name_for(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|source| BulkError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;

    let base = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("download");

    if base.ends_with(NDJSON_SUFFIX) {
        Ok(base.to_string())
    } else {
        Ok(format!("{base}{NDJSON_SUFFIX}"))
    }
}

/// Downloads every URL into `dest` using `workers` parallel tasks.
///
/// Files are first written to a staging directory inside `dest` and then
/// renamed into place. A failed download or rename is logged and counted
/// but does not stop the others.
pub async fn download_all(
    http: &reqwest::Client,
    urls: &[String],
    workers: usize,
    dest: &Path,
) -> Result<DownloadReport> {
    let staging = tempfile::Builder::new()
        .prefix(".fhirbase-download-")
        .tempdir_in(dest)
        .map_err(|e| BulkError::io("cannot create staging directory in", dest, e))?;

    let (job_tx, job_rx) = mpsc::channel::<String>(urls.len().max(1));
    let (result_tx, mut result_rx) = mpsc::channel::<Result<PathBuf>>(urls.len().max(1));
    let job_rx = Arc::new(Mutex::new(job_rx));

    let mut tasks = JoinSet::new();
    for worker in 0..workers.max(1) {
        let http = http.clone();
        let jobs = Arc::clone(&job_rx);
        let results = result_tx.clone();
        let dir = staging.path().to_path_buf();

        tasks.spawn(async move {
            loop {
                let next = jobs.lock().await.recv().await;
                let Some(url) = next else { break };
                debug!(worker, url = %url, "downloading");
                let outcome = download_one(&http, &url, &dir).await;
                if results.send(outcome).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(result_tx);

    for url in urls {
        // Receiver lives until every worker has exited.
        let _ = job_tx.send(url.clone()).await;
    }
    drop(job_tx);

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "download worker failed");
        }
    }

    let mut report = DownloadReport::default();
    while let Some(result) = result_rx.recv().await {
        match result {
            Ok(staged) => match move_into(&staged, dest).await {
                Ok(path) => report.files.push(path),
                Err(e) => {
                    warn!(error = %e, "cannot move downloaded file");
                    report.failed += 1;
                }
            },
            Err(e) => {
                warn!(error = %e, "got an error while downloading file");
                report.failed += 1;
            }
        }
    }

    info!(
        files = report.files.len(),
        failed = report.failed,
        "finished downloading"
    );
    Ok(report)
}

async fn download_one(http: &reqwest::Client, url: &str, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(file_name_for(url)?);

    let mut resp = http
        .get(url)
        .header(ACCEPT_ENCODING, "gzip")
        .send()
        .await?;

    if resp.status() != StatusCode::OK {
        return Err(BulkError::Download {
            url: url.to_string(),
            status: resp.status().as_u16(),
        });
    }

    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(|e| BulkError::io("cannot create file", &path, e))?;

    while let Some(chunk) = resp.chunk().await? {
        file.write_all(&chunk)
            .await
            .map_err(|e| BulkError::io("cannot write", &path, e))?;
    }
    file.flush()
        .await
        .map_err(|e| BulkError::io("cannot write", &path, e))?;

    Ok(path)
}

async fn move_into(staged: &Path, dest: &Path) -> Result<PathBuf> {
    let Some(name) = staged.file_name() else {
        return Err(BulkError::io(
            "cannot move",
            staged,
            std::io::Error::from(std::io::ErrorKind::InvalidInput),
        ));
    };
    let target = dest.join(name);
    tokio::fs::rename(staged, &target)
        .await
        .map_err(|e| BulkError::io("cannot move", staged, e))?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_for() {
        assert_eq!(
            file_name_for("http://example.org/files/Patient.ndjson").unwrap(),
            "Patient.ndjson"
        );
        assert_eq!(
            file_name_for("http://example.org/files/abc123?token=x").unwrap(),
            "abc123.ndjson"
        );
        assert_eq!(
            file_name_for("http://example.org/").unwrap(),
            "download.ndjson"
        );
        assert!(file_name_for("not a url").is_err());
    }
}
