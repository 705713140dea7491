use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while running a bulk export job.
#[derive(Error, Debug)]
pub enum BulkError {
    /// Transport-level failure talking to the export server.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The kickoff request was answered with a non-2xx status.
    #[error("expected 20x response to kickoff, got {status}; response body is: {body}")]
    Kickoff { status: u16, body: String },

    /// The kickoff response did not say where to poll.
    #[error("no Content-Location header was returned by Bulk Data API server")]
    MissingContentLocation,

    /// A status poll returned something other than 200 or 202.
    #[error("expected 200 or 202 response to status poll, got {status}; response body is: {body}")]
    Poll { status: u16, body: String },

    /// The job did not complete within the configured number of polls.
    #[error("Bulk Data API server did not finish the export after {attempts} polls")]
    RetriesExhausted { attempts: u32 },

    /// The completion payload is not a valid manifest.
    #[error("cannot parse export manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A download returned a status other than 200.
    #[error("got {status} response while downloading {url}")]
    Download { url: String, status: u16 },

    #[error("{context} {path}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BulkError {
    #[must_use]
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BulkError>;
