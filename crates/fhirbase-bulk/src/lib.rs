//! FHIR Bulk Data export client.
//!
//! ```no_run
//! use std::path::Path;
//! use fhirbase_bulk::{BulkClient, BulkConfig};
//!
//! # async fn run() -> fhirbase_bulk::Result<()> {
//! let client = BulkClient::new(BulkConfig::default().with_workers(10))?;
//! let report = client
//!     .export("https://bulk-data.smarthealthit.org/fhir/$export", Path::new("./export"))
//!     .await?;
//! println!("downloaded {} files", report.files.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod download;
pub mod error;
pub mod manifest;

pub use client::{BulkClient, POLL_STATUS_MARKER, is_poll_status_url};
pub use config::{BulkConfig, DEFAULT_ACCEPT_HEADER};
pub use download::{DownloadReport, file_name_for};
pub use error::{BulkError, Result};
pub use manifest::{BulkManifest, ManifestOutput, parse_manifest};
