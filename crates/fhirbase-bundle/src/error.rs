//! Error types for bundle reading.

use std::io;
use std::path::PathBuf;

/// Errors raised while opening, classifying or reading input files.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// The file could not be opened.
    #[error("Cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A path given on the command line does not exist or cannot be stat'ed.
    #[error("Cannot access {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Directory walk failed.
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Underlying read failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream is not shaped the way the reader expects.
    #[error("Format error: {message}")]
    Format { message: String },

    /// The content could not be classified as any known bundle kind.
    #[error("Cannot determine bundle type of {}", path.display())]
    UnknownFormat { path: PathBuf },

    /// Collection bundle without an `entry` array.
    #[error("Cannot find `entry` array in the bundle")]
    MissingEntries,

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BundleError {
    /// Creates a new format error.
    #[must_use]
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// True for errors caused by the shape of the content rather than I/O.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::Format { .. } | Self::MissingEntries | Self::Json(_) | Self::UnknownFormat { .. }
        )
    }
}

/// Result type alias for bundle operations.
pub type Result<T> = std::result::Result<T, BundleError>;
