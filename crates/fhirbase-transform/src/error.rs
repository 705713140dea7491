use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("cannot determine resourceType for resource")]
    MissingResourceType,

    #[error("cannot find transformations data for FHIR version {version}")]
    UnknownRuleset { version: String },

    #[error("cannot read ruleset file {path}: {source}")]
    RulesetIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse transformations data for FHIR version {version}: {message}")]
    RulesetParse { version: String, message: String },

    #[error("input too deeply nested (more than {max_depth} levels)")]
    TooDeep { max_depth: usize },

    #[error("incorrect format after transformation: expected a JSON object")]
    NotAnObject,
}

impl TransformError {
    #[must_use]
    pub fn ruleset_parse(version: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RulesetParse {
            version: version.into(),
            message: message.into(),
        }
    }

    /// Errors caused by the ruleset rather than by one resource.
    /// These abort a load; the others only skip the record.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownRuleset { .. } | Self::RulesetIo { .. } | Self::RulesetParse { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TransformError>;
