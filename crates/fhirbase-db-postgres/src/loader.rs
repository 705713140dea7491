//! Copy and insert load strategies.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use fhirbase_bundle::ResourceSource;
use fhirbase_core::{resource_id, resource_type, table_name};
use fhirbase_transform::TransformEngine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::grouped::GroupedSource;
use crate::target::{LoadBatch, LoadRow, LoadTarget};

/// Statements queued before the insert loader flushes.
pub const DEFAULT_BATCH_SIZE: usize = 2000;

/// Called once per written resource with its type and the time since the
/// previous call.
pub type ProgressCallback<'a> = dyn FnMut(&str, Duration) + Send + 'a;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// Batched `INSERT ... ON CONFLICT (id) DO NOTHING`.
    Insert,
    /// `COPY ... FROM STDIN`, one call per run of same-typed resources.
    Copy,
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => f.write_str("insert"),
            Self::Copy => f.write_str("copy"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown load mode {0:?}, expected insert or copy")]
pub struct ParseLoadModeError(String);

impl FromStr for LoadMode {
    type Err = ParseLoadModeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "insert" => Ok(Self::Insert),
            "copy" => Ok(Self::Copy),
            _ => Err(ParseLoadModeError(s.to_string())),
        }
    }
}

/// What a load did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Resources handed to the target.
    pub loaded: usize,
    /// Resources skipped because they could not be transformed.
    pub skipped: usize,
    /// COPY calls or batch flushes issued.
    pub writes: usize,
}

/// A load strategy.
#[async_trait]
pub trait Loader: Send {
    async fn load(
        &mut self,
        target: &mut dyn LoadTarget,
        source: &mut dyn ResourceSource,
        progress: &mut ProgressCallback<'_>,
    ) -> Result<LoadOutcome>;
}

/// Builds the loader for `mode`.
pub fn loader_for(
    mode: LoadMode,
    engine: TransformEngine,
    version: impl Into<String>,
    batch_size: usize,
) -> Box<dyn Loader> {
    match mode {
        LoadMode::Copy => Box::new(CopyLoader::new(engine, version)),
        LoadMode::Insert => Box::new(InsertLoader::new(engine, version).with_batch_size(batch_size)),
    }
}

/// Loads with one COPY per run of same-typed resources.
///
/// Fast on grouped input such as bulk export NDJSON, where every file holds
/// one resource type. Interleaved types degrade to one COPY per resource.
#[derive(Debug)]
pub struct CopyLoader {
    engine: TransformEngine,
    version: String,
}

impl CopyLoader {
    pub fn new(engine: TransformEngine, version: impl Into<String>) -> Self {
        Self {
            engine,
            version: version.into(),
        }
    }
}

#[async_trait]
impl Loader for CopyLoader {
    async fn load(
        &mut self,
        target: &mut dyn LoadTarget,
        source: &mut dyn ResourceSource,
        progress: &mut ProgressCallback<'_>,
    ) -> Result<LoadOutcome> {
        let mut grouped = GroupedSource::new(source, &mut self.engine, &self.version, progress);
        let mut writes = 0;

        while let Some(rt) = grouped.next_run()? {
            let table = table_name(&rt)?;
            let copied = target.copy_rows(&table, &mut grouped).await?;
            writes += 1;
            debug!(table = %table, rows = copied, "copied run");
        }

        let outcome = LoadOutcome {
            loaded: grouped.rows(),
            skipped: grouped.skipped(),
            writes,
        };
        info!(
            loaded = outcome.loaded,
            skipped = outcome.skipped,
            copies = outcome.writes,
            "copy load finished"
        );
        Ok(outcome)
    }
}

/// Loads with batched `INSERT` statements, ignoring id conflicts.
///
/// Works equally well on grouped and interleaved input, and keeps only the
/// first occurrence of a duplicated id.
#[derive(Debug)]
pub struct InsertLoader {
    engine: TransformEngine,
    version: String,
    batch_size: usize,
}

impl InsertLoader {
    pub fn new(engine: TransformEngine, version: impl Into<String>) -> Self {
        Self {
            engine,
            version: version.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

#[async_trait]
impl Loader for InsertLoader {
    async fn load(
        &mut self,
        target: &mut dyn LoadTarget,
        source: &mut dyn ResourceSource,
        progress: &mut ProgressCallback<'_>,
    ) -> Result<LoadOutcome> {
        let mut batch = LoadBatch::with_capacity(self.batch_size);
        let mut outcome = LoadOutcome::default();
        let mut last_tick = Instant::now();

        while let Some(resource) = source.next()? {
            let transformed = match self.engine.do_transform(resource, &self.version) {
                Ok(transformed) => transformed,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!(error = %e, "error during transform, skipping resource");
                    outcome.skipped += 1;
                    continue;
                }
            };

            // do_transform guarantees a resourceType
            let rt = resource_type(&transformed).unwrap_or_default().to_string();
            let table = table_name(&rt)?;
            let row = LoadRow {
                id: resource_id(&transformed).map(str::to_string),
                resource: serde_json::to_string(&transformed)?,
            };
            batch.push(table, row);
            outcome.loaded += 1;

            if batch.len() >= self.batch_size {
                target.send_batch(&batch).await?;
                debug!(statements = batch.len(), "flushed batch");
                batch.clear();
                outcome.writes += 1;
            }

            let now = Instant::now();
            progress(&rt, now.duration_since(last_tick));
            last_tick = now;
        }

        if !batch.is_empty() {
            target.send_batch(&batch).await?;
            debug!(statements = batch.len(), "flushed final batch");
            outcome.writes += 1;
        }

        info!(
            loaded = outcome.loaded,
            skipped = outcome.skipped,
            batches = outcome.writes,
            "insert load finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_mode_parse() {
        assert_eq!("insert".parse::<LoadMode>().unwrap(), LoadMode::Insert);
        assert_eq!("COPY".parse::<LoadMode>().unwrap(), LoadMode::Copy);
        assert!("upsert".parse::<LoadMode>().is_err());
        assert_eq!(LoadMode::Copy.to_string(), "copy");
    }

    #[test]
    fn test_load_mode_serde() {
        let mode: LoadMode = serde_json::from_str("\"copy\"").unwrap();
        assert_eq!(mode, LoadMode::Copy);
    }
}
