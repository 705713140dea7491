//! Effective configuration of the `fhirbase` binary.
//!
//! Values are layered in increasing precedence: built-in defaults, an optional
//! `fhirbase.toml`, `FHIRBASE__*` environment variables, and command-line
//! flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use config::{Config, Environment, File};
use fhirbase_bulk::{BulkConfig, DEFAULT_ACCEPT_HEADER};
use fhirbase_core::{AVAILABLE_SCHEMAS, DEFAULT_SCHEMA, is_known_schema};
use fhirbase_db_postgres::{DEFAULT_BATCH_SIZE, LoadMode, PostgresConfig};
use fhirbase_transform::{DEFAULT_MAX_DEPTH, TransformEngine};
use serde::{Deserialize, Serialize};

use crate::cli::GlobalArgs;

/// Configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "fhirbase.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FhirbaseConfig {
    /// FHIR version resources are transformed for.
    pub fhir: String,
    pub database: PostgresConfig,
    pub load: LoadSettings,
    pub transform: TransformSettings,
    pub logging: LoggingSettings,
}

impl Default for FhirbaseConfig {
    fn default() -> Self {
        Self {
            fhir: DEFAULT_SCHEMA.to_string(),
            database: PostgresConfig::default(),
            load: LoadSettings::default(),
            transform: TransformSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadSettings {
    /// Unset means copy for bulk export URLs and insert for local files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<LoadMode>,
    /// Parallel downloads for bulk export.
    pub numdl: usize,
    pub memusage: bool,
    pub accept_header: String,
    /// Resources per insert batch.
    pub batch_size: usize,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            mode: None,
            numdl: 5,
            memusage: false,
            accept_header: DEFAULT_ACCEPT_HEADER.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformSettings {
    /// Directory searched for `fhirbase-import-<version>.json` before the
    /// embedded rulesets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules_dir: Option<PathBuf>,
    pub max_depth: usize,
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            rules_dir: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl FhirbaseConfig {
    /// Transform engine configured from the `transform` section.
    pub fn engine(&self) -> TransformEngine {
        let engine = TransformEngine::new().with_max_depth(self.transform.max_depth);
        match &self.transform.rules_dir {
            Some(dir) => engine.with_rules_dir(dir),
            None => engine,
        }
    }

    /// Bulk export client settings from the `load` section.
    pub fn bulk(&self) -> BulkConfig {
        BulkConfig::new()
            .with_workers(self.load.numdl)
            .with_accept_header(self.load.accept_header.clone())
    }

    /// Copy with the database password hidden.
    pub fn masked(&self) -> Self {
        let mut masked = self.clone();
        if !masked.database.password.is_empty() {
            masked.database.password = "****".to_string();
        }
        masked
    }

    fn apply_overrides(&mut self, args: &GlobalArgs) {
        if let Some(fhir) = &args.fhir {
            self.fhir = fhir.clone();
        }
        let db = &mut self.database;
        if let Some(host) = &args.host {
            db.host = host.clone();
        }
        if let Some(port) = args.port {
            db.port = port;
        }
        if let Some(name) = &args.db {
            db.db = name.clone();
        }
        if let Some(username) = &args.username {
            db.username = username.clone();
        }
        if let Some(password) = &args.password {
            db.password = password.clone();
        }
        if let Some(sslmode) = &args.sslmode {
            db.sslmode = sslmode.clone();
        }
    }

    fn validate(&self) -> Result<()> {
        if !is_known_schema(&self.fhir) {
            bail!(
                "unknown FHIR version {:?}, expected one of: {}",
                self.fhir,
                AVAILABLE_SCHEMAS.join(", ")
            );
        }
        if self.load.numdl == 0 {
            bail!("load.numdl must be at least 1");
        }
        if self.load.batch_size == 0 {
            bail!("load.batch_size must be at least 1");
        }
        if self.transform.max_depth == 0 {
            bail!("transform.max_depth must be at least 1");
        }
        Ok(())
    }
}

/// Builds the effective configuration for one invocation.
pub fn load_config(args: &GlobalArgs) -> Result<FhirbaseConfig> {
    load_config_from(args, Path::new(DEFAULT_CONFIG_FILE))
}

fn load_config_from(args: &GlobalArgs, default_file: &Path) -> Result<FhirbaseConfig> {
    let mut builder = Config::builder();
    match &args.config {
        Some(path) => {
            if !path.exists() {
                bail!("config file {} does not exist", path.display());
            }
            builder = builder.add_source(File::from(path.as_path()));
        }
        None if default_file.exists() => {
            builder = builder.add_source(File::from(default_file));
        }
        None => {}
    }
    // e.g. FHIRBASE__DATABASE__HOST=db.internal
    builder = builder.add_source(
        Environment::with_prefix("FHIRBASE")
            .try_parsing(true)
            .separator("__"),
    );
    let mut cfg: FhirbaseConfig = builder
        .build()
        .context("config build error")?
        .try_deserialize()
        .context("config deserialize error")?;
    cfg.apply_overrides(args);
    cfg.validate()?;
    Ok(cfg)
}
