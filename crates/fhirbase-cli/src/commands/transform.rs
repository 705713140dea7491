use std::path::Path;

use anyhow::{Context, Result};
use fhirbase_core::Resource;

use crate::config::FhirbaseConfig;

/// Reads one resource from `file` and returns it transformed for the
/// configured FHIR version.
pub fn transform_file(cfg: &FhirbaseConfig, file: &Path) -> Result<Resource> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let resource: Resource = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON object", file.display()))?;

    let mut engine = cfg.engine();
    engine
        .do_transform(resource, &cfg.fhir)
        .with_context(|| format!("failed to transform {}", file.display()))
}

pub fn transform(cfg: &FhirbaseConfig, file: &Path) -> Result<()> {
    let transformed = transform_file(cfg, file)?;
    println!("{}", serde_json::to_string_pretty(&transformed)?);
    Ok(())
}
