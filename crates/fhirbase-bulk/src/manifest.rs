use serde::Deserialize;

use crate::error::Result;

/// Completion payload of an export job.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BulkManifest {
    #[serde(default)]
    pub transaction_time: Option<String>,
    pub output: Vec<ManifestOutput>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ManifestOutput {
    pub url: String,
    #[serde(default, rename = "type")]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
}

impl BulkManifest {
    pub fn urls(&self) -> Vec<String> {
        self.output.iter().map(|o| o.url.clone()).collect()
    }
}

/// Parses `{"output": [{"url": ...}, ...]}`.
pub fn parse_manifest(body: &[u8]) -> Result<BulkManifest> {
    Ok(serde_json::from_slice(body)?)
}
