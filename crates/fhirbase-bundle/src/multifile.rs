use std::path::PathBuf;

use fhirbase_core::Resource;
use tracing::{info, warn};

use crate::bundle::Bundle;
use crate::error::Result;
use crate::source::ResourceSource;

/// Chains the bundles of many files into one resource stream.
///
/// Files that cannot be opened or classified are skipped with a warning at
/// construction time and contribute nothing to the stream or its count.
pub struct MultifileBundle {
    bundles: Vec<Option<Bundle>>,
    current: usize,
    count: usize,
}

impl MultifileBundle {
    pub fn open(paths: &[PathBuf]) -> Self {
        let bundles = paths
            .iter()
            .map(|path| match Bundle::open(path) {
                Ok(bundle) => Some(bundle),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "cannot read file, skipping");
                    None
                }
            })
            .collect();

        Self::from_bundles(bundles)
    }

    pub fn from_bundles(bundles: Vec<Option<Bundle>>) -> Self {
        let count = bundles.iter().flatten().map(ResourceSource::count).sum();
        let files = bundles.iter().flatten().count();
        info!(files, resources = count, "prepared input files");

        Self {
            bundles,
            current: 0,
            count,
        }
    }

    /// Number of files that will actually be read.
    pub fn file_count(&self) -> usize {
        self.bundles.iter().flatten().count()
    }
}

impl ResourceSource for MultifileBundle {
    fn next(&mut self) -> Result<Option<Resource>> {
        while let Some(slot) = self.bundles.get_mut(self.current) {
            if let Some(bundle) = slot.as_mut() {
                if let Some(resource) = bundle.next()? {
                    return Ok(Some(resource));
                }
                bundle.close();
                *slot = None;
            }
            self.current += 1;
        }
        Ok(None)
    }

    fn count(&self) -> usize {
        self.count
    }

    fn close(&mut self) {
        for bundle in self.bundles.iter_mut().flatten() {
            bundle.close();
        }
        self.bundles.clear();
        self.current = 0;
    }
}
