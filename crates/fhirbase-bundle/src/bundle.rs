use std::path::Path;

use fhirbase_core::Resource;
use tracing::debug;

use crate::collection::FhirBundle;
use crate::detect::{BundleKind, classify};
use crate::error::{BundleError, Result};
use crate::file::{BundleFile, Rewind};
use crate::ndjson::NdjsonBundle;
use crate::single::SingleResourceBundle;
use crate::source::ResourceSource;

/// One opened input file, read according to its detected kind.
pub enum Bundle {
    Ndjson(NdjsonBundle),
    Collection(FhirBundle),
    Single(SingleResourceBundle),
}

impl Bundle {
    /// Opens `path`, detects its kind from content and prepares a reader.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = BundleFile::open(path)?;

        let kind = classify(&mut file)?;
        file.rewind()?;

        debug!(file = %path.display(), %kind, gzip = file.is_gzipped(), "detected bundle type");

        match kind {
            BundleKind::Ndjson => NdjsonBundle::new(file).map(Self::Ndjson),
            BundleKind::Collection => FhirBundle::new(file).map(Self::Collection),
            BundleKind::SingleResource => Ok(Self::Single(SingleResourceBundle::new(file))),
            BundleKind::Unknown => Err(BundleError::UnknownFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    pub fn kind(&self) -> BundleKind {
        match self {
            Self::Ndjson(_) => BundleKind::Ndjson,
            Self::Collection(_) => BundleKind::Collection,
            Self::Single(_) => BundleKind::SingleResource,
        }
    }
}

impl ResourceSource for Bundle {
    fn next(&mut self) -> Result<Option<Resource>> {
        match self {
            Self::Ndjson(b) => b.next(),
            Self::Collection(b) => b.next(),
            Self::Single(b) => b.next(),
        }
    }

    fn count(&self) -> usize {
        match self {
            Self::Ndjson(b) => b.count(),
            Self::Collection(b) => b.count(),
            Self::Single(b) => b.count(),
        }
    }

    fn close(&mut self) {
        match self {
            Self::Ndjson(b) => b.close(),
            Self::Collection(b) => b.close(),
            Self::Single(b) => b.close(),
        }
    }
}
