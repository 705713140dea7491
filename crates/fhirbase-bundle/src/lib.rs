//! Input files for the fhirbase loader.
//!
//! Three container shapes are supported, each optionally gzip-compressed:
//! NDJSON, FHIR collection/transaction Bundles and single resources. The
//! shape is detected from content, never from the file name.
//!
//! ```no_run
//! use fhirbase_bundle::{MultifileBundle, ResourceSource, expand_paths};
//!
//! let files = expand_paths(&["./export"])?;
//! let mut input = MultifileBundle::open(&files);
//! while let Some(resource) = input.next()? {
//!     println!("{}", resource["resourceType"]);
//! }
//! # Ok::<(), fhirbase_bundle::BundleError>(())
//! ```

pub mod bundle;
pub mod collection;
pub mod detect;
pub mod error;
pub mod file;
pub mod multifile;
pub mod ndjson;
pub mod scanner;
pub mod single;
pub mod source;
pub mod walk;

pub use bundle::Bundle;
pub use collection::FhirBundle;
pub use detect::{BundleKind, classify, is_complete_json_object};
pub use error::{BundleError, Result};
pub use file::{BundleFile, Rewind};
pub use multifile::MultifileBundle;
pub use ndjson::NdjsonBundle;
pub use single::SingleResourceBundle;
pub use source::ResourceSource;
pub use walk::expand_paths;
