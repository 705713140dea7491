pub mod error;
pub mod fhir;
pub mod fhir_reference;
pub mod id;
pub mod monitoring;
pub mod resource;

pub use error::{CoreError, Result};
pub use fhir::{AVAILABLE_SCHEMAS, DEFAULT_SCHEMA, is_known_schema};
pub use fhir_reference::{CompactReference, compact_reference};
pub use id::generate_id;
pub use monitoring::{LoadStats, MemoryStats};
pub use resource::{Resource, resource_id, resource_type, table_name};
