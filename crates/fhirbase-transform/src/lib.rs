//! Ruleset-driven transformation of FHIR resources.
//!
//! fhirbase stores resources in a slightly different shape than the
//! interchange format: choice-type fields such as `valueQuantity` become
//! `{"value": {"Quantity": ...}}` and references are split into
//! `{"id", "resourceType"}`. The rules for each FHIR version live in a
//! JSON ruleset, see [`rules`] for its format.
//!
//! ```
//! use fhirbase_transform::TransformEngine;
//! use serde_json::json;
//!
//! let mut engine = TransformEngine::new();
//! let resource = json!({
//!     "resourceType": "Observation",
//!     "subject": {"reference": "Patient/p1"},
//!     "valueQuantity": {"value": 7}
//! });
//! let out = engine
//!     .do_transform(resource.as_object().unwrap().clone(), "4.0.0")
//!     .unwrap();
//! assert_eq!(out["subject"], json!({"id": "p1", "resourceType": "Patient"}));
//! assert_eq!(out["value"], json!({"Quantity": {"value": 7}}));
//! ```

pub mod embedded;
pub mod engine;
pub mod error;
pub mod rules;

pub use embedded::{embedded_source, embedded_versions, ruleset_file_name};
pub use engine::{DEFAULT_MAX_DEPTH, TransformEngine};
pub use error::{Result, TransformError};
pub use rules::{Action, Ruleset, TransformNode};
