//! FHIR reference compaction.
//!
//! fhirbase stores references in a compact form: instead of the literal
//! `"reference": "Patient/123"` string the stored document carries
//! `{"id": "123", "resourceType": "Patient"}`.
//!
//! # Example
//!
//! ```
//! use fhirbase_core::fhir_reference::compact_reference;
//!
//! let r = compact_reference("Patient/123");
//! assert_eq!(r.id, "123");
//! assert_eq!(r.resource_type.as_deref(), Some("Patient"));
//!
//! // URNs and other strings without exactly one separator keep the whole value as id
//! let r = compact_reference("urn:uuid:abc");
//! assert_eq!(r.id, "urn:uuid:abc");
//! assert_eq!(r.resource_type, None);
//! ```

/// A reference split into its id and (when present) target type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompactReference {
    /// The resource id, or the whole reference string when it could not be split
    pub id: String,
    /// The target resource type (e.g., "Patient")
    pub resource_type: Option<String>,
}

/// Splits a reference string on `/`.
///
/// Exactly two parts yield `{id, resourceType}`; anything else (no separator,
/// absolute URLs, versioned references) keeps the original string as the id.
pub fn compact_reference(reference: &str) -> CompactReference {
    let parts: Vec<&str> = reference.split('/').collect();
    if let [resource_type, id] = parts.as_slice() {
        CompactReference {
            id: (*id).to_string(),
            resource_type: Some((*resource_type).to_string()),
        }
    } else {
        CompactReference {
            id: reference.to_string(),
            resource_type: None,
        }
    }
}
