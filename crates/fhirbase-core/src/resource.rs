use serde_json::{Map, Value};

use crate::error::{CoreError, Result};

/// One FHIR resource as read from an input file.
pub type Resource = Map<String, Value>;

/// Returns the `resourceType` attribute if it is a non-empty string.
pub fn resource_type(resource: &Resource) -> Option<&str> {
    resource
        .get("resourceType")
        .and_then(Value::as_str)
        .filter(|rt| !rt.is_empty())
}

/// Returns the `id` attribute if it is a non-empty string.
pub fn resource_id(resource: &Resource) -> Option<&str> {
    resource
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

/// Maps a resource type to its table name (lowercased type).
///
/// Resource types are plain ASCII identifiers; anything else is rejected so
/// the name can be interpolated into SQL safely.
pub fn table_name(resource_type: &str) -> Result<String> {
    let valid = resource_type
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && resource_type
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid {
        return Err(CoreError::invalid_resource_type(resource_type));
    }

    Ok(resource_type.to_ascii_lowercase())
}
