//! FHIR schema versions known to the loader.

/// Schema versions fhirbase can target.
pub const AVAILABLE_SCHEMAS: &[&str] = &[
    "1.0.2", "1.1.0", "1.4.0", "1.6.0", "1.8.0", "3.0.1", "3.2.0", "3.3.0", "4.0.0",
];

/// Version used when nothing else is configured.
pub const DEFAULT_SCHEMA: &str = "4.0.0";

/// Returns true if `version` is one of [`AVAILABLE_SCHEMAS`].
pub fn is_known_schema(version: &str) -> bool {
    AVAILABLE_SCHEMAS.contains(&version)
}
