//! Rulesets compiled into the binary.

/// File name of the ruleset for `version`, both embedded and on disk.
pub fn ruleset_file_name(version: &str) -> String {
    format!("fhirbase-import-{version}.json")
}

const EMBEDDED: &[(&str, &str)] = &[
    (
        "3.0.1",
        include_str!("../rulesets/fhirbase-import-3.0.1.json"),
    ),
    (
        "4.0.0",
        include_str!("../rulesets/fhirbase-import-4.0.0.json"),
    ),
];

/// Raw JSON of the embedded ruleset for `version`.
pub fn embedded_source(version: &str) -> Option<&'static str> {
    EMBEDDED
        .iter()
        .find(|(v, _)| *v == version)
        .map(|(_, source)| *source)
}

/// Versions with an embedded ruleset.
pub fn embedded_versions() -> impl Iterator<Item = &'static str> {
    EMBEDDED.iter().map(|(v, _)| *v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Ruleset;

    #[test]
    fn test_embedded_rulesets_parse() {
        for version in embedded_versions() {
            let source = embedded_source(version).unwrap();
            let rs = Ruleset::parse(version, source).unwrap();
            assert!(rs.contains("Reference"), "{version} lacks Reference");
            assert!(rs.contains("Observation"), "{version} lacks Observation");
        }
    }

    #[test]
    fn test_embedded_versions_are_known_schemas() {
        for version in embedded_versions() {
            assert!(fhirbase_core::is_known_schema(version));
        }
        assert!(embedded_source("1.0.2").is_none());
    }
}
