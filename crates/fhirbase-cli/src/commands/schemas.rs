use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use fhirbase_core::AVAILABLE_SCHEMAS;
use fhirbase_transform::{embedded_source, ruleset_file_name};
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::config::FhirbaseConfig;

/// Where the ruleset for `version` would be loaded from.
fn ruleset_origin(version: &str, rules_dir: Option<&Path>) -> &'static str {
    if rules_dir.is_some_and(|dir| dir.join(ruleset_file_name(version)).is_file()) {
        "rules_dir"
    } else if embedded_source(version).is_some() {
        "embedded"
    } else {
        "-"
    }
}

pub fn schemas_table(cfg: &FhirbaseConfig) -> String {
    let rules_dir = cfg.transform.rules_dir.as_deref();
    let mut builder = Builder::default();
    builder.push_record(["Version", "Ruleset", "Selected"]);
    for version in AVAILABLE_SCHEMAS {
        let selected = if *version == cfg.fhir { "*" } else { "" };
        builder.push_record([*version, ruleset_origin(version, rules_dir), selected]);
    }
    builder.build().with(Style::rounded()).to_string()
}

pub fn schemas(cfg: &FhirbaseConfig) -> Result<()> {
    println!("{}", schemas_table(cfg));
    println!(
        "{} versions without a ruleset need one in transform.rules_dir",
        "note:".cyan()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ruleset_origin() {
        assert_eq!(ruleset_origin("4.0.0", None), "embedded");
        assert_eq!(ruleset_origin("1.0.2", None), "-");

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ruleset_file_name("1.0.2")), "{}").unwrap();
        assert_eq!(ruleset_origin("1.0.2", Some(dir.path())), "rules_dir");
        assert_eq!(ruleset_origin("3.0.1", Some(dir.path())), "embedded");
    }

    #[test]
    fn test_schemas_table_lists_every_version() {
        let table = schemas_table(&FhirbaseConfig::default());
        for version in AVAILABLE_SCHEMAS {
            assert!(table.contains(version));
        }
    }
}
