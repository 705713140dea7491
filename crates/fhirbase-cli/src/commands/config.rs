use anyhow::{Context, Result};
use colored::Colorize;

use crate::config::FhirbaseConfig;

pub fn show(cfg: &FhirbaseConfig) -> Result<()> {
    let rendered =
        toml::to_string_pretty(&cfg.masked()).context("failed to render configuration")?;
    println!("{}", "# effective configuration".cyan());
    print!("{rendered}");
    Ok(())
}
