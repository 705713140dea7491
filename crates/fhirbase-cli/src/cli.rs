use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fhirbase_db_postgres::LoadMode;

#[derive(Parser)]
#[command(name = "fhirbase")]
#[command(about = "fhirbase: load FHIR resources into PostgreSQL")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Flags shared by every command. Each one overrides the matching
/// configuration value.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct GlobalArgs {
    /// Path to a fhirbase.toml configuration file
    #[arg(short, long, global = true, env = "FHIRBASE_CONFIG")]
    pub config: Option<PathBuf>,

    /// FHIR version to target (see `fhirbase schemas`)
    #[arg(long, global = true, env = "FHIRBASE_FHIR")]
    pub fhir: Option<String>,

    /// PostgreSQL host
    #[arg(long, global = true, env = "PGHOST")]
    pub host: Option<String>,

    /// PostgreSQL port
    #[arg(short, long, global = true, env = "PGPORT")]
    pub port: Option<u16>,

    /// Database name
    #[arg(short, long, global = true, env = "PGDATABASE")]
    pub db: Option<String>,

    /// Database user
    #[arg(short, long, global = true, env = "PGUSER")]
    pub username: Option<String>,

    /// Database password
    #[arg(short = 'W', long, global = true, env = "PGPASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// libpq sslmode (disable, prefer, require, ...)
    #[arg(long, global = true, env = "PGSSLMODE")]
    pub sslmode: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load resources from files, directories or a bulk export URL
    Load(LoadArgs),
    /// Download a bulk export into a directory
    Bulkget(BulkgetArgs),
    /// Print a resource as fhirbase would store it
    Transform(TransformArgs),
    /// List supported FHIR versions
    Schemas,
    /// Inspect the effective configuration
    Config(ConfigArgs),
}

#[derive(clap::Args)]
pub struct LoadArgs {
    /// Files or directories to load, or one bulk export URL
    #[arg(required = true, num_args = 1..)]
    pub sources: Vec<String>,
    /// Load mode: insert or copy (default: copy for URLs, insert otherwise)
    #[arg(short, long)]
    pub mode: Option<LoadMode>,
    /// Number of parallel downloads for bulk export URLs
    #[arg(long)]
    pub numdl: Option<usize>,
    /// Print memory usage while loading
    #[arg(long)]
    pub memusage: bool,
    /// Accept header sent with the bulk export kickoff
    #[arg(long)]
    pub accept_header: Option<String>,
}

#[derive(clap::Args)]
pub struct BulkgetArgs {
    /// Bulk export endpoint or poll-status URL
    pub url: String,
    /// Directory the NDJSON files are written to
    pub dest: PathBuf,
    /// Number of parallel downloads
    #[arg(long)]
    pub numdl: Option<usize>,
    /// Accept header sent with the kickoff
    #[arg(long)]
    pub accept_header: Option<String>,
}

#[derive(clap::Args)]
pub struct TransformArgs {
    /// JSON file holding one FHIR resource
    pub file: PathBuf,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_load_with_mode() {
        let cli = Cli::try_parse_from([
            "fhirbase", "--host", "db.local", "load", "-m", "copy", "a.ndjson", "dir/",
        ])
        .unwrap();
        assert_eq!(cli.global.host.as_deref(), Some("db.local"));
        match cli.command {
            Commands::Load(args) => {
                assert_eq!(args.mode, Some(LoadMode::Copy));
                assert_eq!(args.sources, vec!["a.ndjson", "dir/"]);
                assert!(!args.memusage);
            }
            _ => panic!("expected load"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["fhirbase", "schemas", "--fhir", "3.0.1"]).unwrap();
        assert_eq!(cli.global.fhir.as_deref(), Some("3.0.1"));
    }

    #[test]
    fn test_load_requires_source() {
        assert!(Cli::try_parse_from(["fhirbase", "load"]).is_err());
    }

    #[test]
    fn test_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["fhirbase", "load", "--mode", "upsert", "x"]).is_err());
    }
}
