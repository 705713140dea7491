use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use fhirbase_bulk::BulkClient;
use fhirbase_bundle::{MultifileBundle, ResourceSource, expand_paths};
use fhirbase_core::{LoadStats, MemoryStats};
use fhirbase_db_postgres::{LoadMode, PgTarget, create_pool, loader_for, test_connection};
use indicatif::{ProgressBar, ProgressStyle};
use tempfile::TempDir;
use tracing::info;

use crate::cli::LoadArgs;
use crate::config::FhirbaseConfig;
use crate::output::{memory_line, print_load_summary, print_success, print_warning};

/// Resources between two memory reports with `--memusage`.
const MEMUSAGE_INTERVAL: u64 = 3000;

/// True when a memory report is due before the next resource; the first
/// report comes before anything is loaded.
fn memory_report_due(loaded: u64) -> bool {
    loaded % MEMUSAGE_INTERVAL == 0
}

/// Sources of one load: either local paths or one bulk export URL.
#[derive(Debug, PartialEq, Eq)]
enum LoadInput<'a> {
    Paths(&'a [String]),
    BulkExport(&'a str),
}

fn classify_input(sources: &[String]) -> Result<LoadInput<'_>> {
    match sources {
        [single] if single.starts_with("http") => Ok(LoadInput::BulkExport(single)),
        many if many.iter().any(|s| s.starts_with("http")) => {
            bail!("a bulk export URL must be the only load argument")
        }
        paths => Ok(LoadInput::Paths(paths)),
    }
}

/// Explicit mode wins; otherwise bulk exports use COPY and local files INSERT.
fn resolve_mode(explicit: Option<LoadMode>, input: &LoadInput<'_>) -> LoadMode {
    explicit.unwrap_or(match input {
        LoadInput::BulkExport(_) => LoadMode::Copy,
        LoadInput::Paths(_) => LoadMode::Insert,
    })
}

fn progress_bar(total: u64) -> ProgressBar {
    let pb = if total > 0 {
        ProgressBar::new(total)
    } else {
        ProgressBar::new_spinner()
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(200));
    pb
}

async fn download(cfg: &FhirbaseConfig, args: &LoadArgs, url: &str) -> Result<(TempDir, Vec<PathBuf>)> {
    let mut bulk = cfg.bulk();
    if let Some(numdl) = args.numdl {
        bulk = bulk.with_workers(numdl);
    }
    if let Some(accept) = &args.accept_header {
        bulk = bulk.with_accept_header(accept.clone());
    }

    let staging = tempfile::Builder::new()
        .prefix("fhirbase-bulk-")
        .tempdir()
        .context("failed to create a temporary directory")?;
    let client = BulkClient::new(bulk).context("failed to build HTTP client")?;
    let report = client
        .export(url, staging.path())
        .await
        .with_context(|| format!("bulk export from {url} failed"))?;

    print_success(&format!("Downloaded {} files", report.files.len()));
    if report.failed > 0 {
        print_warning(&format!("{} files could not be downloaded", report.failed));
    }
    Ok((staging, report.files))
}

pub async fn load(cfg: &FhirbaseConfig, args: &LoadArgs) -> Result<()> {
    let input = classify_input(&args.sources)?;
    let mode = resolve_mode(args.mode.or(cfg.load.mode), &input);
    let memusage = args.memusage || cfg.load.memusage;

    // The staging directory lives until the load is finished.
    let (_staging, paths) = match input {
        LoadInput::BulkExport(url) => {
            let (dir, files) = download(cfg, args, url).await?;
            (Some(dir), files)
        }
        LoadInput::Paths(paths) => (None, expand_paths(paths)?),
    };
    if paths.is_empty() {
        bail!("nothing to load");
    }

    let pool = create_pool(&cfg.database)
        .await
        .context("failed to connect to the database")?;
    test_connection(&pool)
        .await
        .context("database is not reachable")?;
    let mut target = PgTarget::new(pool);

    let mut source = MultifileBundle::open(&paths);
    info!(files = source.file_count(), resources = source.count(), %mode, "loading");
    let mut loader = loader_for(mode, cfg.engine(), cfg.fhir.clone(), cfg.load.batch_size);

    let bar = progress_bar(source.count() as u64);
    let mut stats = LoadStats::new();
    let started = Instant::now();
    let result = {
        let mut progress = |resource_type: &str, _elapsed: Duration| {
            if memusage
                && memory_report_due(stats.total())
                && let Some(mem) = MemoryStats::sample()
            {
                bar.println(memory_line(&mem));
            }
            stats.record(resource_type);
            bar.inc(1);
        };
        loader.load(&mut target, &mut source, &mut progress).await
    };
    source.close();
    bar.finish_and_clear();

    let outcome = result.map_err(|e| match e.hint() {
        Some(hint) => anyhow!(e).context(hint),
        None => anyhow!(e),
    })?;
    for _ in 0..outcome.skipped {
        stats.record_skipped();
    }
    info!(loaded = outcome.loaded, writes = outcome.writes, "load finished");
    print_load_summary(&stats, started.elapsed());
    Ok(())
}
