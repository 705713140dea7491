use anyhow::{Context, Result};
use fhirbase_bulk::BulkClient;

use crate::cli::BulkgetArgs;
use crate::config::FhirbaseConfig;
use crate::output::{print_success, print_warning};

pub async fn bulkget(cfg: &FhirbaseConfig, args: &BulkgetArgs) -> Result<()> {
    let mut bulk = cfg.bulk();
    if let Some(numdl) = args.numdl {
        bulk = bulk.with_workers(numdl);
    }
    if let Some(accept) = &args.accept_header {
        bulk = bulk.with_accept_header(accept.clone());
    }

    let client = BulkClient::new(bulk).context("failed to build HTTP client")?;
    let report = client
        .export(&args.url, &args.dest)
        .await
        .with_context(|| format!("bulk export from {} failed", args.url))?;

    print_success(&format!(
        "Downloaded {} files into {}",
        report.files.len(),
        args.dest.display()
    ));
    if report.failed > 0 {
        print_warning(&format!("{} files could not be downloaded", report.failed));
    }
    Ok(())
}
