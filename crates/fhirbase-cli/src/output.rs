use std::time::Duration;

use colored::Colorize;
use fhirbase_core::{LoadStats, MemoryStats};
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

/// One line describing current memory usage.
pub fn memory_line(mem: &MemoryStats) -> String {
    format!(
        "{} rss {} MiB, peak {} MiB, virtual {} MiB",
        "memory:".cyan(),
        mem.resident_mb(),
        mem.peak_resident_mb(),
        mem.virtual_mb()
    )
}

/// Rounded table of loaded resources per type, most frequent first.
pub fn load_table(stats: &LoadStats) -> String {
    let mut rows: Vec<(&str, u64)> = stats.counts().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    let mut builder = Builder::default();
    builder.push_record(["ResourceType", "Loaded"]);
    for (resource_type, count) in rows {
        builder.push_record([resource_type.to_string(), count.to_string()]);
    }
    builder.build().with(Style::rounded()).to_string()
}

pub fn print_load_summary(stats: &LoadStats, elapsed: Duration) {
    print_success(&format!(
        "Done, inserted {} resources in {:.2} seconds",
        stats.total(),
        elapsed.as_secs_f64()
    ));
    if stats.skipped() > 0 {
        print_warning(&format!(
            "{} resources were skipped, see the log for details",
            stats.skipped()
        ));
    }
    if stats.total() > 0 {
        println!("{}", load_table(stats));
    }
}
