use std::collections::BTreeMap;

/// Per-resource-type counters collected while a load runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    counts: BTreeMap<String, u64>,
    total: u64,
    skipped: u64,
}

impl LoadStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one loaded resource of the given type.
    pub fn record(&mut self, resource_type: &str) {
        *self.counts.entry(resource_type.to_string()).or_insert(0) += 1;
        self.total += 1;
    }

    /// Records one resource that was skipped (e.g. failed to transform).
    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn count_for(&self, resource_type: &str) -> u64 {
        self.counts.get(resource_type).copied().unwrap_or(0)
    }

    /// Counts ordered by resource type name.
    pub fn counts(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// A snapshot of the process memory footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    /// Resident set size in bytes
    pub resident_bytes: u64,
    /// Peak resident set size in bytes
    pub peak_resident_bytes: u64,
    /// Virtual memory size in bytes
    pub virtual_bytes: u64,
}

impl MemoryStats {
    /// Samples the current process. Returns `None` where `/proc` is unavailable.
    pub fn sample() -> Option<Self> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        Self::parse_proc_status(&status)
    }

    /// Parses the `VmRSS`, `VmHWM` and `VmSize` lines of `/proc/<pid>/status`.
    pub fn parse_proc_status(status: &str) -> Option<Self> {
        let field = |name: &str| -> Option<u64> {
            status
                .lines()
                .find_map(|line| line.strip_prefix(name))
                .and_then(|rest| rest.trim_start_matches(':').split_whitespace().next())
                .and_then(|kb| kb.parse::<u64>().ok())
                .map(|kb| kb * 1024)
        };

        let resident_bytes = field("VmRSS")?;
        Some(Self {
            resident_bytes,
            peak_resident_bytes: field("VmHWM").unwrap_or(resident_bytes),
            virtual_bytes: field("VmSize").unwrap_or(0),
        })
    }

    pub fn resident_mb(&self) -> u64 {
        self.resident_bytes / 1024 / 1024
    }

    pub fn peak_resident_mb(&self) -> u64 {
        self.peak_resident_bytes / 1024 / 1024
    }

    pub fn virtual_mb(&self) -> u64 {
        self.virtual_bytes / 1024 / 1024
    }
}
