use std::time::Duration;

pub const DEFAULT_ACCEPT_HEADER: &str = "application/fhir+json";

/// Settings for a [`BulkClient`](crate::BulkClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkConfig {
    /// Number of files downloaded in parallel.
    pub workers: usize,

    /// `Accept` header sent with the kickoff request. Some servers reject
    /// the FHIR media type and expect plain `application/json`.
    pub accept_header: String,

    /// Base of the exponential backoff used when the server does not send
    /// `Retry-After`.
    pub base_delay: Duration,

    /// Number of status polls before the job is given up.
    pub max_attempts: u32,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            accept_header: DEFAULT_ACCEPT_HEADER.to_string(),
            base_delay: Duration::from_secs(10),
            max_attempts: 10,
        }
    }
}

impl BulkConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of parallel downloads. Zero is treated as one.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn with_accept_header(mut self, accept: impl Into<String>) -> Self {
        self.accept_header = accept.into();
        self
    }

    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Delay before the next poll.
    ///
    /// A `Retry-After` value from the server wins; otherwise the delay is
    /// `base_delay * 2^attempt`.
    pub fn poll_delay(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        match retry_after {
            Some(secs) => Duration::from_secs(secs),
            None => self
                .base_delay
                .saturating_mul(2u32.saturating_pow(attempt)),
        }
    }
}
