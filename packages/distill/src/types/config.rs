//! Configuration types for indexing runs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Path-based exclusion policy.
///
/// Excluded documents are skipped deliberately (tracked separately from
/// failures and from unchanged skips).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathFilter {
    /// Only include paths with these prefixes (empty = all)
    #[serde(default)]
    pub include: Vec<String>,

    /// Exclude paths with these prefixes
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Only include paths with these extensions (empty = all)
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl PathFilter {
    /// Create a filter that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to paths under the given prefixes.
    pub fn including(prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            include: prefixes.into_iter().map(|p| p.into()).collect(),
            ..Default::default()
        }
    }

    /// Add an excluded prefix.
    pub fn excluding(mut self, prefix: impl Into<String>) -> Self {
        self.exclude.push(prefix.into());
        self
    }

    /// Restrict to the given file extensions (without the dot).
    pub fn with_extensions(mut self, extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extensions = extensions.into_iter().map(|e| e.into()).collect();
        self
    }

    /// Check whether a path passes this filter.
    pub fn matches(&self, path: &str) -> bool {
        if self.exclude.iter().any(|prefix| path.starts_with(prefix)) {
            return false;
        }

        if !self.include.is_empty() && !self.include.iter().any(|prefix| path.starts_with(prefix)) {
            return false;
        }

        if !self.extensions.is_empty() {
            let ext = path.rsplit('.').next().unwrap_or_default();
            if !self.extensions.iter().any(|e| e == ext) {
                return false;
            }
        }

        true
    }
}

/// Configuration for the indexing engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Vault directory to enumerate
    pub root: String,

    /// Maximum number of concurrently in-flight tasks
    pub concurrency: usize,

    /// Retries allowed after the first provider call
    /// (`max_retries = N` means up to `N + 1` calls per document)
    pub max_retries: u32,

    /// Base backoff delay before a retry; doubles per attempt
    #[serde(with = "duration_millis")]
    pub retry_backoff: Duration,

    /// Maximum documents processed by a dry run
    pub dry_run_limit: usize,

    /// Capacity of the pool's bounded event channel
    pub event_buffer: usize,

    /// Exclusion policy
    #[serde(default)]
    pub filter: PathFilter,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            root: String::new(),
            concurrency: 3,
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
            dry_run_limit: 10,
            event_buffer: 64,
            filter: PathFilter::default(),
        }
    }
}

impl IndexConfig {
    /// Create a config for a vault root.
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Set the concurrency bound.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base retry backoff.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Set the dry-run cap.
    pub fn with_dry_run_limit(mut self, limit: usize) -> Self {
        self.dry_run_limit = limit;
        self
    }

    /// Set the exclusion filter.
    pub fn with_filter(mut self, filter: PathFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Backoff delay before the given retry (attempts are 1-indexed).
    ///
    /// Exponential: base, 2x base, 4x base, ... for the retry following
    /// attempt 1, 2, 3, ...
    pub fn backoff_for(&self, failed_attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(failed_attempt.saturating_sub(1).min(10));
        self.retry_backoff.saturating_mul(factor)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
