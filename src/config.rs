// src/config.rs
// =============================================================================
// Runtime settings.
//
// Every value has a default. A TOML file (passed with --config) can override
// any of them, and CLI flags / LINK_WARDEN_* environment variables override
// the file. Example file:
//
//   [http]
//   max_redirects = 3
//
//   [job]
//   concurrency = 4
//   probe_timeout_secs = 5
//
//   [queue]
//   workers = 4
// =============================================================================

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub http: HttpSettings,
    pub job: JobSettings,
    pub queue: QueueSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpSettings {
    pub user_agent: String,
    /// Redirects followed before giving up (page fetch and probes)
    pub max_redirects: usize,
    pub connect_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: format!("link-warden/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: 5,
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobSettings {
    /// Probes in flight at once for a single page
    pub concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    /// Upper bound on the whole probing phase of one job
    pub job_timeout_secs: u64,
    /// Attempts per link record before the write is counted as failed
    pub write_attempts: u32,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            concurrency: 8,
            fetch_timeout_secs: 10,
            probe_timeout_secs: 10,
            job_timeout_secs: 120,
            write_attempts: 3,
        }
    }
}

impl JobSettings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueSettings {
    /// Jobs processed at the same time
    pub workers: usize,
    /// Deliveries of one job key before a transient failure is given up on
    pub max_deliveries: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            workers: 2,
            max_deliveries: 3,
        }
    }
}

impl Settings {
    // Reads settings from a TOML file, or returns the defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text)?;
        Ok(settings.sanitized())
    }

    // Zero workers or a zero-wide pool would never make progress
    pub fn sanitized(mut self) -> Self {
        self.job.concurrency = self.job.concurrency.max(1);
        self.job.write_attempts = self.job.write_attempts.max(1);
        self.queue.workers = self.queue.workers.max(1);
        self.queue.max_deliveries = self.queue.max_deliveries.max(1);
        self
    }
}
