// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// We use the "derive" API which lets us define the CLI structure using
// Rust structs and attributes (the #[...] things). Every tuning flag is
// optional: when it is absent the value from the config file (or the
// built-in default) is used.
// =============================================================================

use clap::{Parser, Subcommand};
use link_warden::Settings;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "link-warden",
    version,
    about = "Checks every link on a web page and records what each one answered",
    long_about = "link-warden fetches a page, extracts every anchor, probes each http(s) link \
                  through a bounded pool and records the status it answered with."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the links on one or more pages
    ///
    /// Example: link-warden check https://example.com --concurrency 4
    Check {
        /// Page URLs to check (each one becomes its own job)
        #[arg(required = true)]
        page_urls: Vec<String>,

        /// Output results in JSON format instead of a table
        #[arg(long)]
        json: bool,

        /// TOML settings file
        #[arg(long, env = "LINK_WARDEN_CONFIG")]
        config: Option<PathBuf>,

        #[command(flatten)]
        tuning: Tuning,
    },
}

// Overrides for values that can also come from the settings file
#[derive(clap::Args, Debug, Default)]
pub struct Tuning {
    /// Probes in flight at once for a single page
    #[arg(long, env = "LINK_WARDEN_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Seconds allowed for each link probe
    #[arg(long, env = "LINK_WARDEN_PROBE_TIMEOUT")]
    pub probe_timeout: Option<u64>,

    /// Seconds allowed for fetching the page itself
    #[arg(long, env = "LINK_WARDEN_FETCH_TIMEOUT")]
    pub fetch_timeout: Option<u64>,

    /// Seconds allowed for probing all links of one page
    #[arg(long, env = "LINK_WARDEN_JOB_TIMEOUT")]
    pub job_timeout: Option<u64>,

    /// Redirects to follow before giving up
    #[arg(long, env = "LINK_WARDEN_MAX_REDIRECTS")]
    pub max_redirects: Option<usize>,

    /// Pages checked at the same time
    #[arg(long, env = "LINK_WARDEN_WORKERS")]
    pub workers: Option<usize>,
}

impl Tuning {
    // Applies every flag that was given on top of `settings`
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(n) = self.concurrency {
            settings.job.concurrency = n;
        }
        if let Some(secs) = self.probe_timeout {
            settings.job.probe_timeout_secs = secs;
        }
        if let Some(secs) = self.fetch_timeout {
            settings.job.fetch_timeout_secs = secs;
        }
        if let Some(secs) = self.job_timeout {
            settings.job.job_timeout_secs = secs;
        }
        if let Some(n) = self.max_redirects {
            settings.http.max_redirects = n;
        }
        if let Some(n) = self.workers {
            settings.queue.workers = n;
        }
        settings.sanitized()
    }
}
