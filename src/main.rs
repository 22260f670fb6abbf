// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments and load settings
// 2. Submit every page (stored, then queued by id)
// 3. Let the worker pool drain the queue
// 4. Print what was recorded for each page
// 5. Exit with proper code (0 = all links fine, 1 = broken links, 2 = error)
//
// Logs go to stderr through tracing; results go to stdout.
// =============================================================================

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, Tuning};
use link_warden::checker::HttpClient;
use link_warden::job::queue::{DeliveryOutcome, Settlement};
use link_warden::{
    run_workers, JobQueue, LinkCheckJob, LinkCheckService, LinkResult, MemoryStore, PageId,
    ProbeOutcome, Settings,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("link_warden=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            page_urls,
            json,
            config,
            tuning,
        } => handle_check(&page_urls, json, config.as_deref(), &tuning).await,
    }
}

// Handles the 'check' subcommand
async fn handle_check(
    page_urls: &[String],
    json: bool,
    config: Option<&Path>,
    tuning: &Tuning,
) -> Result<i32> {
    let settings = tuning.apply(Settings::load(config)?);

    let store = Arc::new(MemoryStore::new());
    let http = Arc::new(HttpClient::new(&settings.http)?);
    let queue = Arc::new(JobQueue::new(settings.queue.max_deliveries));
    let job = Arc::new(LinkCheckJob::new(
        store.clone(),
        http.clone(),
        http,
        settings.job.clone(),
    ));
    let service = LinkCheckService::new(store, queue.clone());

    let mut pages = Vec::with_capacity(page_urls.len());
    for url in page_urls {
        let page_id = service
            .submit(url)
            .await
            .with_context(|| format!("could not submit {}", url))?;
        pages.push((page_id, url.clone()));
    }
    // Everything is queued; workers stop once the queue drains
    queue.close();

    let outcomes = run_workers(queue, job, settings.queue.workers).await;

    let mut reports = Vec::with_capacity(pages.len());
    for (page_id, url) in pages {
        let results = service.results(page_id).await?;
        let error = final_error(&outcomes, page_id);
        reports.push(PageReport {
            page_id,
            url,
            error,
            results,
        });
    }

    print_reports(&reports, json)?;

    let failed = reports.iter().any(|r| r.error.is_some());
    let broken = reports
        .iter()
        .flat_map(|r| &r.results)
        .any(|r| !r.status.is_ok());

    Ok(if failed {
        2
    } else if broken {
        1
    } else {
        0
    })
}

#[derive(Debug, Serialize)]
struct PageReport {
    page_id: PageId,
    url: String,
    /// Set when the page's job ended without succeeding
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    results: Vec<LinkResult>,
}

// The error of the page's last delivery, if that delivery was discarded
fn final_error(outcomes: &[DeliveryOutcome], page_id: PageId) -> Option<String> {
    outcomes
        .iter()
        .filter(|o| o.delivery.page_id == page_id && o.settlement == Settlement::Discarded)
        .find_map(|o| o.result.as_ref().err().map(|e| e.to_string()))
}

fn print_reports(reports: &[PageReport], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(reports)?);
    } else {
        for report in reports {
            print_table(report);
        }
    }
    Ok(())
}

// Prints one page's results as a human-readable table
fn print_table(report: &PageReport) {
    println!("🔍 {}", report.url);

    if let Some(error) = &report.error {
        println!("   ⚠️  check failed: {}\n", error);
        return;
    }

    println!("{:<60} {:<22} {:<30}", "URL", "STATUS", "MESSAGE");
    println!("{}", "=".repeat(112));

    for result in &report.results {
        // Truncate URL if too long for display
        let url_display = if result.url.chars().count() > 57 {
            format!("{}...", result.url.chars().take(57).collect::<String>())
        } else {
            result.url.clone()
        };

        println!(
            "{:<60} {:<22} {:<30}",
            url_display,
            format_status(&result.status),
            result.status
        );
    }

    println!();

    let ok_count = report.results.iter().filter(|r| r.status.is_ok()).count();
    let broken_count = report.results.len() - ok_count;

    println!("📊 Summary:");
    println!("   ✅ OK: {}", ok_count);
    println!("   ❌ Broken: {}", broken_count);
    println!("   📋 Total: {}", report.results.len());
    println!();
}

fn format_status(status: &ProbeOutcome) -> String {
    use link_warden::NetworkErrorKind as Kind;

    match status {
        ProbeOutcome::Http { code } if (200..300).contains(code) => "✅ OK".to_string(),
        ProbeOutcome::Http { code } if (300..400).contains(code) => "🔀 REDIRECT".to_string(),
        ProbeOutcome::Http { code: 404 | 410 } => "❌ BROKEN".to_string(),
        ProbeOutcome::Http { .. } => "⚠️  ERROR".to_string(),
        ProbeOutcome::NetworkError { kind } => match kind {
            Kind::Timeout => "⏱️  TIMEOUT".to_string(),
            Kind::TlsFailure => "🔒 SSL ERROR".to_string(),
            Kind::TooManyRedirects => "🔁 TOO MANY REDIRECTS".to_string(),
            Kind::DnsFailure => "🌐 DNS ERROR".to_string(),
            Kind::ConnectionRefused => "🚫 REFUSED".to_string(),
            Kind::Other => "⚠️  ERROR".to_string(),
        },
    }
}
