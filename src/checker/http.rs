// src/checker/http.rs
// =============================================================================
// This module talks to the network.
//
// Two seams, both implemented by `HttpClient`:
// - PageFetcher: downloads the HTML of the page being checked
// - Prober: asks one link for its status code and nothing else
//
// The job only ever sees these traits, so tests swap in fakes.
//
// Key functionality:
// - Makes GET requests with a per-request timeout
// - Follows a bounded number of redirects and reports the final status
// - Sorts failures into timeout / refused / DNS / TLS / redirect loop
// =============================================================================

use crate::config::HttpSettings;
use crate::error::FetchError;
use crate::model::{NetworkErrorKind, ProbeOutcome};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use std::error::Error as _;
use std::time::Duration;

/// The page body as it came off the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final status after redirects
    pub status: u16,
    pub body: Vec<u8>,
    /// Charset label from the Content-Type header, if any
    pub charset: Option<String>,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Downloads a page. Anything but a 2xx answer is an error.
    async fn fetch_page(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError>;
}

#[async_trait]
pub trait Prober: Send + Sync {
    /// Probes one absolute URL. Never fails: problems come back as outcomes.
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome;
}

// reqwest-backed implementation of both seams
//
// Client is cheap to clone (it's an Arc inside), and one instance is shared
// by every job so connections get pooled.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(settings.max_redirects))
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch_page(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::Network(classify_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let charset = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_from_content_type);

        // The body read is covered by the same request timeout
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(classify_error(&e)))?;

        Ok(FetchedPage {
            status: status.as_u16(),
            body: body.to_vec(),
            charset,
        })
    }
}

#[async_trait]
impl Prober for HttpClient {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        // The body is never read; dropping the response closes it
        match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => ProbeOutcome::http(response.status().as_u16()),
            Err(e) => {
                let kind = classify_error(&e);
                tracing::debug!(url, error = %e, ?kind, "probe failed");
                ProbeOutcome::network(kind)
            }
        }
    }
}

// Categorizes reqwest errors
//
// reqwest flags timeouts and redirect overflows directly. Everything else is
// buried in the source chain (hyper -> io::Error / rustls), so we walk it.
// tokio-rustls hands TLS failures up as io::Error with kind InvalidData.
fn classify_error(error: &reqwest::Error) -> NetworkErrorKind {
    if error.is_timeout() {
        return NetworkErrorKind::Timeout;
    }
    if error.is_redirect() {
        return NetworkErrorKind::TooManyRedirects;
    }

    let mut chain = error.to_string().to_lowercase();
    let mut source = error.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionRefused => return NetworkErrorKind::ConnectionRefused,
                std::io::ErrorKind::TimedOut => return NetworkErrorKind::Timeout,
                std::io::ErrorKind::InvalidData => return NetworkErrorKind::TlsFailure,
                _ => {}
            }
        }
        chain.push_str(" | ");
        chain.push_str(&cause.to_string().to_lowercase());
        source = cause.source();
    }

    if chain.contains("connection refused") {
        NetworkErrorKind::ConnectionRefused
    } else if chain.contains("dns error") || chain.contains("failed to lookup address") {
        NetworkErrorKind::DnsFailure
    } else if ["certificate", "handshake", "tls", "ssl"]
        .iter()
        .any(|needle| chain.contains(needle))
    {
        NetworkErrorKind::TlsFailure
    } else {
        NetworkErrorKind::Other
    }
}

// Pulls the charset label out of a Content-Type value
//
// "text/html; charset=ISO-8859-1" -> Some("ISO-8859-1")
fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            let value = value.trim().trim_matches('"');
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    })
}
