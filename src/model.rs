// src/model.rs
// =============================================================================
// The records this crate reads and writes.
//
// - Page: the HTML document being checked (created before a job is queued)
// - LinkResult: one probed link found on a page
// - ProbeOutcome: what happened when we probed that link
//
// Jobs never hold a Page directly. They are handed a PageId and look the
// page up again through the store, so nothing but an id crosses the queue.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;
use uuid::Uuid;

/// Opaque identifier of a stored page. This is also the job key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(Uuid);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Opaque identifier of a stored link result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkResultId(Uuid);

impl LinkResultId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LinkResultId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LinkResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    /// Absolute http(s) URL, set once at creation
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkResult {
    pub id: LinkResultId,
    /// Back-reference only; the page does not own its results
    pub page_id: PageId,
    pub url: String,
    pub status: ProbeOutcome,
    pub checked_at: DateTime<Utc>,
}

// Why a probe could not produce a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkErrorKind {
    /// No complete answer within the timeout
    Timeout,
    ConnectionRefused,
    /// Could not resolve hostname
    DnsFailure,
    /// SSL/TLS handshake or certificate error
    TlsFailure,
    /// Redirect chain longer than the configured bound (or a loop)
    TooManyRedirects,
    Other,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NetworkErrorKind::Timeout => "request timed out",
            NetworkErrorKind::ConnectionRefused => "connection refused",
            NetworkErrorKind::DnsFailure => "could not resolve hostname",
            NetworkErrorKind::TlsFailure => "TLS error",
            NetworkErrorKind::TooManyRedirects => "too many redirects",
            NetworkErrorKind::Other => "network error",
        };
        f.write_str(text)
    }
}

// The recorded outcome of probing one link: exactly one of these per result.
//
// Link-level failures are data, not errors. A dead link is what we are
// measuring, so it is stored like any other outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// Final HTTP status after following redirects
    Http { code: u16 },
    NetworkError { kind: NetworkErrorKind },
}

impl ProbeOutcome {
    // Builds an Http outcome, refusing codes outside the HTTP range
    pub fn http(code: u16) -> Self {
        if (100..=599).contains(&code) {
            ProbeOutcome::Http { code }
        } else {
            ProbeOutcome::NetworkError {
                kind: NetworkErrorKind::Other,
            }
        }
    }

    pub fn network(kind: NetworkErrorKind) -> Self {
        ProbeOutcome::NetworkError { kind }
    }

    /// True for 2xx and 3xx answers
    pub fn is_ok(&self) -> bool {
        matches!(self, ProbeOutcome::Http { code } if (200..400).contains(code))
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Http { code } => write!(f, "HTTP {}", code),
            ProbeOutcome::NetworkError { kind } => write!(f, "{}", kind),
        }
    }
}

// Checks that a page URL can be stored: non-empty, parseable, http(s), with a host
pub fn validate_page_url(raw: &str) -> Result<(), String> {
    if raw.trim().is_empty() {
        return Err("page URL is empty".to_string());
    }

    let parsed = Url::parse(raw).map_err(|e| format!("'{}' is not a URL: {}", raw, e))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("'{}' is not an http(s) URL", raw));
    }
    if parsed.host_str().is_none() {
        return Err(format!("'{}' has no host", raw));
    }

    Ok(())
}
