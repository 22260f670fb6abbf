// src/checker/normalize.rs
// =============================================================================
// Turns a raw href into an absolute URL we can probe, or rejects it.
//
// The rules are literal:
// - "/path" is glued onto the page URL as-is (no slash de-duplication)
// - anything that then starts with http:// or https:// is accepted
// - everything else (mailto:, tel:, javascript:, "#frag", "", junk) is rejected
//
// A page URL ending in "/" therefore produces "http://x.com//a", and that
// URL is what gets probed and stored.
// =============================================================================

use url::Url;

/// Result of normalizing one href
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Accepted(String),
    Rejected,
}

impl Normalized {
    pub fn accepted(self) -> Option<String> {
        match self {
            Normalized::Accepted(url) => Some(url),
            Normalized::Rejected => None,
        }
    }
}

// Resolves `href` against `base_url`
//
// Never fails: malformed input is simply Rejected.
//
// Examples:
//   normalize("/a", "http://x.com")              -> Accepted("http://x.com/a")
//   normalize("https://y.com/z", "http://x.com") -> Accepted("https://y.com/z")
//   normalize("mailto:a@b.com", "http://x.com")  -> Rejected
pub fn normalize(href: &str, base_url: &str) -> Normalized {
    let candidate = if href.starts_with('/') {
        format!("{}{}", base_url, href)
    } else {
        href.to_string()
    };

    if !is_checkable_link(&candidate) {
        return Normalized::Rejected;
    }

    // "http://" on its own, or with garbage after it, is still not probeable
    match Url::parse(&candidate) {
        Ok(url) if url.host_str().is_some() => Normalized::Accepted(candidate),
        _ => Normalized::Rejected,
    }
}

fn is_checkable_link(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
