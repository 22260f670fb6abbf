// src/checker/html.rs
// =============================================================================
// This module pulls raw href values out of an HTML page.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Never rejects a document: broken markup is repaired the way a browser would
// - Supports CSS selectors for finding elements
//
// Bytes are decoded first with `encoding_rs`, using the charset the server
// sent (falling back to UTF-8). Nothing is resolved here: hrefs come out
// exactly as written, and the normalizer decides what to do with them.
//
// Rust concepts:
// - Lifetimes: the iterator borrows the parsed document
// - impl Trait: returning an iterator without naming its type
// =============================================================================

use encoding_rs::{Encoding, UTF_8};
use scraper::{Html, Selector};
use std::sync::LazyLock;

// <a href> and <area href> are the anchor-like elements we follow.
// Elements without an href never match, so they are skipped rather than
// showing up as empty strings.
static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a[href], area[href]").expect("anchor selector is valid CSS")
});

// A parsed page whose hrefs can be walked any number of times
//
// Parsing happens once in `parse`; `hrefs()` is lazy and starts over from
// the top of the document on every call.
pub struct LinkExtractor {
    document: Html,
}

impl LinkExtractor {
    // Decodes and parses a page body
    //
    // Parameters:
    //   body: raw response bytes
    //   encoding: charset label such as "utf-8" or "iso-8859-1", if known
    pub fn parse(body: &[u8], encoding: Option<&str>) -> Self {
        let encoding = encoding
            .and_then(|label| Encoding::for_label(label.trim().as_bytes()))
            .unwrap_or(UTF_8);

        // decode() also honors a byte order mark and replaces invalid
        // sequences with U+FFFD instead of failing
        let (text, _, had_errors) = encoding.decode(body);
        if had_errors {
            tracing::debug!(encoding = encoding.name(), "page body had malformed sequences");
        }

        Self {
            document: Html::parse_document(&text),
        }
    }

    // Yields every href in document order
    pub fn hrefs(&self) -> impl Iterator<Item = &str> + '_ {
        self.document
            .select(&ANCHOR_SELECTOR)
            .filter_map(|element| element.value().attr("href"))
    }
}

// Convenience wrapper: parse a body and copy its hrefs out
//
// The job uses this so the parsed document (which is not Send) is dropped
// before the next await point.
pub fn extract_hrefs(body: &[u8], encoding: Option<&str>) -> Vec<String> {
    LinkExtractor::parse(body, encoding)
        .hrefs()
        .map(str::to_owned)
        .collect()
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What is LazyLock?
//    - A value built the first time it is used, then shared
//    - Parsing the CSS selector once instead of on every page
//
// 2. Why does hrefs() return `impl Iterator<Item = &str> + '_`?
//    - The &str values point into the parsed document
//    - '_ says "this iterator borrows from self"
//    - Nothing is copied until a caller asks for owned Strings
//
// 3. What does Encoding::decode return?
//    - (text, encoding actually used, whether anything had to be replaced)
//    - text is a Cow<str>: borrowed when the bytes were already valid UTF-8
// -----------------------------------------------------------------------------
