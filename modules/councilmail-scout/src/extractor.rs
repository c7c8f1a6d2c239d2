//! Candidate email extraction.
//!
//! Page bodies are scanned as raw text, never parsed as markup: arbitrary
//! council HTML is too often malformed or deeply nested for a parser to be
//! worth the failure modes, and a pattern scan only needs the characters.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// `local@domain.tld`: bounded local-part, lowercase 2-4 letter TLD.
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]{1,64}@[A-Za-z0-9.-]+\.[a-z]{2,4}").unwrap()
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Every non-overlapping email-shaped match, in order of appearance.
/// Duplicates are kept; callers collect into a set.
pub fn extract_emails(text: &str) -> Vec<String> {
    EMAIL_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Add every match in `text` to `candidates`.
pub fn collect_emails(text: &str, candidates: &mut BTreeSet<String>) {
    candidates.extend(extract_emails(text));
}

/// Render a search engine's HTML snippet to plain text.
///
/// Engines wrap query terms in `<b>`, which can split an address
/// (`jane.<b>smith</b>@council.gov.au`); stripping tags rejoins it.
pub fn render_snippet(html: &str) -> String {
    let text = TAG_RE.replace_all(html, "");
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#64;", "@")
        .replace("&amp;", "&")
}
