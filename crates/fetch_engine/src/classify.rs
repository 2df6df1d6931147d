//! Heuristics that decide whether a payload already is Markdown and whether
//! extracted Markdown is worth keeping.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::DEFAULT_MIN_QUALITY_TEXT;

/// Only the head of a payload is sniffed.
pub const MAX_MARKDOWN_SAMPLE_CHARS: usize = 12_000;

/// At this many tag-like matches the payload is treated as HTML.
const HTML_TAG_REJECT_COUNT: usize = 6;

/// Scoring stops once this much structure has been seen.
const SCORE_SATURATION: u32 = 5;

static HTML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[a-z][a-z0-9]*(\s+[^>]*)?>").expect("valid tag regex"));
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s+\S").expect("valid heading regex"));
static LIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*+]\s+\S|\d+\.\s+\S)").expect("valid list regex"));
static QUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^>\s+\S").expect("valid quote regex"));
static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\|.+\|$").expect("valid table regex"));
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]+\]\([^)]+\)").expect("valid link regex"));
static LINK_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[.+\]\(.+\)$").expect("valid link-only regex"));

/// True when the declared MIME type names Markdown.
pub fn is_markdown_content_type(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("text/markdown")
}

/// Sniffs whether `body` reads as Markdown rather than HTML or structured data.
pub fn is_likely_markdown(body: &str, content_type: &str) -> bool {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return false;
    }

    let sample = head_chars(trimmed, MAX_MARKDOWN_SAMPLE_CHARS);
    let lc_type = content_type.to_ascii_lowercase();
    if looks_like_json_payload(sample, &lc_type) {
        return false;
    }

    let lower = sample.to_lowercase();
    let html_markers = ["<!doctype html", "<html", "<body", "<script", "<style"];
    if html_markers.iter().any(|marker| lower.contains(marker)) {
        return false;
    }

    let html_tags = HTML_TAG_RE.find_iter(&lower).count();
    if html_tags >= HTML_TAG_REJECT_COUNT {
        return false;
    }

    let score = markdown_score(sample);
    if score >= 2 {
        return true;
    }

    let sample_len = sample.chars().count();
    if html_tags == 0 {
        if lc_type.contains("text/markdown") {
            return true;
        }
        if score >= 1 && sample_len >= 180 {
            return true;
        }
        if !lc_type.contains("text/html") && sample_len >= 80 {
            return true;
        }
    }

    false
}

/// Structural score of a Markdown-ish text, saturating at 5.
///
/// Headings and fenced code count double; list items, quotes, table rows and
/// inline links count once.
pub fn markdown_score(input: &str) -> u32 {
    let mut score = 0;
    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if HEADING_RE.is_match(line) {
            score += 2;
        } else if LIST_RE.is_match(line) || QUOTE_RE.is_match(line) || TABLE_RE.is_match(line) {
            score += 1;
        }
        if line.contains("```") {
            score += 2;
        }
        if LINK_RE.is_match(line) {
            score += 1;
        }
        if score >= SCORE_SATURATION {
            return score;
        }
    }
    score
}

/// Quality gate applied to extracted Markdown before it is accepted.
///
/// `min_quality_text == 0` falls back to the default threshold.
pub fn markdown_quality(markdown: &str, min_quality_text: usize) -> bool {
    let trimmed = markdown.trim();
    if trimmed.is_empty() {
        return false;
    }

    let threshold = if min_quality_text == 0 {
        DEFAULT_MIN_QUALITY_TEXT
    } else {
        min_quality_text
    };

    let text_len = substantive_len(trimmed);
    if text_len < threshold {
        return false;
    }

    let mut non_empty = 0usize;
    let mut link_only = 0usize;
    for line in trimmed.lines().map(str::trim).filter(|l| !l.is_empty()) {
        non_empty += 1;
        if LINK_ONLY_RE.is_match(line) {
            link_only += 1;
        }
    }
    // Navigation-heavy pages convert to mostly bare links.
    if non_empty > 0 && link_only * 2 > non_empty && text_len < threshold * 3 {
        return false;
    }

    if markdown_score(trimmed) >= 2 {
        return true;
    }
    text_len >= threshold * 2
}

/// Counts ASCII letters and digits plus every non-ASCII scalar value.
pub fn substantive_len(text: &str) -> usize {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric() || !c.is_ascii())
        .count()
}

fn looks_like_json_payload(sample: &str, lc_content_type: &str) -> bool {
    if lc_content_type.contains("json") {
        return true;
    }
    let trimmed = sample.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return false;
    }
    if serde_json::from_str::<serde::de::IgnoredAny>(trimmed).is_ok() {
        return true;
    }
    // A truncated sample of a large document is no longer valid JSON.
    trimmed.contains("\":")
}

fn head_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Trims the body and guarantees exactly one trailing newline; empty stays empty.
pub fn normalize_markdown(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    format!("{trimmed}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_content_type_is_case_insensitive() {
        assert!(is_markdown_content_type("Text/Markdown; charset=utf-8"));
        assert!(!is_markdown_content_type("text/plain"));
    }

    #[test]
    fn detects_plain_markdown() {
        let md = "# Title\n\n- item\n\nThis is markdown.\n";
        assert!(is_likely_markdown(md, "text/plain"));
    }

    #[test]
    fn rejects_html_documents() {
        let html = "<!doctype html><html><body><h1>Title</h1></body></html>";
        assert!(!is_likely_markdown(html, "text/html"));
        assert!(!is_likely_markdown("# Heading\n<script>alert(1)</script>", "text/plain"));
    }

    #[test]
    fn rejects_tag_heavy_fragments() {
        let fragment = "<div><p>a</p><p>b</p><span>c</span></div>";
        assert!(!is_likely_markdown(fragment, "text/plain"));
    }

    #[test]
    fn rejects_json_even_with_markdown_lookalikes() {
        let payload = r##"{"items":[{"id":1,"name":"# alpha"},{"id":2,"name":"- beta"}],"meta":{"total":203,"note":"this payload is intentionally long enough to trigger the length based acceptance"}}"##;
        assert!(!is_likely_markdown(payload, "text/plain"));
        assert!(!is_likely_markdown(payload, "application/json"));
        assert!(!is_likely_markdown("# Heading\n\nplain words", "application/json"));
    }

    #[test]
    fn rejects_truncated_json_objects() {
        let truncated = r#"{"key": "value", "other": [1, 2, 3"#;
        assert!(!is_likely_markdown(truncated, "text/plain"));
    }

    #[test]
    fn declared_markdown_without_tags_is_accepted() {
        assert!(is_likely_markdown("just a short note", "text/markdown"));
    }

    #[test]
    fn long_plain_text_is_accepted_unless_declared_html() {
        let text = "plain prose without any structure at all, repeated until long enough. ".repeat(2);
        assert!(is_likely_markdown(&text, "text/plain"));
        assert!(!is_likely_markdown(&text, "text/html"));
    }

    #[test]
    fn sparse_markdown_with_single_marker_needs_length() {
        let short = "- one item only";
        assert!(!is_likely_markdown(short, "text/html"));
        let long = format!("- one item only\n\n{}", "words ".repeat(40));
        assert!(is_likely_markdown(&long, "text/html"));
    }

    #[test]
    fn classification_is_deterministic() {
        let body = "## Notes\n\n> quoted\n\n| a | b |\n";
        let first = is_likely_markdown(body, "text/plain");
        for _ in 0..10 {
            assert_eq!(is_likely_markdown(body, "text/plain"), first);
        }
    }

    #[test]
    fn score_counts_structures() {
        assert_eq!(markdown_score("# Heading"), 2);
        assert_eq!(markdown_score("- item\n> quote"), 2);
        assert_eq!(markdown_score("see [docs](https://example.com)"), 1);
        assert_eq!(markdown_score("```rust\nfn main() {}\n```"), 4);
        assert_eq!(markdown_score("plain words"), 0);
    }

    #[test]
    fn score_saturates_early() {
        let many = "# a\n# b\n# c\n# d\n";
        assert_eq!(markdown_score(many), 6);
    }

    #[test]
    fn quality_rejects_below_threshold_even_with_heading() {
        let threshold = 50;
        let body = format!("# {}", "a".repeat(threshold - 1));
        assert_eq!(substantive_len(&body), threshold - 1);
        assert!(!markdown_quality(&body, threshold));
    }

    #[test]
    fn quality_accepts_structured_text_at_threshold() {
        let threshold = 50;
        let body = format!("# Title\n\n{}", "a".repeat(threshold));
        assert!(markdown_quality(&body, threshold));
    }

    #[test]
    fn quality_accepts_unstructured_text_at_double_threshold() {
        let threshold = 50;
        assert!(!markdown_quality(&"a".repeat(threshold), threshold));
        assert!(markdown_quality(&"a".repeat(threshold * 2), threshold));
    }

    #[test]
    fn quality_rejects_link_farms() {
        let body = (0..12)
            .map(|i| format!("[Section {i}](https://example.com/{i})"))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(substantive_len(&body), 292);
        assert!(!markdown_quality(&body, 100));
        // Enough text overall overrides the link-farm rule.
        assert!(markdown_quality(&body, 90));

        let sparse = "[home](https://example.com/)\n[about](https://example.com/about)\nIntro paragraph with real words in it.";
        assert!(!markdown_quality(sparse, 40));
    }

    #[test]
    fn substantive_length_counts_non_ascii() {
        assert_eq!(substantive_len("日本語 text!"), 7);
    }

    #[test]
    fn normalize_adds_single_newline() {
        assert_eq!(normalize_markdown("  # X  \n\n\n"), "# X\n");
        assert_eq!(normalize_markdown(" \n "), "");
    }
}
