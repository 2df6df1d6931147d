use fetch_engine::{
    decode_body, extract_meta_from_html, is_likely_markdown, markdown_quality, prepend_front_matter,
    strip_injectable_front_matter, Converter, Html2MdConverter, MarkdownExtraction,
};
use pretty_assertions::assert_eq;

#[test]
fn decode_respects_charset_header() {
    let decoded = decode_body(b"caf\xe9", Some("text/html; charset=ISO-8859-1"));
    assert_eq!(decoded.text, "café");
    assert!(decoded.encoding_label.eq_ignore_ascii_case("windows-1252"));
}

#[test]
fn converter_turns_html_into_markdown() {
    let md = Html2MdConverter.to_markdown("<h1>Hello</h1><p>world</p>");
    assert!(
        md.starts_with("# Hello") || md.starts_with("Hello\n=="),
        "unexpected markdown output: {md:?}"
    );
    assert!(md.contains("world"));
}

#[test]
fn decode_extract_convert_keeps_article_text() {
    let bytes = "<html><head><title>Grüße</title></head><body>\
        <article><h2>Über uns</h2><p>Wir schreiben über Straßen, Brücken und Tunnel.</p></article>\
        </body></html>"
        .as_bytes();
    let decoded = decode_body(bytes, Some("text/html; charset=utf-8"));
    let out = MarkdownExtraction::default()
        .html_to_markdown(&decoded.text, "https://example.com/about", 20)
        .unwrap();

    assert!(out.markdown.contains("Straßen"), "{}", out.markdown);
    assert!(out.markdown.ends_with('\n'));
    assert_eq!(
        extract_meta_from_html(&decoded.text).title.as_deref(),
        Some("Grüße")
    );
}

#[test]
fn extraction_is_deterministic() {
    let html = r#"<html><head><title>X</title></head><body><article><p>Alpha paragraph.</p><p>Beta paragraph.</p></article></body></html>"#;
    let extraction = MarkdownExtraction::default();
    let first = extraction
        .html_to_markdown(html, "https://example.com/x", 10)
        .unwrap();
    let second = extraction
        .html_to_markdown(html, "https://example.com/x", 10)
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn front_matter_round_trip_over_sniffed_markdown() {
    let body = "# Release notes\n\n- faster startup\n- fewer allocations\n\nSee [the changelog](https://example.com/changes).\n";
    assert!(is_likely_markdown(body, "text/plain"));

    let meta = extract_meta_from_html(
        r#"<head><title>Notes</title><meta name="description" content="What's new"></head>"#,
    );
    let enriched = prepend_front_matter(body, &meta);
    let (stripped, parsed) = strip_injectable_front_matter(&enriched).unwrap();

    assert_eq!(stripped, body);
    assert_eq!(prepend_front_matter(&stripped, &parsed), enriched);
}

#[test]
fn heading_alone_does_not_pass_quality() {
    let threshold = 50;
    let md = format!("# Title\n\n{}", "a".repeat(threshold - 1 - "Title".len()));
    assert!(!markdown_quality(&md, threshold));
}
