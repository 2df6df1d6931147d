use std::io::Cursor;
use std::sync::Arc;

use fetch_logging::fetch_debug;
use url::Url;

use crate::classify::markdown_quality;
use crate::convert::{Converter, Html2MdConverter};
use crate::FetchError;

/// Boilerplate removal: reduces a full document to its article HTML.
///
/// `None` means "nothing recognisable as an article"; the caller then
/// converts the whole document instead.
pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str, page_url: &Url) -> Option<String>;
}

/// Mozilla readability port.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadabilityExtractor;

impl Extractor for ReadabilityExtractor {
    fn extract(&self, html: &str, page_url: &Url) -> Option<String> {
        let mut cursor = Cursor::new(html.as_bytes());
        let product = match readability::extractor::extract(&mut cursor, page_url) {
            Ok(product) => product,
            Err(_) => {
                fetch_debug!("readability found no article in {}", page_url);
                return None;
            }
        };

        if !product.content.trim().is_empty() {
            Some(product.content)
        } else if !product.text.trim().is_empty() {
            Some(format!("<p>{}</p>", escape_html(&product.text)))
        } else {
            None
        }
    }
}

/// Markdown produced from an HTML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMarkdown {
    /// Trimmed, newline-terminated Markdown.
    pub markdown: String,
    /// Outcome of the quality gate; callers decide whether it matters.
    pub quality_ok: bool,
}

/// Extractor + converter pair shared by the static and the rendered path.
#[derive(Clone)]
pub struct MarkdownExtraction {
    extractor: Arc<dyn Extractor>,
    converter: Arc<dyn Converter>,
}

impl Default for MarkdownExtraction {
    fn default() -> Self {
        Self::new(Arc::new(ReadabilityExtractor), Arc::new(Html2MdConverter))
    }
}

impl MarkdownExtraction {
    pub fn new(extractor: Arc<dyn Extractor>, converter: Arc<dyn Converter>) -> Self {
        Self {
            extractor,
            converter,
        }
    }

    pub fn html_to_markdown(
        &self,
        html: &str,
        page_url: &str,
        min_quality_text: usize,
    ) -> Result<ExtractedMarkdown, FetchError> {
        if html.trim().is_empty() {
            return Err(FetchError::no_content());
        }

        let article = Url::parse(page_url)
            .ok()
            .and_then(|url| self.extractor.extract(html, &url))
            .filter(|article| !article.trim().is_empty());
        let mut markdown = match article.as_deref() {
            Some(article) => self.converter.to_markdown(article),
            None => String::new(),
        };
        if markdown.trim().is_empty() {
            markdown = self.converter.to_markdown(html);
        }
        let markdown = markdown.trim();
        if markdown.is_empty() {
            return Err(FetchError::no_content());
        }

        Ok(ExtractedMarkdown {
            quality_ok: markdown_quality(markdown, min_quality_text),
            markdown: format!("{markdown}\n"),
        })
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FailureKind;

    struct NoArticle;

    impl Extractor for NoArticle {
        fn extract(&self, _html: &str, _page_url: &Url) -> Option<String> {
            None
        }
    }

    struct Verbatim;

    impl Converter for Verbatim {
        fn to_markdown(&self, html: &str) -> String {
            html.to_string()
        }
    }

    #[test]
    fn falls_back_to_whole_document_without_article() {
        let extraction = MarkdownExtraction::new(Arc::new(NoArticle), Arc::new(Verbatim));
        let out = extraction
            .html_to_markdown("  <p>whole</p>  ", "https://example.com/", 10)
            .unwrap();
        assert_eq!(out.markdown, "<p>whole</p>\n");
        assert!(!out.quality_ok);
    }

    #[test]
    fn invalid_page_url_skips_extractor() {
        let extraction = MarkdownExtraction::new(Arc::new(ReadabilityExtractor), Arc::new(Verbatim));
        let out = extraction
            .html_to_markdown("<p>raw</p>", "not a url", 10)
            .unwrap();
        assert_eq!(out.markdown, "<p>raw</p>\n");
    }

    #[test]
    fn empty_input_is_no_content() {
        let err = MarkdownExtraction::default()
            .html_to_markdown("   ", "https://example.com/", 10)
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::NoContent);
    }

    #[test]
    fn converts_article_and_scores_quality() {
        let html = r#"<!doctype html>
<html><head><title>Alpha</title></head><body>
<article>
  <h1>Alpha</h1>
  <p>This is a long enough paragraph for testing static conversion quality score.</p>
  <p>Another paragraph to avoid low-quality result.</p>
</article>
</body></html>"#;
        let out = MarkdownExtraction::default()
            .html_to_markdown(html, "https://example.com/post", 20)
            .unwrap();
        assert!(out.quality_ok, "quality gate rejected: {:?}", out.markdown);
        assert!(out.markdown.contains("long enough paragraph"));
        assert!(out.markdown.ends_with('\n'));
    }

    #[test]
    fn escapes_text_fallback() {
        assert_eq!(escape_html("a<b & 'c'"), "a&lt;b &amp; &#39;c&#39;");
    }
}
