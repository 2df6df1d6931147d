use std::fmt;

/// Strategy that produced a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// The server answered with Markdown (declared or sniffed).
    HttpMarkdown,
    /// Static HTML went through article extraction.
    HttpStatic,
    /// A headless browser rendered the page.
    Browser,
    /// Raw mode: body returned verbatim.
    HttpRaw,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::HttpMarkdown => "http-markdown",
            Source::HttpStatic => "http-static",
            Source::Browser => "browser",
            Source::HttpRaw => "http-raw",
        }
    }

    /// Short tag used by the JSON-Lines serializer (`resolved_mode`).
    pub fn resolved_mode(&self) -> &'static str {
        match self {
            Source::HttpMarkdown => "markdown",
            Source::HttpStatic => "static",
            Source::Browser => "browser",
            Source::HttpRaw => "raw",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub markdown: String,
    pub source: Source,
    pub final_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}{}", message_suffix(.message))]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn no_content() -> Self {
        Self::new(FailureKind::NoContent, String::new())
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "operation was cancelled")
    }

    pub fn timed_out(after: std::time::Duration) -> Self {
        Self::new(FailureKind::Timeout, format!("deadline of {after:?} exceeded"))
    }

    /// The only failure the `auto` cascade treats as recoverable.
    pub fn is_http_status(&self) -> bool {
        matches!(self.kind, FailureKind::HttpStatus(_))
    }
}

fn message_suffix(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {message}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    UnsupportedMode,
    InvalidUrl,
    HttpStatus(u16),
    NoContent,
    Timeout,
    Network,
    Render,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::UnsupportedMode => write!(f, "unsupported mode"),
            FailureKind::InvalidUrl => write!(f, "invalid URL"),
            FailureKind::HttpStatus(_) => write!(f, "unexpected HTTP status code"),
            FailureKind::NoContent => write!(f, "no content could be extracted"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "http request failed"),
            FailureKind::Render => write!(f, "browser render failed"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_kind_and_message() {
        let err = FetchError::new(
            FailureKind::HttpStatus(404),
            "404 Not Found (https://example.com/x)",
        );
        assert_eq!(
            err.to_string(),
            "unexpected HTTP status code: 404 Not Found (https://example.com/x)"
        );
        assert!(err.is_http_status());
    }

    #[test]
    fn empty_message_renders_kind_only() {
        assert_eq!(
            FetchError::no_content().to_string(),
            "no content could be extracted"
        );
        assert!(!FetchError::no_content().is_http_status());
    }

    #[test]
    fn source_tags() {
        assert_eq!(Source::HttpMarkdown.to_string(), "http-markdown");
        assert_eq!(Source::HttpMarkdown.resolved_mode(), "markdown");
        assert_eq!(Source::HttpRaw.resolved_mode(), "raw");
    }
}
