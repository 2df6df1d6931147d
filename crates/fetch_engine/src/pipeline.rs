//! Strategy cascade: picks, per URL, the cheapest way to get readable Markdown.

use std::sync::Arc;

use fetch_logging::{fetch_debug, fetch_info};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::classify::{is_likely_markdown, is_markdown_content_type, normalize_markdown};
use crate::config::{FetchConfig, Mode};
use crate::decode::decode_body;
use crate::extract::MarkdownExtraction;
use crate::fetch::{Accept, Fetcher, HttpResponse, ReqwestFetcher};
use crate::frontmatter::{has_leading_front_matter, prepend_front_matter};
use crate::meta::extract_meta_from_html;
use crate::render::{ChromeRenderer, Renderer};
use crate::{FailureKind, FetchError, FetchResult, Source};

/// One extraction attempt inside a mode's plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Accept the HTTP body when it is (or sniffs as) Markdown.
    NativeMarkdown,
    /// Article extraction over the HTTP body. With `quality_gate` set, thin
    /// output and extraction failures decline instead of failing the fetch.
    StaticExtract { quality_gate: bool },
    /// Headless browser render.
    Render,
    /// The HTTP body verbatim.
    Raw,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::NativeMarkdown => "native-markdown",
            Strategy::StaticExtract { .. } => "static-extract",
            Strategy::Render => "render",
            Strategy::Raw => "raw",
        }
    }
}

/// Ordered strategies for a mode plus the single fallback predicate: whether
/// an HTTP status error lets the plan move on to strategies that do not need
/// the HTTP body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub strategies: &'static [Strategy],
    pub status_falls_through: bool,
}

const AUTO_PLAN: Plan = Plan {
    strategies: &[
        Strategy::NativeMarkdown,
        Strategy::StaticExtract { quality_gate: true },
        Strategy::Render,
    ],
    status_falls_through: true,
};
const STATIC_PLAN: Plan = Plan {
    strategies: &[
        Strategy::NativeMarkdown,
        Strategy::StaticExtract {
            quality_gate: false,
        },
    ],
    status_falls_through: false,
};
const BROWSER_PLAN: Plan = Plan {
    strategies: &[Strategy::Render],
    status_falls_through: false,
};
const RAW_PLAN: Plan = Plan {
    strategies: &[Strategy::Raw],
    status_falls_through: false,
};

impl Plan {
    pub fn for_mode(mode: Mode) -> Plan {
        match mode {
            Mode::Auto => AUTO_PLAN,
            Mode::Static => STATIC_PLAN,
            Mode::Browser => BROWSER_PLAN,
            Mode::Raw => RAW_PLAN,
        }
    }
}

enum Outcome {
    Accepted(FetchResult),
    Declined(String),
}

/// Something that turns a URL into a [`FetchResult`]. The batch executor
/// only depends on this.
#[async_trait::async_trait]
pub trait PageFetch: Send + Sync {
    async fn fetch_page(
        &self,
        url: &str,
        config: &FetchConfig,
        cancel: &CancellationToken,
    ) -> Result<FetchResult, FetchError>;
}

#[derive(Clone)]
pub struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    renderer: Arc<dyn Renderer>,
    extraction: MarkdownExtraction,
}

impl Pipeline {
    pub fn new(fetcher: Arc<dyn Fetcher>, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            fetcher,
            renderer,
            extraction: MarkdownExtraction::default(),
        }
    }

    /// reqwest for HTTP, Chrome for rendering.
    pub fn with_defaults() -> Result<Self, FetchError> {
        let extraction = MarkdownExtraction::default();
        Ok(Self {
            fetcher: Arc::new(ReqwestFetcher::new()?),
            renderer: Arc::new(ChromeRenderer::new(extraction.clone())),
            extraction,
        })
    }

    pub async fn fetch(
        &self,
        url: &str,
        config: &FetchConfig,
        cancel: &CancellationToken,
    ) -> Result<FetchResult, FetchError> {
        Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, format!("{url}: {err}")))?;
        let config = config.clone().normalized();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::cancelled()),
            result = self.run_plan(url, Plan::for_mode(config.mode), &config, cancel) => result,
        }
    }

    async fn run_plan(
        &self,
        url: &str,
        plan: Plan,
        config: &FetchConfig,
        cancel: &CancellationToken,
    ) -> Result<FetchResult, FetchError> {
        let mut attempt = Attempt {
            pipeline: self,
            url,
            config,
            cancel,
            status_falls_through: plan.status_falls_through,
            http: HttpState::Pending,
        };

        for strategy in plan.strategies {
            match attempt.run(*strategy).await? {
                Outcome::Accepted(result) => {
                    fetch_info!("{} resolved by {} ({})", url, strategy.name(), result.source);
                    return Ok(result);
                }
                Outcome::Declined(reason) => {
                    fetch_debug!("{} declined {}: {}", strategy.name(), url, reason);
                }
            }
        }
        Err(FetchError::no_content())
    }

    /// Second GET asking for HTML so a Markdown response can carry a title
    /// and description. Any failure leaves the Markdown as it was.
    async fn enrich_markdown(&self, url: &str, config: &FetchConfig, markdown: String) -> String {
        if has_leading_front_matter(&markdown) {
            return markdown;
        }
        match self.fetcher.get(url, Accept::PreferHtml, config).await {
            Ok(response) => {
                let html = decode_body(&response.body, response.content_type.as_deref());
                prepend_front_matter(&markdown, &extract_meta_from_html(&html.text))
            }
            Err(err) => {
                fetch_debug!("metadata request for {} failed: {}", url, err);
                markdown
            }
        }
    }
}

#[async_trait::async_trait]
impl PageFetch for Pipeline {
    async fn fetch_page(
        &self,
        url: &str,
        config: &FetchConfig,
        cancel: &CancellationToken,
    ) -> Result<FetchResult, FetchError> {
        self.fetch(url, config, cancel).await
    }
}

/// HTTP body decoded to text, shared by every strategy of one attempt.
struct HttpDocument {
    text: String,
    content_type: String,
    final_url: String,
}

impl From<HttpResponse> for HttpDocument {
    fn from(response: HttpResponse) -> Self {
        let decoded = decode_body(&response.body, response.content_type.as_deref());
        Self {
            text: decoded.text,
            content_type: response.content_type().to_string(),
            final_url: response.final_url,
        }
    }
}

enum HttpState {
    Pending,
    Ready(HttpDocument),
    /// A status error the plan is allowed to step past.
    Unavailable(String),
}

struct Attempt<'a> {
    pipeline: &'a Pipeline,
    url: &'a str,
    config: &'a FetchConfig,
    cancel: &'a CancellationToken,
    status_falls_through: bool,
    http: HttpState,
}

impl Attempt<'_> {
    async fn run(&mut self, strategy: Strategy) -> Result<Outcome, FetchError> {
        if strategy != Strategy::Render {
            self.ensure_http().await?;
        }
        self.attempt(strategy).await
    }

    async fn attempt(&self, strategy: Strategy) -> Result<Outcome, FetchError> {
        match strategy {
            Strategy::Render => self.render().await,
            Strategy::NativeMarkdown => match self.document() {
                Ok(doc) => Ok(self.native_markdown(doc).await),
                Err(reason) => Ok(Outcome::Declined(reason)),
            },
            Strategy::StaticExtract { quality_gate } => match self.document() {
                Ok(doc) => self.static_extract(doc, quality_gate),
                Err(reason) => Ok(Outcome::Declined(reason)),
            },
            Strategy::Raw => match self.document() {
                Ok(doc) => Ok(raw(doc)),
                Err(reason) => Ok(Outcome::Declined(reason)),
            },
        }
    }

    fn document(&self) -> Result<&HttpDocument, String> {
        match &self.http {
            HttpState::Ready(doc) => Ok(doc),
            HttpState::Unavailable(reason) => Err(reason.clone()),
            HttpState::Pending => Err("no HTTP response".to_string()),
        }
    }

    async fn native_markdown(&self, doc: &HttpDocument) -> Outcome {
        if !is_markdown_content_type(&doc.content_type)
            && !is_likely_markdown(&doc.text, &doc.content_type)
        {
            return Outcome::Declined("response is not markdown".to_string());
        }
        let markdown = normalize_markdown(&doc.text);
        if markdown.is_empty() {
            return Outcome::Declined("markdown body is empty".to_string());
        }
        let markdown = if self.config.include_meta {
            self.pipeline
                .enrich_markdown(self.url, self.config, markdown)
                .await
        } else {
            markdown
        };
        Outcome::Accepted(FetchResult {
            markdown,
            source: Source::HttpMarkdown,
            final_url: doc.final_url.clone(),
        })
    }

    fn static_extract(&self, doc: &HttpDocument, quality_gate: bool) -> Result<Outcome, FetchError> {
        let extracted = match self.pipeline.extraction.html_to_markdown(
            &doc.text,
            &doc.final_url,
            self.config.min_quality_text,
        ) {
            Ok(extracted) => extracted,
            Err(err) if quality_gate => return Ok(Outcome::Declined(err.to_string())),
            Err(err) => return Err(err),
        };
        if quality_gate && !extracted.quality_ok {
            return Ok(Outcome::Declined(
                "extracted markdown failed the quality gate".to_string(),
            ));
        }
        let markdown = if self.config.include_meta {
            prepend_front_matter(&extracted.markdown, &extract_meta_from_html(&doc.text))
        } else {
            extracted.markdown
        };
        Ok(Outcome::Accepted(FetchResult {
            markdown,
            source: Source::HttpStatic,
            final_url: doc.final_url.clone(),
        }))
    }

    async fn ensure_http(&mut self) -> Result<(), FetchError> {
        if !matches!(self.http, HttpState::Pending) {
            return Ok(());
        }
        self.http = match self
            .pipeline
            .fetcher
            .get(self.url, Accept::PreferMarkdown, self.config)
            .await
        {
            Ok(response) => HttpState::Ready(HttpDocument::from(response)),
            Err(err) if self.status_falls_through && err.is_http_status() => {
                HttpState::Unavailable(err.to_string())
            }
            Err(err) => return Err(err),
        };
        Ok(())
    }

    async fn render(&self) -> Result<Outcome, FetchError> {
        let page = self
            .pipeline
            .renderer
            .render(self.url, self.config, self.cancel)
            .await?;
        if page.markdown.trim().is_empty() {
            return Ok(Outcome::Declined("rendered page is empty".to_string()));
        }
        Ok(Outcome::Accepted(FetchResult {
            markdown: page.markdown,
            source: Source::Browser,
            final_url: page.final_url,
        }))
    }
}

fn raw(doc: &HttpDocument) -> Outcome {
    if doc.text.is_empty() {
        return Outcome::Declined("empty body".to_string());
    }
    Outcome::Accepted(FetchResult {
        markdown: doc.text.clone(),
        source: Source::HttpRaw,
        final_url: doc.final_url.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_falls_back_through_render() {
        let plan = Plan::for_mode(Mode::Auto);
        assert!(plan.status_falls_through);
        assert_eq!(plan.strategies.last(), Some(&Strategy::Render));
    }

    #[test]
    fn static_never_renders() {
        let plan = Plan::for_mode(Mode::Static);
        assert!(!plan.status_falls_through);
        assert!(!plan.strategies.contains(&Strategy::Render));
        assert_eq!(
            plan.strategies,
            &[
                Strategy::NativeMarkdown,
                Strategy::StaticExtract {
                    quality_gate: false
                }
            ]
        );
    }

    #[test]
    fn browser_and_raw_are_single_step() {
        assert_eq!(Plan::for_mode(Mode::Browser).strategies, &[Strategy::Render]);
        assert_eq!(Plan::for_mode(Mode::Raw).strategies, &[Strategy::Raw]);
    }
}
