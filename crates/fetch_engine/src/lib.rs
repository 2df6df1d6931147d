//! Fetch engine: turns URLs into Markdown through a cascade of HTTP,
//! extraction and headless-browser strategies.
mod batch;
mod classify;
mod config;
mod convert;
mod decode;
mod extract;
mod fetch;
mod frontmatter;
mod idle;
mod meta;
mod output;
mod pipeline;
mod render;
mod types;

pub use batch::{failed_count, fetch_batch, TaskResult};
pub use classify::{
    is_likely_markdown, is_markdown_content_type, markdown_quality, markdown_score,
    normalize_markdown, substantive_len, MAX_MARKDOWN_SAMPLE_CHARS,
};
pub use config::{
    default_user_agent, FetchConfig, Mode, DEFAULT_BROWSER_TIMEOUT, DEFAULT_HTTP_TIMEOUT,
    DEFAULT_MAX_BODY_BYTES, DEFAULT_MIN_QUALITY_TEXT, DEFAULT_NETWORK_IDLE, TASK_DEADLINE_SLACK,
};
pub use convert::{Converter, Html2MdConverter};
pub use decode::{decode_body, DecodedText};
pub use extract::{ExtractedMarkdown, Extractor, MarkdownExtraction, ReadabilityExtractor};
pub use fetch::{Accept, Fetcher, HttpResponse, ReqwestFetcher, HTML_ACCEPT, MARKDOWN_ACCEPT};
pub use frontmatter::{
    has_leading_front_matter, prepend_front_matter, strip_injectable_front_matter,
};
pub use idle::{NetworkEvent, NetworkIdleWatcher, ResourceKind};
pub use meta::{extract_meta_from_html, PageMeta};
pub use output::{sanitize_for_comment, write_batch_jsonl, write_batch_markdown, OutputError};
pub use pipeline::{PageFetch, Pipeline, Plan, Strategy};
pub use render::{to_cdp_headers, ChromeRenderer, RenderedPage, Renderer};
pub use types::{FailureKind, FetchError, FetchResult, Source};

pub use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
pub use tokio_util::sync::CancellationToken;
