use std::collections::BTreeMap;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, Headers,
    ResourceType, SetExtraHttpHeadersParams,
};
use chromiumoxide::Page;
use fetch_logging::{fetch_debug, fetch_warn};
use futures_util::{stream, StreamExt};
use reqwest::header::HeaderMap;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::FetchConfig;
use crate::extract::MarkdownExtraction;
use crate::frontmatter::prepend_front_matter;
use crate::idle::{NetworkEvent, NetworkIdleWatcher, ResourceKind};
use crate::meta::extract_meta_from_html;
use crate::{FailureKind, FetchError};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Markdown produced by a headless browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub markdown: String,
    /// Location after client-side redirects.
    pub final_url: String,
}

/// Loads a page in a browser, waits for the network to settle and returns
/// the extracted Markdown.
#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        url: &str,
        config: &FetchConfig,
        cancel: &CancellationToken,
    ) -> Result<RenderedPage, FetchError>;
}

/// Chrome/Chromium over the DevTools protocol. One browser process per call.
#[derive(Clone, Default)]
pub struct ChromeRenderer {
    extraction: MarkdownExtraction,
}

impl ChromeRenderer {
    pub fn new(extraction: MarkdownExtraction) -> Self {
        Self { extraction }
    }
}

#[async_trait::async_trait]
impl Renderer for ChromeRenderer {
    async fn render(
        &self,
        url: &str,
        config: &FetchConfig,
        cancel: &CancellationToken,
    ) -> Result<RenderedPage, FetchError> {
        let deadline = Instant::now() + config.browser_timeout;

        let mut session = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::cancelled()),
            launched = timeout_at(deadline, BrowserSession::launch(config)) => match launched {
                Ok(session) => session?,
                Err(_) => return Err(FetchError::timed_out(config.browser_timeout)),
            },
        };

        let captured = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::cancelled()),
            captured = timeout_at(deadline, session.capture(url, config, cancel)) => match captured {
                Ok(result) => result,
                Err(_) => Err(FetchError::timed_out(config.browser_timeout)),
            },
        };
        session.shutdown().await;
        let (html_doc, final_url) = captured?;

        let extracted =
            self.extraction
                .html_to_markdown(&html_doc, &final_url, config.min_quality_text)?;
        let markdown = if config.include_meta {
            prepend_front_matter(&extracted.markdown, &extract_meta_from_html(&html_doc))
        } else {
            extracted.markdown
        };

        Ok(RenderedPage {
            markdown,
            final_url,
        })
    }
}

struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    events: Option<JoinHandle<()>>,
}

impl BrowserSession {
    async fn launch(config: &FetchConfig) -> Result<Self, FetchError> {
        let mut builder = BrowserConfig::builder()
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if !config.user_agent.is_empty() {
            builder = builder.arg(format!("--user-agent={}", config.user_agent));
        }
        if let Some(path) = &config.browser_path {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(render_error)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(render_error)?;
        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });
        fetch_debug!("browser launched");

        Ok(Self {
            browser,
            handler,
            events: None,
        })
    }

    /// Navigates and returns the serialised document plus its final URL.
    async fn capture(
        &mut self,
        url: &str,
        config: &FetchConfig,
        cancel: &CancellationToken,
    ) -> Result<(String, String), FetchError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(render_error)?;
        page.execute(EnableParams::default())
            .await
            .map_err(render_error)?;

        let watcher = NetworkIdleWatcher::new(config.network_idle);
        self.listen(&page, &watcher).await?;

        if let Some(headers) = to_cdp_headers(&config.headers) {
            page.execute(SetExtraHttpHeadersParams::new(Headers::new(headers)))
                .await
                .map_err(render_error)?;
        }

        page.goto(url).await.map_err(render_error)?;
        fetch_debug!("browser navigated to {}", url);

        let selector = config.wait_selector.as_deref().unwrap_or("body");
        while page.find_element(selector).await.is_err() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        watcher.wait(cancel).await?;
        fetch_debug!("network idle reached for {}", url);

        let html_doc = page.content().await.map_err(render_error)?;
        let final_url = page
            .url()
            .await
            .map_err(render_error)?
            .unwrap_or_else(|| url.to_string());
        Ok((html_doc, final_url))
    }

    /// Feeds the watcher from one task. The three CDP listeners are separate
    /// channels, so a finish can still be read before its start; the watcher
    /// accounts for that.
    async fn listen(&mut self, page: &Page, watcher: &NetworkIdleWatcher) -> Result<(), FetchError> {
        let started = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(render_error)?
            .map(|event| {
                let kind = match event.r#type {
                    Some(ResourceType::WebSocket) => ResourceKind::WebSocket,
                    Some(ResourceType::EventSource) => ResourceKind::EventSource,
                    _ => ResourceKind::Other,
                };
                NetworkEvent::RequestStarted {
                    id: event.request_id.inner().clone(),
                    kind,
                }
            });
        let finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(render_error)?
            .map(|event| NetworkEvent::Finished {
                id: event.request_id.inner().clone(),
            });
        let failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(render_error)?
            .map(|event| NetworkEvent::Failed {
                id: event.request_id.inner().clone(),
            });

        let watcher = watcher.clone();
        self.events = Some(tokio::spawn(async move {
            let mut events = std::pin::pin!(stream::select(started, stream::select(finished, failed)));
            while let Some(event) = events.next().await {
                watcher.observe(event);
            }
        }));

        Ok(())
    }

    async fn shutdown(mut self) {
        if let Some(events) = self.events.take() {
            events.abort();
        }
        if let Err(err) = self.browser.close().await {
            fetch_warn!("failed to close browser: {}", err);
        }
        if let Err(err) = self.browser.wait().await {
            fetch_warn!("browser process did not exit cleanly: {}", err);
        }
        self.handler.abort();
    }
}

fn render_error(err: impl std::fmt::Display) -> FetchError {
    FetchError::new(FailureKind::Render, err.to_string())
}

/// Flattens a header multimap into the object `Network.setExtraHTTPHeaders`
/// expects. Keys come out sorted; repeated `cookie` values are joined with
/// `"; "`, every other repeated header with `", "`.
pub fn to_cdp_headers(headers: &HeaderMap) -> Option<serde_json::Value> {
    if headers.is_empty() {
        return None;
    }

    let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (name, value) in headers.iter() {
        let Ok(value) = value.to_str() else {
            continue;
        };
        grouped.entry(name.as_str()).or_default().push(value);
    }

    let object: serde_json::Map<String, serde_json::Value> = grouped
        .into_iter()
        .map(|(name, values)| {
            let separator = if name.eq_ignore_ascii_case("cookie") {
                "; "
            } else {
                ", "
            };
            (name.to_string(), serde_json::Value::String(values.join(separator)))
        })
        .collect();
    if object.is_empty() {
        None
    } else {
        Some(serde_json::Value::Object(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, HeaderValue};

    fn header_map(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn joins_repeated_headers() {
        let headers = header_map(&[
            ("X-Trace", "a"),
            ("Cookie", "session=1"),
            ("x-trace", "b"),
            ("cookie", "theme=dark"),
            ("accept-language", "en"),
        ]);
        let value = to_cdp_headers(&headers).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "accept-language": "en",
                "cookie": "session=1; theme=dark",
                "x-trace": "a, b",
            })
        );
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["accept-language", "cookie", "x-trace"]);
    }

    #[test]
    fn empty_map_sends_nothing() {
        assert_eq!(to_cdp_headers(&HeaderMap::new()), None);
    }
}
