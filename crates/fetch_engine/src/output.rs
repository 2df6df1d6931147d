use std::io::Write;

use serde::Serialize;

use crate::batch::{failed_count, TaskResult};
use crate::frontmatter::strip_injectable_front_matter;
use crate::meta::PageMeta;

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Markdown documents wrapped in HTML comment markers, in input order.
pub fn write_batch_markdown<W: Write>(w: &mut W, results: &[TaskResult]) -> Result<(), OutputError> {
    let total = results.len();
    let failed = failed_count(results);
    writeln!(
        w,
        "<!-- count: {}, succeeded: {}, failed: {} -->",
        total,
        total - failed,
        failed
    )?;

    for (i, result) in results.iter().enumerate() {
        if i > 0 {
            writeln!(w)?;
        }

        let url = sanitize_for_comment(&result.input_url);
        match &result.outcome {
            Err(err) => {
                writeln!(w, "<!-- task[{}](failed): {} -->", result.index, url)?;
                writeln!(
                    w,
                    "<!-- error[{}]: {} -->",
                    result.index,
                    sanitize_for_comment(&err.to_string())
                )?;
            }
            Ok(fetched) => {
                writeln!(w, "<!-- task[{}]: {} -->", result.index, url)?;
                w.write_all(fetched.markdown.as_bytes())?;
                if !fetched.markdown.ends_with('\n') {
                    writeln!(w)?;
                }
                writeln!(w, "<!-- /task[{}] -->", result.index)?;
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct SuccessRow<'a> {
    seq: usize,
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved_url: Option<&'a str>,
    resolved_mode: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<PageMeta>,
}

#[derive(Serialize)]
struct ErrorRow<'a> {
    seq: usize,
    url: &'a str,
    error: String,
}

/// One JSON object per line. With `include_meta`, injectable front matter is
/// lifted out of `content` into a `meta` object.
pub fn write_batch_jsonl<W: Write>(
    w: &mut W,
    results: &[TaskResult],
    include_meta: bool,
) -> Result<(), OutputError> {
    for result in results {
        match &result.outcome {
            Err(err) => {
                let row = ErrorRow {
                    seq: result.index,
                    url: &result.input_url,
                    error: err.to_string().trim().to_string(),
                };
                serde_json::to_writer(&mut *w, &row)?;
            }
            Ok(fetched) => {
                let stripped = if include_meta {
                    strip_injectable_front_matter(&fetched.markdown)
                } else {
                    None
                };
                let (content, meta) = match &stripped {
                    Some((body, meta)) => {
                        (body.as_str(), Some(meta.clone()).filter(|m| !m.is_empty()))
                    }
                    None => (fetched.markdown.as_str(), None),
                };
                let final_url = fetched.final_url.trim();
                let resolved_url = (!final_url.is_empty() && fetched.final_url != result.input_url)
                    .then_some(fetched.final_url.as_str());

                let row = SuccessRow {
                    seq: result.index,
                    url: &result.input_url,
                    resolved_url,
                    resolved_mode: fetched.source.resolved_mode(),
                    content,
                    meta,
                };
                serde_json::to_writer(&mut *w, &row)?;
            }
        }
        writeln!(w)?;
    }
    Ok(())
}

/// Keeps a value from closing or breaking out of an HTML comment.
pub fn sanitize_for_comment(value: &str) -> String {
    value
        .replace(['\r', '\n'], " ")
        .replace("-->", "-- >")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_comment_breakers() {
        assert_eq!(
            sanitize_for_comment(" https://x.test/a-->b\r\nc "),
            "https://x.test/a-- >b  c"
        );
    }
}
