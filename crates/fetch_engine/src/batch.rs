use std::sync::Arc;

use fetch_logging::{fetch_info, fetch_warn};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::FetchConfig;
use crate::pipeline::PageFetch;
use crate::{FailureKind, FetchError, FetchResult};

/// Outcome for one input URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    /// 1-based position in the input list.
    pub index: usize,
    pub input_url: String,
    pub outcome: Result<FetchResult, FetchError>,
}

impl TaskResult {
    pub fn is_failure(&self) -> bool {
        self.outcome.is_err()
    }
}

/// Fetches every URL with at most `concurrency` in flight. Results come back
/// in input order no matter which task finishes first, and a failed task
/// never affects its siblings.
pub async fn fetch_batch(
    fetcher: Arc<dyn PageFetch>,
    urls: &[String],
    config: &FetchConfig,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Vec<TaskResult> {
    let config = Arc::new(config.clone().normalized());
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let deadline = config.task_deadline();

    let handles: Vec<_> = urls
        .iter()
        .map(|url| {
            let fetcher = Arc::clone(&fetcher);
            let config = Arc::clone(&config);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.child_token();
            let url = url.clone();
            tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Err(FetchError::cancelled()),
                };
                match tokio::time::timeout(deadline, fetcher.fetch_page(&url, &config, &cancel))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        cancel.cancel();
                        Err(FetchError::timed_out(deadline))
                    }
                }
            })
        })
        .collect();

    let mut results = Vec::with_capacity(urls.len());
    for (i, (url, handle)) in urls.iter().zip(handles).enumerate() {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(join_err) => Err(FetchError::new(
                FailureKind::Network,
                format!("task aborted: {join_err}"),
            )),
        };
        if let Err(err) = &outcome {
            fetch_warn!("task[{}] {} failed: {}", i + 1, url, err);
        }
        results.push(TaskResult {
            index: i + 1,
            input_url: url.clone(),
            outcome,
        });
    }

    let failed = failed_count(&results);
    fetch_info!(
        "batch finished: count={} succeeded={} failed={}",
        results.len(),
        results.len() - failed,
        failed
    );
    results
}

pub fn failed_count(results: &[TaskResult]) -> usize {
    results.iter().filter(|result| result.is_failure()).count()
}
