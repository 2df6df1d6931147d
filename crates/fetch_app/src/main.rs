mod cli;

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use fetch_engine::{
    failed_count, fetch_batch, write_batch_jsonl, write_batch_markdown, CancellationToken,
    FetchConfig, FetchError, Pipeline, TaskResult,
};
use fetch_logging::{fetch_debug, fetch_warn};

use crate::cli::{Cli, OutputFormat};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    fetch_logging::initialize(cli.log_level());

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = cli.fetch_config();
    fetch_debug!(
        "mode={} urls={} concurrency={} meta={}",
        config.mode,
        cli.urls.len(),
        cli.concurrency,
        config.include_meta
    );

    let pipeline = Arc::new(Pipeline::with_defaults().context("failed to set up the fetcher")?);
    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    if let [url] = cli.urls.as_slice() {
        return fetch_single(&pipeline, url, &config, cli.format, &cancel).await;
    }

    let results = fetch_batch(
        pipeline,
        &cli.urls,
        &config,
        cli.concurrency as usize,
        &cancel,
    )
    .await;

    let mut out = io::stdout().lock();
    match cli.format {
        OutputFormat::Markdown => write_batch_markdown(&mut out, &results),
        OutputFormat::Jsonl => write_batch_jsonl(&mut out, &results, config.include_meta),
    }
    .context("write failed")?;
    out.flush().context("write failed")?;

    if failed_count(&results) > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn fetch_single(
    pipeline: &Pipeline,
    url: &str,
    config: &FetchConfig,
    format: OutputFormat,
    cancel: &CancellationToken,
) -> anyhow::Result<ExitCode> {
    let deadline = config.task_deadline();
    let outcome = match tokio::time::timeout(deadline, pipeline.fetch(url, config, cancel)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(FetchError::timed_out(deadline)),
    };

    let mut out = io::stdout().lock();
    match format {
        OutputFormat::Markdown => match outcome {
            Ok(result) => {
                out.write_all(result.markdown.as_bytes())
                    .context("write failed")?;
                out.flush().context("write failed")?;
                Ok(ExitCode::SUCCESS)
            }
            Err(err) => {
                eprintln!("fetch failed: {err}");
                Ok(ExitCode::FAILURE)
            }
        },
        OutputFormat::Jsonl => {
            let results = [TaskResult {
                index: 1,
                input_url: url.to_string(),
                outcome,
            }];
            write_batch_jsonl(&mut out, &results, config.include_meta).context("write failed")?;
            out.flush().context("write failed")?;
            if failed_count(&results) > 0 {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

/// Ctrl-C cancels every in-flight fetch; results gathered so far are still written.
fn cancel_on_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            fetch_warn!("interrupted, cancelling outstanding fetches");
            cancel.cancel();
        }
    });
}
