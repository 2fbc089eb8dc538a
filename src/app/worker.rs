//! Worker side of the process boundary.
//!
//! A worker reads exactly one JSON [`CrawlRequest`] line from its input,
//! runs the crawl and writes exactly one JSON [`WorkerReport`] line to its
//! output. The caller exits the process right after.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, AsyncWrite, AsyncWriteExt as _};

use crate::app::runner::CrawlRunner;
use crate::config::AppConfig;
use crate::formats::{CrawlRequest, WorkerReport};

pub async fn serve_once<R, W>(
    runner: &Arc<CrawlRunner>,
    input: R,
    output: W,
) -> anyhow::Result<WorkerReport>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let report = match read_request(input).await {
        Ok(request) => {
            tracing::info!(
                page = request.page_num,
                num_chapters = request.num_chapters,
                "worker received request"
            );
            runner.report_isolated(request).await
        }
        Err(err) => WorkerReport::Error {
            error: format!("{err:#}"),
        },
    };

    write_report(output, &report).await?;
    Ok(report)
}

/// Worker entry over stdin/stdout. Always attempts to emit a report, even when
/// the configuration cannot be loaded. Returns the process exit code.
pub async fn run_stdio(config_path: Option<&Path>) -> i32 {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    let runner = AppConfig::load(config_path)
        .and_then(|config| CrawlRunner::from_config(&config))
        .map(Arc::new);

    let result = match runner {
        Ok(runner) => serve_once(&runner, stdin, stdout).await,
        Err(err) => {
            let report = WorkerReport::Error {
                error: format!("{err:#}"),
            };
            write_report(stdout, &report).await.map(|()| report)
        }
    };

    match result {
        Ok(report) => {
            tracing::info!(?report, "worker finished");
            0
        }
        Err(err) => {
            tracing::error!(?err, "worker could not deliver its report");
            1
        }
    }
}

async fn read_request<R>(mut input: R) -> anyhow::Result<CrawlRequest>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .await
        .context("read crawl request")?;
    if read == 0 {
        anyhow::bail!("no crawl request received");
    }
    let request: CrawlRequest =
        serde_json::from_str(line.trim()).context("parse crawl request")?;
    request.validate()?;
    Ok(request)
}

async fn write_report<W>(mut output: W, report: &WorkerReport) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(report).context("serialize worker report")?;
    line.push(b'\n');
    output
        .write_all(&line)
        .await
        .context("write worker report")?;
    output.flush().await.context("flush worker report")?;
    Ok(())
}
