use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

/// Directives applied when `RUST_LOG` is unset. The DevTools handler is
/// chatty at `info`, so it only reports warnings by default.
const DEFAULT_DIRECTIVES: &str = "info,chromiumoxide=warn,tungstenite=warn";

/// Logs go to stderr: stdout carries crawl output and worker reports.
pub fn init() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter()?)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}

fn filter() -> anyhow::Result<EnvFilter> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .with_context(|| format!("parse {}: {directives}", EnvFilter::DEFAULT_ENV)),
        _ => EnvFilter::try_new(DEFAULT_DIRECTIVES).context("build default log filter"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_parse() {
        assert!(EnvFilter::try_new(DEFAULT_DIRECTIVES).is_ok());
    }
}
