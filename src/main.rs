use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    bookcrawl::logging::init().context("init logging")?;

    let cli = bookcrawl::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        bookcrawl::cli::Command::Serve(args) => {
            let mut config =
                bookcrawl::config::AppConfig::load(cli.config.as_deref()).context("load config")?;
            if let Some(max_workers) = args.max_workers {
                config.server.max_workers = max_workers;
            }
            if let Some(mode) = args.execution_mode {
                config.server.execution_mode = mode;
            }
            config.validate().context("validate config")?;

            let state = bookcrawl::server::AppState::from_config(&config, cli.config.as_deref())
                .context("build app state")?;
            tracing::info!(
                execution_mode = ?config.server.execution_mode,
                max_workers = config.server.max_workers,
                "starting crawl trigger"
            );
            bookcrawl::server::serve(args.addr, state)
                .await
                .context("serve")?;
        }
        bookcrawl::cli::Command::Crawl(args) => {
            let config =
                bookcrawl::config::AppConfig::load(cli.config.as_deref()).context("load config")?;
            let runner = bookcrawl::app::runner::CrawlRunner::from_config(&config)?;
            let books = runner
                .run(bookcrawl::formats::CrawlRequest {
                    page_num: args.page,
                    num_chapters: args.num_chapters,
                })
                .await
                .context("crawl")?;
            let json = serde_json::to_string_pretty(&books).context("serialize books")?;
            println!("{json}");
        }
        bookcrawl::cli::Command::Worker => {
            let code = bookcrawl::app::worker::run_stdio(cli.config.as_deref()).await;
            std::process::exit(code);
        }
    }

    Ok(())
}
