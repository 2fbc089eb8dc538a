use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::app::dispatcher::ExecutionMode;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// YAML config file. `BOOKCRAWL_*` environment variables override it.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP crawl trigger.
    Serve(ServeArgs),
    /// Crawl one catalog page in this process and print the books as JSON.
    Crawl(CrawlArgs),
    /// Worker process entry: one request on stdin, one report on stdout.
    #[command(hide = true)]
    Worker,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:3000")]
    pub addr: SocketAddr,

    /// Maximum crawls running at once (default: from config).
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// How each crawl is isolated (default: from config).
    #[arg(long, value_enum)]
    pub execution_mode: Option<ExecutionMode>,
}

#[derive(Debug, Args)]
pub struct CrawlArgs {
    /// Catalog page number.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub page: u32,

    /// Chapters to fetch per book.
    #[arg(long, default_value_t = 5)]
    pub num_chapters: usize,
}
