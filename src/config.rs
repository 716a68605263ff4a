use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "jobharvest", about = "Career-page job scraping engine")]
pub struct Config {
    /// Emit logs as JSON lines instead of human-readable text
    #[arg(long, env = "LOG_JSON", global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Scrape the configured targets once
    Scrape(ScrapeArgs),
    /// Validate the target and proxy files without scraping
    Validate {
        #[command(flatten)]
        sources: SourceArgs,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct SourceArgs {
    /// JSON file listing the targets to scrape
    #[arg(long, env = "JOBHARVEST_TARGETS", default_value = "companies.json")]
    pub targets: PathBuf,

    /// Optional JSON file listing outbound proxies
    #[arg(long, env = "JOBHARVEST_PROXIES")]
    pub proxies: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ScrapeArgs {
    #[command(flatten)]
    pub sources: SourceArgs,

    /// Only scrape these targets (by name)
    #[arg(long, num_args = 1..)]
    pub companies: Vec<String>,

    /// Maximum number of targets scraped at the same time
    #[arg(long, env = "MAX_CONCURRENT", default_value_t = 3)]
    pub max_concurrent: usize,

    /// Write all scraped jobs to this file as JSON
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Database connection URL. Without one, results are kept in memory only.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Run database migrations on startup
    #[arg(long, env = "RUN_MIGRATIONS", default_value = "true")]
    pub run_migrations: bool,
}
