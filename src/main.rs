mod config;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use jobharvest::scraper::ScraperConfig;
use jobharvest::store::{JobStore, MemoryStore, PgStore};
use jobharvest::{FetchEngine, JobRecord, Orchestrator, db, targets};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::{Command, Config, ScrapeArgs, SourceArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_tracing(config.log_json);

    match config.command {
        Command::Scrape(args) => scrape(args).await,
        Command::Validate { sources } => validate(&sources),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("jobharvest=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn scrape(args: ScrapeArgs) -> anyhow::Result<()> {
    let all_targets = targets::load_targets(&args.sources.targets).context("Cannot start")?;
    let selected = targets::select_targets(all_targets, &args.companies).context("Cannot start")?;
    let proxies = match &args.sources.proxies {
        Some(path) => targets::load_proxies(path).context("Cannot start")?,
        None => Vec::new(),
    };
    if proxies.is_empty() {
        tracing::info!("No proxies configured, connecting directly");
    } else {
        tracing::info!("Loaded {} proxy configurations", proxies.len());
    }

    let scraper_config = ScraperConfig {
        concurrency: args.max_concurrent,
        ..ScraperConfig::default()
    };
    let engine = Arc::new(FetchEngine::from_config(&scraper_config, proxies).context("Cannot start")?);
    let store = open_store(&args).await?;
    let orchestrator = Orchestrator::new(engine.clone(), store, &scraper_config);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received, finishing in-flight requests");
            shutdown.cancel();
        }
    });

    tracing::info!("Scraping {} targets...", selected.len());
    let results = orchestrator.scrape_all_with_cancel(&selected, cancel).await;

    for (name, jobs) in &results {
        if jobs.is_empty() {
            tracing::warn!("{name}: 0 jobs");
        } else {
            tracing::info!("{name}: {} jobs", jobs.len());
        }
    }
    let total: usize = results.values().map(Vec::len).sum();
    tracing::info!("Scraping completed. Total jobs found: {total}");
    if let Some(pool) = engine.proxy_pool() {
        tracing::info!(
            active = pool.active_count(),
            failed = ?pool.failed_indices(),
            "Proxy pool status"
        );
    }

    if let Some(path) = &args.output {
        let all_jobs: Vec<&JobRecord> = results.values().flatten().collect();
        let json = serde_json::to_string_pretty(&all_jobs)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Results saved to {}", path.display());
    }

    Ok(())
}

async fn open_store(args: &ScrapeArgs) -> anyhow::Result<Arc<dyn JobStore>> {
    let Some(database_url) = &args.database_url else {
        tracing::warn!("No DATABASE_URL set, results are kept in memory only");
        return Ok(Arc::new(MemoryStore::new()));
    };

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(database_url).await?;
    if args.run_migrations {
        tracing::info!("Running database migrations...");
        db::run_migrations(&pool).await?;
        tracing::info!("Migrations complete");
    }
    Ok(Arc::new(PgStore::new(pool)))
}

fn validate(sources: &SourceArgs) -> anyhow::Result<()> {
    let loaded = targets::load_targets(&sources.targets)
        .with_context(|| format!("Invalid targets file {}", sources.targets.display()))?;
    tracing::info!(
        "{}: {} targets configured",
        sources.targets.display(),
        loaded.len()
    );

    match &sources.proxies {
        Some(path) => {
            let proxies = targets::load_proxies(path)
                .with_context(|| format!("Invalid proxies file {}", path.display()))?;
            // Proxy URLs are only fully checked when the HTTP clients are built.
            FetchEngine::from_config(&ScraperConfig::default(), proxies.clone())?;
            tracing::info!("{}: {} proxies configured", path.display(), proxies.len());
        }
        None => tracing::info!("No proxies file given (optional)"),
    }

    tracing::info!("All configurations are valid");
    Ok(())
}
