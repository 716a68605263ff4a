use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::ConfigError;
use crate::models::{JobRecord, ProxyEndpoint, ScrapeSessionRecord, Target};
use crate::scraper::ScraperConfig;
use crate::scraper::extract::Extractor;
use crate::scraper::fetch::{FetchEngine, FetchRequest, PageFetcher};
use crate::store::JobStore;

/// Jobs per target name, in configured target order.
pub type ScrapeResults = IndexMap<String, Vec<JobRecord>>;

/// Runs fetch → extract → persist for every target under a global
/// concurrency cap. A failing target yields an empty list and a failed
/// session record; it never affects the other targets.
#[derive(Clone)]
pub struct Orchestrator {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn JobStore>,
    extractor: Extractor,
    concurrency: usize,
}

impl Orchestrator {
    pub fn new(fetcher: Arc<dyn PageFetcher>, store: Arc<dyn JobStore>, config: &ScraperConfig) -> Self {
        Orchestrator {
            fetcher,
            store,
            extractor: Extractor::new(config.description_limit),
            concurrency: config.concurrency.max(1),
        }
    }

    pub async fn scrape_all(&self, targets: &[Target]) -> ScrapeResults {
        self.scrape_all_with_cancel(targets, CancellationToken::new())
            .await
    }

    /// Like `scrape_all`, but stops issuing new requests once `cancel` fires.
    /// Targets that never got to run are reported as failed sessions.
    pub async fn scrape_all_with_cancel(
        &self,
        targets: &[Target],
        cancel: CancellationToken,
    ) -> ScrapeResults {
        let batch_started = Utc::now();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        tracing::info!(
            targets = targets.len(),
            concurrency = self.concurrency,
            "Starting scrape batch"
        );

        let handles = targets.iter().cloned().map(|target| {
            let this = self.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                match permit {
                    Some(_permit) => this.scrape_target(&target, &cancel).await,
                    None => {
                        let session = ScrapeSessionRecord::failed(
                            &target.name,
                            target.career_url.as_str(),
                            "Cancelled before start".to_string(),
                            Utc::now(),
                        );
                        this.log_session(&session).await;
                        Vec::new()
                    }
                }
            })
        });
        let outcomes = futures::future::join_all(handles).await;

        let mut results = ScrapeResults::with_capacity(targets.len());
        for (target, outcome) in targets.iter().zip(outcomes) {
            let jobs = match outcome {
                Ok(jobs) => jobs,
                Err(e) => {
                    tracing::error!(target_name = %target.name, "Scrape task aborted: {e}");
                    self.log_task_fault(target, &e.to_string(), batch_started).await;
                    Vec::new()
                }
            };
            results.insert(target.name.clone(), jobs);
        }

        let total: usize = results.values().map(Vec::len).sum();
        tracing::info!(targets = results.len(), total, "Scrape batch completed");
        results
    }

    async fn scrape_target(&self, target: &Target, cancel: &CancellationToken) -> Vec<JobRecord> {
        let started_at = Utc::now();
        let url = target.career_url.as_str();
        let domain = target.domain();
        tracing::info!(target_name = %target.name, url, "Starting scrape");

        let request = FetchRequest {
            url,
            domain: &domain,
            min_delay: target.min_delay,
        };
        let page = match self.fetcher.fetch(&request, cancel).await {
            Ok(page) => page,
            Err(e) => {
                let error = format!("Failed to fetch career page: {e}");
                tracing::error!(target_name = %target.name, "{error}");
                let session = ScrapeSessionRecord::failed(&target.name, url, error, started_at);
                self.log_session(&session).await;
                return Vec::new();
            }
        };

        let jobs = self.extractor.extract(&page.body, target);
        let saved = self.persist(&jobs).await;

        let session = ScrapeSessionRecord::succeeded(&target.name, url, jobs.len(), started_at);
        self.log_session(&session).await;
        tracing::info!(
            target_name = %target.name,
            found = jobs.len(),
            saved,
            duration_secs = session.duration_seconds,
            "Scrape finished"
        );
        jobs
    }

    /// Save every job, returning how many saves succeeded.
    async fn persist(&self, jobs: &[JobRecord]) -> usize {
        let mut saved = 0;
        for job in jobs {
            match self.store.save_job(job).await {
                Ok(()) => saved += 1,
                Err(e) => tracing::warn!(job_id = %job.id, "Failed to save job: {e}"),
            }
        }
        saved
    }

    async fn log_session(&self, session: &ScrapeSessionRecord) {
        if let Err(e) = self.store.log_session(session).await {
            tracing::error!(target_name = %session.target_name, "Failed to log scrape session: {e}");
        }
    }

    async fn log_task_fault(&self, target: &Target, error: &str, started_at: DateTime<Utc>) {
        let session = ScrapeSessionRecord::failed(
            &target.name,
            target.career_url.as_str(),
            format!("Scrape task aborted: {error}"),
            started_at,
        );
        self.log_session(&session).await;
    }
}

/// One-shot entry point for schedulers and tooling: build a reqwest-backed
/// engine over `proxies` and scrape every target. Only configuration problems
/// are errors; per-target failures show up as empty results.
pub async fn scrape_all(
    targets: &[Target],
    proxies: Vec<ProxyEndpoint>,
    store: Arc<dyn JobStore>,
    config: &ScraperConfig,
) -> Result<ScrapeResults, ConfigError> {
    if targets.is_empty() {
        return Err(ConfigError::NoTargets);
    }
    let engine = FetchEngine::from_config(config, proxies)?;
    let orchestrator = Orchestrator::new(Arc::new(engine), store, config);
    Ok(orchestrator.scrape_all(targets).await)
}
