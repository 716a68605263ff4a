use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jobharvest::models::{JobRecord, ScrapeSessionRecord, SessionStatus, TargetConfig};
use jobharvest::scraper::{FetchRequest, PageFetcher, RawPage, ScraperConfig};
use jobharvest::store::{JobStore, MemoryStore};
use jobharvest::{FetchError, Orchestrator, StoreError, Target};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
enum Behavior {
    Page(String),
    Fail(FetchError),
    Panic,
}

/// Fake fetcher keyed by URL. Every call sleeps `latency` and tracks how many
/// calls are in flight at once.
struct FakeFetcher {
    pages: HashMap<String, Behavior>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeFetcher {
    fn new(pages: HashMap<String, Behavior>, latency: Duration) -> Self {
        FakeFetcher {
            pages,
            latency,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(
        &self,
        request: &FetchRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<RawPage, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.pages.get(request.url).cloned() {
            Some(Behavior::Page(body)) => Ok(RawPage {
                url: request.url.to_string(),
                status: 200,
                body,
            }),
            Some(Behavior::Fail(e)) => Err(e),
            Some(Behavior::Panic) => panic!("fetcher blew up"),
            None => Err(FetchError::Status(404)),
        }
    }
}

/// Store whose job saves always fail; sessions still go to the inner store.
struct BrokenJobStore {
    inner: MemoryStore,
}

#[async_trait]
impl JobStore for BrokenJobStore {
    async fn save_job(&self, _job: &JobRecord) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn log_session(&self, session: &ScrapeSessionRecord) -> Result<(), StoreError> {
        self.inner.log_session(session).await
    }
}

fn target(name: &str) -> Target {
    Target::from_config(
        0,
        TargetConfig {
            name: name.to_string(),
            career_url: format!("https://{}.test/careers", name.to_lowercase()),
            base_url: format!("https://{}.test", name.to_lowercase()),
            selectors: Default::default(),
            rate_limit: Some(0.0),
        },
    )
    .unwrap()
}

fn listing(titles: &[&str]) -> String {
    titles
        .iter()
        .map(|t| format!(r#"<div class="job"><h3>{t}</h3><span class="location">Remote</span></div>"#))
        .collect()
}

fn config(concurrency: usize) -> ScraperConfig {
    ScraperConfig {
        concurrency,
        ..ScraperConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn every_target_gets_exactly_one_entry() {
    let targets = vec![target("Alpha"), target("Beta"), target("Gamma"), target("Delta")];
    let pages = HashMap::from([
        (
            "https://alpha.test/careers".to_string(),
            Behavior::Page(listing(&["Engineer", "Designer"])),
        ),
        (
            "https://beta.test/careers".to_string(),
            Behavior::Fail(FetchError::Timeout),
        ),
        ("https://gamma.test/careers".to_string(), Behavior::Panic),
        (
            "https://delta.test/careers".to_string(),
            Behavior::Page(listing(&["Welder"])),
        ),
    ]);
    let fetcher = Arc::new(FakeFetcher::new(pages, Duration::from_millis(10)));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::new(fetcher, store.clone(), &config(3));

    let results = orchestrator.scrape_all(&targets).await;

    let names: Vec<_> = results.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["Alpha", "Beta", "Gamma", "Delta"]);
    assert_eq!(results["Alpha"].len(), 2);
    assert!(results["Beta"].is_empty());
    assert!(results["Gamma"].is_empty());
    assert_eq!(results["Delta"][0].title, "Welder");

    assert_eq!(store.jobs().len(), 3);

    let sessions = store.sessions();
    assert_eq!(sessions.len(), 4);
    let status_of = |name: &str| {
        sessions
            .iter()
            .find(|s| s.target_name == name)
            .map(|s| s.status)
            .unwrap()
    };
    assert_eq!(status_of("Alpha"), SessionStatus::Success);
    assert_eq!(status_of("Beta"), SessionStatus::Failed);
    assert_eq!(status_of("Gamma"), SessionStatus::Failed);
    assert_eq!(status_of("Delta"), SessionStatus::Success);

    let beta = sessions.iter().find(|s| s.target_name == "Beta").unwrap();
    assert!(beta.error.as_deref().unwrap().contains("timed out"));
    assert_eq!(beta.jobs_found, 0);
}

#[tokio::test(start_paused = true)]
async fn never_more_than_the_cap_in_flight() {
    let targets: Vec<_> = (0..10).map(|i| target(&format!("Site{i}"))).collect();
    let pages = targets
        .iter()
        .map(|t| (t.career_url.to_string(), Behavior::Page(listing(&["Role"]))))
        .collect();
    let fetcher = Arc::new(FakeFetcher::new(pages, Duration::from_secs(5)));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::new(fetcher.clone(), store, &config(3));

    let results = orchestrator.scrape_all(&targets).await;

    assert_eq!(results.len(), 10);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 10);
    assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn save_failures_do_not_change_results() {
    let targets = vec![target("Alpha")];
    let pages = HashMap::from([(
        "https://alpha.test/careers".to_string(),
        Behavior::Page(listing(&["Engineer", "Analyst"])),
    )]);
    let fetcher = Arc::new(FakeFetcher::new(pages, Duration::ZERO));
    let store = Arc::new(BrokenJobStore {
        inner: MemoryStore::new(),
    });
    let orchestrator = Orchestrator::new(fetcher, store.clone(), &config(3));

    let results = orchestrator.scrape_all(&targets).await;

    assert_eq!(results["Alpha"].len(), 2);
    let sessions = store.inner.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].status, SessionStatus::Success);
    assert_eq!(sessions[0].jobs_found, 2);
}

#[tokio::test(start_paused = true)]
async fn rescraping_is_idempotent() {
    let targets = vec![target("Alpha")];
    let pages = HashMap::from([(
        "https://alpha.test/careers".to_string(),
        Behavior::Page(listing(&["Engineer"])),
    )]);
    let fetcher = Arc::new(FakeFetcher::new(pages, Duration::ZERO));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::new(fetcher, store.clone(), &config(3));

    let first = orchestrator.scrape_all(&targets).await;
    let second = orchestrator.scrape_all(&targets).await;

    assert_eq!(first["Alpha"][0].id, second["Alpha"][0].id);
    assert_eq!(store.jobs().len(), 1);
    assert_eq!(store.sessions().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_queued_targets() {
    let targets: Vec<_> = (0..6).map(|i| target(&format!("Site{i}"))).collect();
    let pages = targets
        .iter()
        .map(|t| (t.career_url.to_string(), Behavior::Page(listing(&["Role"]))))
        .collect();
    let fetcher = Arc::new(FakeFetcher::new(pages, Duration::from_secs(10)));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::new(fetcher.clone(), store.clone(), &config(2));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let results = orchestrator.scrape_all_with_cancel(&targets, cancel).await;

    // The first two were already in flight and finish; the rest never start.
    assert_eq!(results.len(), 6);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    let scraped: usize = results.values().filter(|jobs| !jobs.is_empty()).count();
    assert_eq!(scraped, 2);

    let sessions = store.sessions();
    assert_eq!(sessions.len(), 6);
    let cancelled = sessions
        .iter()
        .filter(|s| s.error.as_deref() == Some("Cancelled before start"))
        .count();
    assert_eq!(cancelled, 4);
}

#[tokio::test]
async fn empty_page_is_a_successful_session_with_no_jobs() {
    let targets = vec![target("Alpha")];
    let pages = HashMap::from([(
        "https://alpha.test/careers".to_string(),
        Behavior::Page("<html><body><p>No openings</p></body></html>".to_string()),
    )]);
    let fetcher = Arc::new(FakeFetcher::new(pages, Duration::ZERO));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::new(fetcher, store.clone(), &config(3));

    let results = orchestrator.scrape_all(&targets).await;

    assert!(results["Alpha"].is_empty());
    let sessions = store.sessions();
    assert_eq!(sessions[0].status, SessionStatus::Success);
    assert_eq!(sessions[0].jobs_found, 0);
}
