pub mod db;
pub mod error;
pub mod models;
pub mod scraper;
pub mod store;
pub mod targets;

pub use error::{ConfigError, FetchError, StoreError};
pub use models::{JobRecord, ProxyEndpoint, ScrapeSessionRecord, SessionStatus, Target};
pub use scraper::{FetchEngine, Orchestrator, ScrapeResults, ScraperConfig, scrape_all};
pub use store::{JobStore, MemoryStore, PgStore};
