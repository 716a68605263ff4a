pub mod job;
pub mod proxy;
pub mod scrape_session;
pub mod target;

pub use job::{JobRecord, job_id};
pub use proxy::ProxyEndpoint;
pub use scrape_session::{ScrapeSessionRecord, SessionStatus};
pub use target::{SelectorSet, Target, TargetConfig};
