use std::path::PathBuf;

/// Problems that stop a run before any target is scraped.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {origin}: {source}")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("No targets configured")]
    NoTargets,

    #[error("Duplicate target name: {0}")]
    DuplicateTarget(String),

    #[error("Target #{0} has an empty name")]
    MissingName(usize),

    #[error("Target '{target}': invalid {field} '{value}': {source}")]
    InvalidUrl {
        target: String,
        field: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Target '{target}': career_url has no host")]
    MissingHost { target: String },

    #[error("Target '{target}': invalid {field} selector '{selector}'")]
    InvalidSelector {
        target: String,
        field: &'static str,
        selector: String,
    },

    #[error("Target '{target}': min delay must be a non-negative number of seconds")]
    InvalidDelay { target: String },

    #[error("Unknown target(s): {0}")]
    UnknownTargets(String),

    #[error("Invalid proxy #{index} ({url}): {reason}")]
    InvalidProxy {
        index: usize,
        url: String,
        reason: String,
    },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Outcome of a fetch that never produced a usable page.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("429 Too Many Requests")]
    RateLimited,

    #[error("Request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Gave up after {attempts} attempts (last error: {last})")]
    Exhausted { attempts: u32, last: Box<FetchError> },

    #[error("Cancelled")]
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
