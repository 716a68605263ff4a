use std::time::Duration;

use ::scraper::Selector;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_MIN_DELAY_SECS: f64 = 2.0;

pub const DEFAULT_JOB_CONTAINER: &str = ".job, .position, .opening";
pub const DEFAULT_TITLE: &str = "h1, h2, h3, .title, .job-title";
pub const DEFAULT_LOCATION: &str = ".location, .job-location";
pub const DEFAULT_DESCRIPTION: &str = ".description, .job-description";
pub const DEFAULT_SALARY: &str = ".salary, .compensation";

/// Selector expressions for one target, as they appear in the targets file.
/// Unset fields fall back to the generic `DEFAULT_*` selectors; the
/// employment type, requirements and benefits fields have no fallback and
/// are only extracted when configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectorSet {
    pub job_container: Option<String>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub salary: Option<String>,
    pub employment_type: Option<String>,
    pub requirements: Option<String>,
    pub benefits: Option<String>,
}

/// A target entry as loaded from configuration, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    pub career_url: String,
    pub base_url: String,
    #[serde(default)]
    pub selectors: SelectorSet,
    /// Minimum seconds between requests to this target's domain.
    #[serde(default, alias = "min_delay")]
    pub rate_limit: Option<f64>,
}

/// Compiled selectors, ready to run against a parsed document.
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    pub job_container: Selector,
    pub title: Selector,
    pub location: Selector,
    pub description: Selector,
    pub salary: Selector,
    pub employment_type: Option<Selector>,
    pub requirements: Option<Selector>,
    pub benefits: Option<Selector>,
}

/// A validated, immutable scrape target.
#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub career_url: Url,
    pub base_url: Url,
    pub selectors: CompiledSelectors,
    pub min_delay: Duration,
}

impl Target {
    /// Validate a raw entry. `position` is only used in error messages.
    pub fn from_config(position: usize, config: TargetConfig) -> Result<Target, ConfigError> {
        let name = config.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::MissingName(position));
        }

        let career_url = parse_url(&name, "career_url", &config.career_url)?;
        if career_url.host_str().is_none() {
            return Err(ConfigError::MissingHost { target: name });
        }
        let base_url = parse_url(&name, "base_url", &config.base_url)?;

        let delay = config.rate_limit.unwrap_or(DEFAULT_MIN_DELAY_SECS);
        let min_delay = Duration::try_from_secs_f64(delay)
            .map_err(|_| ConfigError::InvalidDelay { target: name.clone() })?;

        let selectors = compile_selectors(&name, &config.selectors)?;

        Ok(Target {
            name,
            career_url,
            base_url,
            selectors,
            min_delay,
        })
    }

    /// Rate-limit key: host plus explicit port, if any.
    pub fn domain(&self) -> String {
        domain_of(&self.career_url)
    }
}

pub fn domain_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn parse_url(target: &str, field: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|source| ConfigError::InvalidUrl {
        target: target.to_string(),
        field,
        value: value.to_string(),
        source,
    })
}

fn compile_selectors(target: &str, set: &SelectorSet) -> Result<CompiledSelectors, ConfigError> {
    let required = |field: &'static str, value: &Option<String>, fallback: &str| {
        let expr = value
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(fallback);
        compile(target, field, expr)
    };
    let optional = |field: &'static str, value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|expr| compile(target, field, expr))
            .transpose()
    };

    Ok(CompiledSelectors {
        job_container: required("job_container", &set.job_container, DEFAULT_JOB_CONTAINER)?,
        title: required("title", &set.title, DEFAULT_TITLE)?,
        location: required("location", &set.location, DEFAULT_LOCATION)?,
        description: required("description", &set.description, DEFAULT_DESCRIPTION)?,
        salary: required("salary", &set.salary, DEFAULT_SALARY)?,
        employment_type: optional("employment_type", &set.employment_type)?,
        requirements: optional("requirements", &set.requirements)?,
        benefits: optional("benefits", &set.benefits)?,
    })
}

fn compile(target: &str, field: &'static str, expr: &str) -> Result<Selector, ConfigError> {
    Selector::parse(expr).map_err(|_| ConfigError::InvalidSelector {
        target: target.to_string(),
        field,
        selector: expr.to_string(),
    })
}
