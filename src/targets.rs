use std::collections::HashSet;
use std::path::Path;

use crate::error::ConfigError;
use crate::models::{ProxyEndpoint, Target, TargetConfig};

/// Load and validate the targets file: a JSON array of target entries.
pub fn load_targets(path: &Path) -> Result<Vec<Target>, ConfigError> {
    let raw = read(path)?;
    parse_targets(&raw, &path.display().to_string())
}

pub fn parse_targets(json: &str, origin: &str) -> Result<Vec<Target>, ConfigError> {
    let configs: Vec<TargetConfig> = serde_json::from_str(json).map_err(|source| ConfigError::Json {
        origin: origin.to_string(),
        source,
    })?;
    if configs.is_empty() {
        return Err(ConfigError::NoTargets);
    }

    let mut seen = HashSet::new();
    let mut targets = Vec::with_capacity(configs.len());
    for (position, config) in configs.into_iter().enumerate() {
        let target = Target::from_config(position, config)?;
        if !seen.insert(target.name.clone()) {
            return Err(ConfigError::DuplicateTarget(target.name));
        }
        targets.push(target);
    }
    Ok(targets)
}

/// Load the proxies file: a JSON array of proxy entries. May be empty.
pub fn load_proxies(path: &Path) -> Result<Vec<ProxyEndpoint>, ConfigError> {
    let raw = read(path)?;
    parse_proxies(&raw, &path.display().to_string())
}

pub fn parse_proxies(json: &str, origin: &str) -> Result<Vec<ProxyEndpoint>, ConfigError> {
    let proxies: Vec<ProxyEndpoint> = serde_json::from_str(json).map_err(|source| ConfigError::Json {
        origin: origin.to_string(),
        source,
    })?;

    for (index, proxy) in proxies.iter().enumerate() {
        let reason = if proxy.host.trim().is_empty() {
            Some("empty host")
        } else if proxy.port == 0 {
            Some("port must be non-zero")
        } else if proxy.protocol.trim().is_empty() {
            Some("empty protocol")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(ConfigError::InvalidProxy {
                index,
                url: proxy.redacted(),
                reason: reason.to_string(),
            });
        }
    }
    Ok(proxies)
}

/// Keep only the named targets, preserving configured order.
pub fn select_targets(targets: Vec<Target>, names: &[String]) -> Result<Vec<Target>, ConfigError> {
    if names.is_empty() {
        return Ok(targets);
    }

    let known: HashSet<&str> = targets.iter().map(|t| t.name.as_str()).collect();
    let unknown: Vec<&str> = names
        .iter()
        .map(String::as_str)
        .filter(|n| !known.contains(n))
        .collect();
    if !unknown.is_empty() {
        return Err(ConfigError::UnknownTargets(unknown.join(", ")));
    }

    Ok(targets
        .into_iter()
        .filter(|t| names.contains(&t.name))
        .collect())
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}
