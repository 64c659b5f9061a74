use super::types::*;
use crate::config::{env_reference, expand_env_vars};
use reqwest::Url;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Longest accepted timer or retry setting
const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest accepted look-back window for loading older entries
const MAX_FALLBACK_WINDOW: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })
}

/// Parse and validate a YAML config document.
///
/// `$env{VAR}` references are expanded before parsing.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    // An empty document means "all defaults"
    let config: Config = if yaml_string.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml::from_str(&yaml_string)?
    };

    validate_config(&config)?;
    Ok(config)
}

/// Reject `$env{NAME}` references that survived expansion
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let Some(pattern) = env_reference() else {
        return Ok(());
    };
    let missing: BTreeSet<&str> = pattern
        .captures_iter(yaml_string)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str()))
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    let names: Vec<&str> = missing.into_iter().collect();
    Err(ConfigError::Validation(format!(
        "environment variable(s) not set: {}. Export them or replace the \
         $env{{...}} references with literal values",
        names.join(", ")
    )))
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    match Url::parse(&config.server.base_url) {
        Ok(url) if url.scheme() != "http" && url.scheme() != "https" => {
            errors.push(format!(
                "server.base_url: unsupported scheme '{}' (expected http or https)",
                url.scheme()
            ));
        }
        Ok(url) if url.cannot_be_a_base() => {
            errors.push(format!("server.base_url: '{}' cannot be used as a base URL", url));
        }
        Ok(_) => {}
        Err(e) => {
            errors.push(format!("server.base_url: invalid URL '{}': {}", config.server.base_url, e));
        }
    }

    let intervals = [
        ("server.timeout", Some(config.server.timeout)),
        ("server.retry_interval", Some(config.server.retry_interval)),
        ("server.idle_timeout", config.server.idle_timeout),
        ("viewer.debounce", Some(config.viewer.debounce)),
        ("viewer.max_wait", Some(config.viewer.max_wait)),
    ];
    for (field, value) in intervals {
        if let Some(value) = value.filter(|v| *v > MAX_INTERVAL) {
            errors.push(format!("{} ({:?}) must not exceed {:?}", field, value, MAX_INTERVAL));
        }
    }

    if config.viewer.max_logs == 0 {
        errors.push("viewer.max_logs must be greater than 0".to_string());
    }

    if config.viewer.debounce > config.viewer.max_wait {
        errors.push(format!(
            "viewer.debounce ({:?}) must not exceed viewer.max_wait ({:?})",
            config.viewer.debounce, config.viewer.max_wait
        ));
    }

    if config.backfill.sample_size == 0 {
        errors.push("backfill.sample_size must be greater than 0".to_string());
    }

    if config.backfill.fallback_window.is_zero() {
        errors.push("backfill.fallback_window must be greater than 0".to_string());
    } else if config.backfill.fallback_window > MAX_FALLBACK_WINDOW {
        errors.push(format!(
            "backfill.fallback_window ({:?}) must not exceed {:?}",
            config.backfill.fallback_window, MAX_FALLBACK_WINDOW
        ));
    }

    if !config.stream.stdout && !config.stream.stderr {
        errors.push("stream: at least one of stdout or stderr must be enabled".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}
