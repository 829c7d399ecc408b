// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Configuration
//!
//! The resolved settings record the pipeline runs with. Resolution order
//! is fixed: built-in defaults, then `PIPELINE_*` environment variables,
//! then CLI flags; CLI wins over environment, environment wins over
//! defaults.
//!
//! Every value is validated once, at construction time, so the rest of
//! the system never re-checks ranges. Validation failures are terminal
//! before any stage runs.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Environment variable prefix shared by every setting.
pub const ENV_PREFIX: &str = "PIPELINE_";

/// Configuration errors raised during settings resolution.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid environment variable {name}: {message}")]
    InvalidEnv { name: String, message: String },
}

/// The canonical pipeline steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepName {
    Load,
    Deduplicate,
    Pii,
    Summarize,
    Embed,
    Cluster,
    Index,
}

impl StepName {
    /// All steps in canonical execution order.
    pub fn all() -> Vec<StepName> {
        vec![
            StepName::Load,
            StepName::Deduplicate,
            StepName::Pii,
            StepName::Summarize,
            StepName::Embed,
            StepName::Cluster,
            StepName::Index,
        ]
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepName::Load => "Load",
            StepName::Deduplicate => "Deduplicate",
            StepName::Pii => "PII",
            StepName::Summarize => "Summarize",
            StepName::Embed => "Embed",
            StepName::Cluster => "Cluster",
            StepName::Index => "Index",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for StepName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "load" => Ok(StepName::Load),
            "deduplicate" => Ok(StepName::Deduplicate),
            "pii" => Ok(StepName::Pii),
            "summarize" => Ok(StepName::Summarize),
            "embed" => Ok(StepName::Embed),
            "cluster" => Ok(StepName::Cluster),
            "index" => Ok(StepName::Index),
            other => Err(ConfigError::Invalid(format!(
                "Unknown step '{}'; expected one of Load,Deduplicate,PII,Summarize,Embed,Cluster,Index",
                other
            ))),
        }
    }
}

/// Parses a comma-separated step list, preserving canonical order and
/// dropping duplicates.
pub fn parse_steps(list: &str) -> Result<Vec<StepName>, ConfigError> {
    let mut requested = Vec::new();
    for part in list.split(',') {
        if part.trim().is_empty() {
            continue;
        }
        let step: StepName = part.parse()?;
        if !requested.contains(&step) {
            requested.push(step);
        }
    }
    if requested.is_empty() {
        return Err(ConfigError::Invalid("Step list is empty".to_string()));
    }
    let mut ordered = StepName::all();
    ordered.retain(|s| requested.contains(s));
    Ok(ordered)
}

/// Resolved pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Directory containing the exported document collection
    pub export_dir: PathBuf,
    /// Steps to run, in canonical order
    pub steps: Vec<StepName>,
    /// Vector index endpoint
    pub index_url: String,
    /// Log output directory
    pub log_dir: PathBuf,
    /// Documents per batch
    pub batch_size: usize,
    /// Cache backend host
    pub cache_host: String,
    /// Cache backend port
    pub cache_port: u16,
    /// Default cache TTL in seconds
    pub cache_ttl_secs: u64,
    /// Summary length cap (words)
    pub summary_max_length: usize,
    /// Summary length floor (words)
    pub summary_min_length: usize,
    /// Cluster count hint
    pub cluster_count: usize,
    /// Lower bound for the elbow search
    pub min_cluster_size: usize,
    /// Embedding model endpoint (environment-only)
    pub embedding_url: Option<String>,
    /// Summarization model endpoint (environment-only)
    pub summarizer_url: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            export_dir: PathBuf::new(),
            steps: StepName::all(),
            index_url: "http://localhost:8080".to_string(),
            log_dir: PathBuf::from("logs"),
            batch_size: 100,
            cache_host: "localhost".to_string(),
            cache_port: 6379,
            cache_ttl_secs: 86_400,
            summary_max_length: 150,
            summary_min_length: 50,
            cluster_count: 5,
            min_cluster_size: 3,
            embedding_url: None,
            summarizer_url: None,
        }
    }
}

impl PipelineSettings {
    /// Applies `PIPELINE_*` environment overrides through an injectable
    /// lookup, so tests never mutate the real process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse_env<T: FromStr>(name: &str, raw: &str) -> Result<T, ConfigError>
        where
            T::Err: fmt::Display,
        {
            raw.parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
                name: name.to_string(),
                message: e.to_string(),
            })
        }

        let var = |suffix: &str| lookup(&format!("{}{}", ENV_PREFIX, suffix));

        if let Some(raw) = var("STEPS") {
            self.steps = parse_steps(&raw)?;
        }
        if let Some(raw) = var("INDEX_URL") {
            self.index_url = raw;
        }
        if let Some(raw) = var("LOG_DIR") {
            self.log_dir = PathBuf::from(raw);
        }
        if let Some(raw) = var("BATCH_SIZE") {
            self.batch_size = parse_env("PIPELINE_BATCH_SIZE", &raw)?;
        }
        if let Some(raw) = var("CACHE_HOST") {
            self.cache_host = raw;
        }
        if let Some(raw) = var("CACHE_PORT") {
            self.cache_port = parse_env("PIPELINE_CACHE_PORT", &raw)?;
        }
        if let Some(raw) = var("CACHE_TTL") {
            self.cache_ttl_secs = parse_env("PIPELINE_CACHE_TTL", &raw)?;
        }
        if let Some(raw) = var("NO_PII") {
            if raw != "0" && !raw.eq_ignore_ascii_case("false") {
                self.steps.retain(|s| *s != StepName::Pii);
            }
        }
        if let Some(raw) = var("NO_DEDUP") {
            if raw != "0" && !raw.eq_ignore_ascii_case("false") {
                self.steps.retain(|s| *s != StepName::Deduplicate);
            }
        }
        if let Some(raw) = var("SUMMARY_MAX_LENGTH") {
            self.summary_max_length = parse_env("PIPELINE_SUMMARY_MAX_LENGTH", &raw)?;
        }
        if let Some(raw) = var("SUMMARY_MIN_LENGTH") {
            self.summary_min_length = parse_env("PIPELINE_SUMMARY_MIN_LENGTH", &raw)?;
        }
        if let Some(raw) = var("CLUSTER_COUNT") {
            self.cluster_count = parse_env("PIPELINE_CLUSTER_COUNT", &raw)?;
        }
        if let Some(raw) = var("MIN_CLUSTER_SIZE") {
            self.min_cluster_size = parse_env("PIPELINE_MIN_CLUSTER_SIZE", &raw)?;
        }
        if let Some(raw) = var("EMBEDDING_URL") {
            self.embedding_url = Some(raw);
        }
        if let Some(raw) = var("SUMMARIZER_URL") {
            self.summarizer_url = Some(raw);
        }
        Ok(())
    }

    /// Validates every resolved value. Called once after resolution;
    /// failures are terminal before any stage runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.export_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("export_dir is required".to_string()));
        }
        if !self.export_dir.is_dir() {
            return Err(ConfigError::Invalid(format!(
                "Export directory does not exist or is not a directory: {}",
                self.export_dir.display()
            )));
        }
        validate_service_url(&self.index_url)?;
        if let Some(url) = &self.embedding_url {
            validate_service_url(url)?;
        }
        if let Some(url) = &self.summarizer_url {
            validate_service_url(url)?;
        }
        if self.batch_size < 1 {
            return Err(ConfigError::Invalid("batch_size must be >= 1".to_string()));
        }
        if self.cache_ttl_secs < 1 {
            return Err(ConfigError::Invalid("cache_ttl must be >= 1".to_string()));
        }
        if self.steps.is_empty() {
            return Err(ConfigError::Invalid("At least one step must be enabled".to_string()));
        }
        if self.summary_min_length >= self.summary_max_length {
            return Err(ConfigError::Invalid(format!(
                "summary_min_length ({}) must be below summary_max_length ({})",
                self.summary_min_length, self.summary_max_length
            )));
        }
        if self.cluster_count < 1 {
            return Err(ConfigError::Invalid("cluster_count must be >= 1".to_string()));
        }
        if self.min_cluster_size < 1 {
            return Err(ConfigError::Invalid("min_cluster_size must be >= 1".to_string()));
        }
        Ok(())
    }
}

/// Validates a service URL against the accepted shape:
/// scheme in {http, https}, non-empty host without spaces, optional port
/// in range, and a path that never contains `//`.
pub fn validate_service_url(url: &str) -> Result<(), ConfigError> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .ok_or_else(|| {
            ConfigError::Invalid(format!("URL '{}' must use http or https scheme", url))
        })?;

    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, ""),
    };

    let host = match authority.rfind(':') {
        Some(i) => {
            let port = &authority[i + 1..];
            port.parse::<u16>().map_err(|_| {
                ConfigError::Invalid(format!("URL '{}' has an invalid port '{}'", url, port))
            })?;
            &authority[..i]
        }
        None => authority,
    };

    if host.is_empty() {
        return Err(ConfigError::Invalid(format!("URL '{}' has an empty host", url)));
    }
    if host.contains(' ') {
        return Err(ConfigError::Invalid(format!(
            "URL '{}' has spaces in the host",
            url
        )));
    }
    if path.contains("//") {
        return Err(ConfigError::Invalid(format!(
            "URL '{}' has an invalid path (double slash)",
            url
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_match_contract() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.index_url, "http://localhost:8080");
        assert_eq!(settings.batch_size, 100);
        assert_eq!(settings.cache_port, 6379);
        assert_eq!(settings.cache_ttl_secs, 86_400);
        assert_eq!(settings.summary_max_length, 150);
        assert_eq!(settings.summary_min_length, 50);
        assert_eq!(settings.cluster_count, 5);
        assert_eq!(settings.min_cluster_size, 3);
        assert_eq!(settings.steps, StepName::all());
    }

    #[test]
    fn test_env_overrides_defaults() {
        let mut settings = PipelineSettings::default();
        settings
            .apply_env(env(&[
                ("PIPELINE_INDEX_URL", "https://index.internal:9090"),
                ("PIPELINE_BATCH_SIZE", "25"),
                ("PIPELINE_CACHE_HOST", "cache.internal"),
                ("PIPELINE_NO_PII", "1"),
            ]))
            .unwrap();
        assert_eq!(settings.index_url, "https://index.internal:9090");
        assert_eq!(settings.batch_size, 25);
        assert_eq!(settings.cache_host, "cache.internal");
        assert!(!settings.steps.contains(&StepName::Pii));
    }

    #[test]
    fn test_bad_env_value_is_an_error() {
        let mut settings = PipelineSettings::default();
        let result = settings.apply_env(env(&[("PIPELINE_BATCH_SIZE", "many")]));
        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
    }

    #[test]
    fn test_parse_steps_orders_and_dedupes() {
        let steps = parse_steps("Index,load,Embed,load").unwrap();
        assert_eq!(steps, vec![StepName::Load, StepName::Embed, StepName::Index]);
    }

    #[test]
    fn test_parse_steps_rejects_unknown() {
        assert!(parse_steps("Load,Transmogrify").is_err());
        assert!(parse_steps("").is_err());
    }

    #[test]
    fn test_url_validation_accepts_good_urls() {
        for url in [
            "http://localhost:8080",
            "https://index.example.com",
            "http://10.0.0.2:8080/v1/index",
        ] {
            assert!(validate_service_url(url).is_ok(), "rejected: {}", url);
        }
    }

    #[test]
    fn test_url_validation_rejects_bad_urls() {
        for url in [
            "ftp://example.com",
            "http://",
            "http://bad host:8080",
            "http://example.com/a//b",
            "http://example.com:notaport",
            "example.com",
        ] {
            assert!(validate_service_url(url).is_err(), "accepted: {}", url);
        }
    }

    #[test]
    fn test_validate_rejects_min_above_max_summary() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PipelineSettings {
            export_dir: dir.path().to_path_buf(),
            summary_min_length: 200,
            summary_max_length: 150,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_resolved_settings() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PipelineSettings {
            export_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        settings.validate().unwrap();
    }

    #[test]
    fn test_validate_requires_existing_export_dir() {
        let settings = PipelineSettings {
            export_dir: PathBuf::from("/definitely/not/here"),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
