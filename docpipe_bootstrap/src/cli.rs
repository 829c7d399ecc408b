// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface
//!
//! The single pipeline entry point: a required `export_dir` positional
//! argument plus flags for every tunable. Flags override environment
//! variables (`PIPELINE_*`), which override defaults.
//!
//! ```bash
//! docpipe ./export --steps Load,Embed,Index --batch-size 50
//! docpipe ./export --no-pii --index-url http://index.internal:8080
//! ```
//!
//! Parsing is clap's job; range and shape validation happens once in
//! [`crate::config::PipelineSettings::validate`] after resolution, and a
//! failure there exits 1 before any stage runs.

use clap::Parser;
use std::path::PathBuf;

use crate::config::{parse_steps, ConfigError, PipelineSettings, StepName};

/// Process an exported document collection and build a search index.
#[derive(Parser, Debug, Clone)]
#[command(name = "docpipe", version, about)]
pub struct CliArgs {
    /// Directory containing the exported document collection
    pub export_dir: PathBuf,

    /// Comma-separated subset of {Load,Deduplicate,PII,Summarize,Embed,Cluster,Index}
    #[arg(long)]
    pub steps: Option<String>,

    /// Vector index endpoint (http/https)
    #[arg(long)]
    pub index_url: Option<String>,

    /// Log output directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Documents per batch (>= 1)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Cache backend host
    #[arg(long)]
    pub cache_host: Option<String>,

    /// Cache backend port
    #[arg(long)]
    pub cache_port: Option<u16>,

    /// Default cache TTL in seconds (>= 1)
    #[arg(long)]
    pub cache_ttl: Option<u64>,

    /// Disable the PII detection stage
    #[arg(long)]
    pub no_pii: bool,

    /// Disable the deduplication stage
    #[arg(long)]
    pub no_dedup: bool,

    /// Summary length cap in words
    #[arg(long)]
    pub summary_max_length: Option<usize>,

    /// Summary length floor in words
    #[arg(long)]
    pub summary_min_length: Option<usize>,

    /// Cluster count hint (>= 1)
    #[arg(long)]
    pub cluster_count: Option<usize>,

    /// Lower bound for the elbow search (>= 1)
    #[arg(long)]
    pub min_cluster_size: Option<usize>,
}

impl CliArgs {
    /// Resolves settings with the fixed precedence: defaults, then
    /// environment, then these flags. The result is validated before it
    /// is returned.
    pub fn resolve(&self) -> Result<PipelineSettings, ConfigError> {
        self.resolve_with_env(|name| std::env::var(name).ok())
    }

    /// Resolution with an injectable environment, for tests.
    pub fn resolve_with_env<F>(&self, lookup: F) -> Result<PipelineSettings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = PipelineSettings::default();
        settings.apply_env(lookup)?;

        settings.export_dir = self.export_dir.clone();
        if let Some(steps) = &self.steps {
            settings.steps = parse_steps(steps)?;
        }
        if let Some(index_url) = &self.index_url {
            settings.index_url = index_url.clone();
        }
        if let Some(log_dir) = &self.log_dir {
            settings.log_dir = log_dir.clone();
        }
        if let Some(batch_size) = self.batch_size {
            settings.batch_size = batch_size;
        }
        if let Some(cache_host) = &self.cache_host {
            settings.cache_host = cache_host.clone();
        }
        if let Some(cache_port) = self.cache_port {
            settings.cache_port = cache_port;
        }
        if let Some(cache_ttl) = self.cache_ttl {
            settings.cache_ttl_secs = cache_ttl;
        }
        if self.no_pii {
            settings.steps.retain(|s| *s != StepName::Pii);
        }
        if self.no_dedup {
            settings.steps.retain(|s| *s != StepName::Deduplicate);
        }
        if let Some(len) = self.summary_max_length {
            settings.summary_max_length = len;
        }
        if let Some(len) = self.summary_min_length {
            settings.summary_min_length = len;
        }
        if let Some(count) = self.cluster_count {
            settings.cluster_count = count;
        }
        if let Some(size) = self.min_cluster_size {
            settings.min_cluster_size = size;
        }

        settings.validate()?;
        Ok(settings)
    }
}
