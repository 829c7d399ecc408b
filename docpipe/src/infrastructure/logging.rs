// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Logging
//!
//! Structured logging setup for the pipeline process:
//!
//! - a newline-delimited JSON layer writing to `<log-dir>/pipeline.json`,
//!   the machine-readable record every run leaves behind
//! - a compact human-readable layer on stderr
//!
//! Level filtering honors `RUST_LOG` and defaults to `info`. The returned
//! guard must stay alive for the duration of the process; dropping it
//! flushes the file writer.

use std::fs::{self, OpenOptions};
use std::path::Path;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use docpipe_domain::PipelineError;

/// Name of the structured log file inside the log directory.
pub const LOG_FILE_NAME: &str = "pipeline.json";

/// Keeps the non-blocking file writer alive.
pub struct LoggingGuard {
    _file_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Initializes global logging with a JSON file layer and a stderr layer.
///
/// Creates the log directory when missing and appends to an existing log
/// file so repeated runs accumulate one NDJSON stream.
pub fn init_logging(log_dir: &Path) -> Result<LoggingGuard, PipelineError> {
    fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new().create(true).append(true).open(&log_path)?;
    let (non_blocking, file_guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(non_blocking),
        )
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| PipelineError::invalid_config(format!("Logging already initialized: {}", e)))?;

    tracing::info!(log_file = %log_path.display(), "Logging initialized");
    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// The structured log path for a given log directory, for the success
/// banner the CLI prints.
pub fn log_file_path(log_dir: &Path) -> std::path::PathBuf {
    log_dir.join(LOG_FILE_NAME)
}
