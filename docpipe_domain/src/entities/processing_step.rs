// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Processing Step
//!
//! Per-document record of a single stage execution. Each enabled stage
//! appends exactly one step per input document per run; steps are retained
//! for the life of the lineage they attach to.
//!
//! ## Step State Machine
//!
//! ```text
//! Pending -> Running -> { Success | Warning | Error | Failed | Skipped }
//! ```
//!
//! `Running` is never persisted at a stage boundary: a step either reaches
//! a terminal state or its own terminal state is written as `Error` with a
//! message. `Cancelled` work is recorded as `Skipped` with a cancellation
//! detail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::services::datetime_serde;
use crate::PipelineError;

/// Status of a processing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Queued, not yet started
    Pending,
    /// In flight; never persisted at a stage boundary
    Running,
    /// Completed normally
    Success,
    /// Completed with a non-fatal anomaly
    Warning,
    /// Document-scoped failure; the run continues
    Error,
    /// Unrecoverable failure for this document
    Failed,
    /// Stage did not apply to this document (or was cancelled)
    Skipped,
}

impl StepStatus {
    /// Terminal statuses are persisted; non-terminal ones must not cross a
    /// stage boundary.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Success
                | StepStatus::Warning
                | StepStatus::Error
                | StepStatus::Failed
                | StepStatus::Skipped
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Success => "success",
            StepStatus::Warning => "warning",
            StepStatus::Error => "error",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for StepStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(StepStatus::Pending),
            "running" => Ok(StepStatus::Running),
            "success" => Ok(StepStatus::Success),
            "warning" => Ok(StepStatus::Warning),
            "error" => Ok(StepStatus::Error),
            "failed" => Ok(StepStatus::Failed),
            "skipped" => Ok(StepStatus::Skipped),
            _ => Err(PipelineError::validation(format!("Unknown step status: {}", s))),
        }
    }
}

/// Record of a single stage execution for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStep {
    /// Name of the stage that executed
    pub step_name: String,
    /// Terminal status of this execution
    pub status: StepStatus,
    /// Stage-specific details (counts, flags, identifiers)
    #[serde(default)]
    pub details: BTreeMap<String, String>,
    /// Numeric metrics; `duration_ms` by convention
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    /// Error message when status is Error or Failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// When the step completed (UTC)
    #[serde(with = "datetime_serde")]
    pub timestamp: DateTime<Utc>,
}

impl ProcessingStep {
    /// Builds a step record in a terminal state.
    pub fn new(step_name: impl Into<String>, status: StepStatus) -> Self {
        Self {
            step_name: step_name.into(),
            status,
            details: BTreeMap::new(),
            metrics: BTreeMap::new(),
            error_message: None,
            timestamp: Utc::now(),
        }
    }

    /// A successful step stamped with its duration.
    pub fn success(step_name: impl Into<String>, duration_ms: f64) -> Self {
        Self::new(step_name, StepStatus::Success).with_duration(duration_ms)
    }

    /// An error step carrying the failure message.
    pub fn error(step_name: impl Into<String>, message: impl Into<String>) -> Self {
        let mut step = Self::new(step_name, StepStatus::Error);
        step.error_message = Some(message.into());
        step
    }

    /// A skipped step with the reason in the details map.
    pub fn skipped(step_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(step_name, StepStatus::Skipped).with_detail("reason", reason)
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }

    pub fn with_duration(self, duration_ms: f64) -> Self {
        self.with_metric("duration_ms", duration_ms)
    }

    /// Duration metric, when recorded.
    pub fn duration_ms(&self) -> Option<f64> {
        self.metrics.get("duration_ms").copied()
    }
}
