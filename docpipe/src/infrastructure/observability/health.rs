// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Health & Status Aggregation
//!
//! Rolls per-stage outcome counts into one health verdict:
//!
//! - `Healthy`: no errors recorded
//! - `Degraded`: document-scoped errors occurred but the run proceeded
//! - `Unhealthy`: a stage-scoped failure aborted the run
//!
//! The report is the programmatic sibling of the end-of-run banner; tests
//! assert against it instead of parsing logs.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use docpipe_domain::StepStatus;

/// Aggregate health verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        };
        write!(f, "{}", s)
    }
}

/// Outcome counts for one stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageCounts {
    pub success: u64,
    pub warning: u64,
    pub error: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// Aggregated run status.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub stages: BTreeMap<String, StageCounts>,
    pub stage_failure: Option<String>,
}

/// Collects per-stage outcomes during a run.
#[derive(Default)]
pub struct HealthAggregator {
    inner: Mutex<AggregatorState>,
}

#[derive(Default)]
struct AggregatorState {
    stages: BTreeMap<String, StageCounts>,
    stage_failure: Option<String>,
}

impl HealthAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one document outcome for a stage.
    pub fn record(&self, stage: &str, status: StepStatus) {
        let mut inner = self.inner.lock();
        let counts = inner.stages.entry(stage.to_string()).or_default();
        match status {
            StepStatus::Success => counts.success += 1,
            StepStatus::Warning => counts.warning += 1,
            StepStatus::Error => counts.error += 1,
            StepStatus::Failed => counts.failed += 1,
            StepStatus::Skipped => counts.skipped += 1,
            // non-terminal statuses never reach aggregation
            StepStatus::Pending | StepStatus::Running => {}
        }
    }

    /// Records a stage-scoped failure; the run is unhealthy from here on.
    pub fn record_stage_failure(&self, stage: &str) {
        self.inner.lock().stage_failure = Some(stage.to_string());
    }

    /// Builds the aggregate report.
    pub fn report(&self) -> HealthReport {
        let inner = self.inner.lock();
        let status = if inner.stage_failure.is_some() {
            HealthStatus::Unhealthy
        } else if inner
            .stages
            .values()
            .any(|c| c.error > 0 || c.failed > 0)
        {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        HealthReport {
            status,
            stages: inner.stages.clone(),
            stage_failure: inner.stage_failure.clone(),
        }
    }
}
