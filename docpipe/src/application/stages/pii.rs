// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # PII Detection Stage
//!
//! Detects personally identifiable information with two detectors and
//! merges their findings:
//!
//! - **regex patterns** for the closed set {email, phone, ssn,
//!   credit_card, ip_address, date, passport, bitcoin_address,
//!   ethereum_address}
//! - **named entities** from the recognizer port, mapped to {person,
//!   organization, location, facility, money, product, event, law,
//!   group}
//!
//! Matches are deduplicated and sorted by start offset; overlaps resolve
//! to the earliest-starting, longest match. Redaction, when enabled,
//! replaces matches right-to-left with type-tagged tokens (`[EMAIL]`) so
//! earlier offsets stay valid.
//!
//! Detection over a batch is CPU-bound and embarrassingly parallel, so it
//! fans out over rayon; step recording stays sequential. Per-document
//! failure policy: pass through unchanged with a Warning step.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use docpipe_domain::services::EntityRecognizer;
use docpipe_domain::{Document, PipelineError, ProcessingStep, StepStatus};

use super::{ProcessingStage, StageContext};

const STAGE_NAME: &str = "pii";

/// A detected PII instance with byte offsets into the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiiMatch {
    pub kind: String,
    pub value: String,
    pub start: usize,
    pub end: usize,
}

/// Configuration for the PII stage.
#[derive(Debug, Clone)]
pub struct PiiConfig {
    /// Replace detected PII in the body with type-tagged tokens
    pub redact: bool,
}

impl Default for PiiConfig {
    fn default() -> Self {
        Self { redact: false }
    }
}

static PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    let table: &[(&str, &str)] = &[
        ("email", r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
        ("phone", r"\+?\d{1,3}[-.\s]?\(?\d{2,4}\)?[-.\s]?\d{3,4}[-.\s]?\d{3,4}\b"),
        ("ssn", r"\b\d{3}[-.]?\d{2}[-.]?\d{4}\b"),
        ("credit_card", r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b"),
        ("ip_address", r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b"),
        (
            "date",
            r"\b\d{1,2}[-/]\d{1,2}[-/]\d{2,4}\b|\b(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]* \d{1,2},? \d{4}\b",
        ),
        ("passport", r"\b[A-Z]{1,2}[0-9]{6,9}\b"),
        ("bitcoin_address", r"\b[13][a-km-zA-HJ-NP-Z1-9]{25,34}\b"),
        ("ethereum_address", r"\b0x[a-fA-F0-9]{40}\b"),
    ];
    table
        .iter()
        .filter_map(|(kind, pattern)| match Regex::new(pattern) {
            Ok(regex) => Some((*kind, regex)),
            Err(e) => {
                tracing::error!("Invalid PII pattern for {}: {}", kind, e);
                None
            }
        })
        .collect()
});

/// Redaction tokens per PII kind.
fn redaction_token(kind: &str) -> String {
    match kind {
        "email" => "[EMAIL]".to_string(),
        "phone" => "[PHONE]".to_string(),
        "ssn" => "[SSN]".to_string(),
        "credit_card" => "[CREDIT_CARD]".to_string(),
        "ip_address" => "[IP]".to_string(),
        "date" => "[DATE]".to_string(),
        "passport" => "[PASSPORT]".to_string(),
        "bitcoin_address" => "[BITCOIN]".to_string(),
        "ethereum_address" => "[ETH]".to_string(),
        "person" => "[PERSON]".to_string(),
        "organization" => "[ORG]".to_string(),
        "location" => "[LOCATION]".to_string(),
        "money" => "[MONEY]".to_string(),
        other => format!("[REDACTED:{}]", other.to_uppercase()),
    }
}

/// The PII detection stage.
pub struct PiiStage {
    config: PiiConfig,
    recognizer: Arc<dyn EntityRecognizer>,
}

impl PiiStage {
    pub fn new(config: PiiConfig, recognizer: Arc<dyn EntityRecognizer>) -> Self {
        Self { config, recognizer }
    }

    /// All matches from both detectors, overlap-resolved.
    pub fn detect(&self, text: &str) -> Result<Vec<PiiMatch>, PipelineError> {
        let mut matches: Vec<PiiMatch> = Vec::new();

        for (kind, regex) in PATTERNS.iter() {
            for m in regex.find_iter(text) {
                matches.push(PiiMatch {
                    kind: (*kind).to_string(),
                    value: m.as_str().to_string(),
                    start: m.start(),
                    end: m.end(),
                });
            }
        }

        for span in self.recognizer.recognize(text)? {
            matches.push(PiiMatch {
                kind: span.kind.to_string(),
                value: span.text,
                start: span.start,
                end: span.end,
            });
        }

        Ok(Self::resolve_overlaps(matches))
    }

    /// Sorts by start offset and keeps the earliest-starting, longest
    /// match wherever matches overlap. Exact duplicates collapse.
    fn resolve_overlaps(mut matches: Vec<PiiMatch>) -> Vec<PiiMatch> {
        matches.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
        matches.dedup();
        let mut resolved: Vec<PiiMatch> = Vec::with_capacity(matches.len());
        let mut last_end = 0usize;
        for m in matches {
            if resolved.is_empty() || m.start >= last_end {
                last_end = m.end;
                resolved.push(m);
            }
        }
        resolved
    }

    /// Replaces matches with type tokens, right-to-left so earlier
    /// offsets survive each splice.
    pub fn redact(text: &str, matches: &[PiiMatch]) -> String {
        let mut redacted = text.to_string();
        let mut ordered: Vec<&PiiMatch> = matches.iter().collect();
        ordered.sort_by(|a, b| b.start.cmp(&a.start));
        for m in ordered {
            if m.end <= redacted.len() {
                redacted.replace_range(m.start..m.end, &redaction_token(&m.kind));
            }
        }
        redacted
    }

    /// Applies detection (and optional redaction) to one document.
    fn analyze(&self, mut document: Document) -> Result<Document, (Document, PipelineError)> {
        let matches = match self.detect(&document.content.body) {
            Ok(matches) => matches,
            Err(e) => return Err((document, e)),
        };

        let found_types: BTreeSet<&str> = matches.iter().map(|m| m.kind.as_str()).collect();
        let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
        for m in &matches {
            *by_type.entry(m.kind.as_str()).or_default() += 1;
        }
        document.metadata.annotate(
            "pii_analysis",
            serde_json::json!({
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "found_types": found_types.iter().collect::<Vec<_>>(),
                "match_count": matches.len(),
                "matches_by_type": by_type,
            }),
        );

        if self.config.redact && !matches.is_empty() {
            document.content.body = Self::redact(&document.content.body, &matches);
            if let Some(summary) = document.content.summary.take() {
                let summary_matches = match self.detect(&summary) {
                    Ok(summary_matches) => summary_matches,
                    Err(e) => return Err((document, e)),
                };
                document.content.summary = Some(Self::redact(&summary, &summary_matches));
            }
        }

        Ok(document)
    }
}

#[async_trait]
impl ProcessingStage for PiiStage {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn process(
        &self,
        batch: Vec<Document>,
        ctx: &StageContext,
    ) -> Result<Vec<Document>, PipelineError> {
        let started = Instant::now();

        // per-document work is independent; fan detection out over rayon
        let analyzed: Vec<Result<Document, (Document, PipelineError)>> =
            batch.into_par_iter().map(|doc| self.analyze(doc)).collect();

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        let mut output = Vec::with_capacity(analyzed.len());
        for result in analyzed {
            match result {
                Ok(document) => {
                    let match_count = document
                        .metadata
                        .extra
                        .get("pii_analysis")
                        .and_then(|a| a.get("match_count"))
                        .and_then(|c| c.as_u64())
                        .unwrap_or(0);
                    ctx.record_outcome(
                        document.id,
                        ProcessingStep::success(STAGE_NAME, duration_ms)
                            .with_metric("match_count", match_count as f64)
                            .with_detail("redacted", self.config.redact.to_string()),
                    )
                    .await;
                    output.push(document);
                }
                Err((document, e)) => {
                    // pass-through with a Warning step
                    tracing::warn!("PII analysis failed for {}: {}", document.id, e);
                    ctx.record_outcome(
                        document.id,
                        ProcessingStep::new(STAGE_NAME, StepStatus::Warning)
                            .with_detail("analysis_failed", e.to_string())
                            .with_duration(duration_ms),
                    )
                    .await;
                    output.push(document);
                }
            }
        }
        Ok(output)
    }
}
