// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Entity Recognizer
//!
//! Wrapper over named-entity recognition for the PII stage. The real NER
//! model is an external collaborator; this adapter maps its label
//! vocabulary into the pipeline's closed [`EntityKind`] set and supplies
//! a heuristic implementation good enough for tests and for deployments
//! without a model: cue-word driven matching for organizations,
//! locations, facilities, events, laws, groups, and money, plus titled
//! person names.
//!
//! Offsets are byte offsets into the input, which is what the redactor
//! expects.

use once_cell::sync::Lazy;
use regex::Regex;

use docpipe_domain::services::{EntityKind, EntityRecognizer, EntitySpan};
use docpipe_domain::PipelineError;

/// Maps an NER model's label vocabulary to the closed entity set.
///
/// Labels outside the mapping are dropped at this boundary.
pub fn map_ner_label(label: &str) -> Option<EntityKind> {
    match label {
        "PERSON" => Some(EntityKind::Person),
        "ORG" => Some(EntityKind::Organization),
        "GPE" | "LOC" => Some(EntityKind::Location),
        "FAC" => Some(EntityKind::Facility),
        "MONEY" => Some(EntityKind::Money),
        "PRODUCT" => Some(EntityKind::Product),
        "EVENT" => Some(EntityKind::Event),
        "LAW" => Some(EntityKind::Law),
        "NORP" => Some(EntityKind::Group),
        _ => None,
    }
}

static MONEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[$€£]\s?\d[\d,]*(?:\.\d+)?(?:\s?(?:million|billion|thousand))?")
        .unwrap_or_else(|e| unreachable!("invalid money pattern: {}", e))
});

static TITLED_PERSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:Mr|Mrs|Ms|Dr|Prof)\.\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*")
        .unwrap_or_else(|e| unreachable!("invalid person pattern: {}", e))
});

static CAPITALIZED_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][A-Za-z&]+(?:\s+[A-Z][A-Za-z&]+)*")
        .unwrap_or_else(|e| unreachable!("invalid run pattern: {}", e))
});

/// Suffix cues classifying a capitalized run.
const ORG_SUFFIXES: &[&str] = &["Inc", "Corp", "Ltd", "LLC", "GmbH", "Foundation", "University"];
const FACILITY_SUFFIXES: &[&str] = &["Airport", "Hospital", "Stadium", "Bridge", "Station"];
const EVENT_SUFFIXES: &[&str] = &["Conference", "Summit", "Olympics", "Festival"];
const LAW_SUFFIXES: &[&str] = &["Act", "Treaty", "Amendment", "Regulation"];
const LOCATION_PREFIXES: &[&str] = &["Lake", "Mount", "North", "South", "East", "West", "New"];

/// Heuristic, dictionary-driven recognizer.
#[derive(Default)]
pub struct HeuristicEntityRecognizer;

impl HeuristicEntityRecognizer {
    pub fn new() -> Self {
        Self
    }

    fn classify_run(run: &str) -> Option<EntityKind> {
        let last_word = run.split_whitespace().last()?;
        if ORG_SUFFIXES.contains(&last_word) {
            return Some(EntityKind::Organization);
        }
        if FACILITY_SUFFIXES.contains(&last_word) {
            return Some(EntityKind::Facility);
        }
        if EVENT_SUFFIXES.contains(&last_word) {
            return Some(EntityKind::Event);
        }
        if LAW_SUFFIXES.contains(&last_word) {
            return Some(EntityKind::Law);
        }
        let first_word = run.split_whitespace().next()?;
        if run.split_whitespace().count() > 1 && LOCATION_PREFIXES.contains(&first_word) {
            return Some(EntityKind::Location);
        }
        None
    }
}

impl EntityRecognizer for HeuristicEntityRecognizer {
    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, PipelineError> {
        let mut spans = Vec::new();

        for m in MONEY.find_iter(text) {
            spans.push(EntitySpan {
                kind: EntityKind::Money,
                text: m.as_str().to_string(),
                start: m.start(),
                end: m.end(),
            });
        }

        for m in TITLED_PERSON.find_iter(text) {
            spans.push(EntitySpan {
                kind: EntityKind::Person,
                text: m.as_str().to_string(),
                start: m.start(),
                end: m.end(),
            });
        }

        for m in CAPITALIZED_RUN.find_iter(text) {
            if let Some(kind) = Self::classify_run(m.as_str()) {
                spans.push(EntitySpan {
                    kind,
                    text: m.as_str().to_string(),
                    start: m.start(),
                    end: m.end(),
                });
            }
        }

        spans.sort_by_key(|s| (s.start, s.end));
        Ok(spans)
    }
}
