// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Loader Stage
//!
//! Walks the export directory and turns source files into documents with
//! an id, a body, and the required metadata. Format-specific parsing is a
//! frozen interface boundary: JSON exports, markdown, and plain text are
//! recognized; anything else is ignored.
//!
//! Per-file policy is **skip (logged)**; an unreadable or malformed file
//! never aborts the run. An unreadable export directory is stage-scoped
//! and fatal. An empty directory yields an empty batch with no error.
//!
//! The loader may emit the same logical document twice when two readers
//! claim overlapping trees; the deduplicator downstream absorbs it.
//!
//! For every emitted document the loader creates the lineage record
//! (source info pointing back into the export) and records the step:
//! Success normally, Warning when the body was truncated to the
//! configured maximum.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Instant;

use docpipe_domain::{
    Document, DocumentMetadata, DocumentId, PipelineError, ProcessingStep, SourceInfo, StepStatus,
};

use super::{ProcessingStage, StageContext};

const STAGE_NAME: &str = "loader";

/// Loader configuration, validated at construction.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Root of the exported collection
    pub export_dir: PathBuf,
    /// Maximum body size in bytes; longer bodies are truncated with a
    /// recorded warning
    pub max_body_bytes: usize,
}

impl LoaderConfig {
    pub fn new(export_dir: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let config = Self {
            export_dir: export_dir.into(),
            max_body_bytes: 1_000_000,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if !self.export_dir.is_dir() {
            return Err(PipelineError::validation(format!(
                "Export directory does not exist: {}",
                self.export_dir.display()
            )));
        }
        if self.max_body_bytes == 0 {
            return Err(PipelineError::validation("max_body_bytes must be positive"));
        }
        Ok(())
    }
}

/// The loader stage.
pub struct Loader {
    config: LoaderConfig,
}

impl Loader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), PipelineError> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            PipelineError::Io(format!("Cannot read directory {}: {}", dir.display(), e))
        })?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                // nested directory failures are per-subtree skips
                if let Err(e) = Self::collect_files(&path, out) {
                    tracing::warn!("Skipping subtree {}: {}", path.display(), e);
                }
            } else if matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("json") | Some("md") | Some("markdown") | Some("txt") | Some("text")
            ) {
                out.push(path);
            }
        }
        Ok(())
    }

    fn file_timestamp(path: &Path) -> DateTime<Utc> {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now())
    }

    fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.config.export_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    /// Parses one source file into a document. Format-specific, kept
    /// deliberately thin.
    fn read_document(&self, path: &Path) -> Result<Document, PipelineError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Io(format!("Cannot read {}: {}", path.display(), e)))?;
        let relative = self.relative_path(path);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| relative.clone());

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let (id, body, title) = match extension {
            "json" => Self::parse_json_export(&raw, &stem)?,
            "md" | "markdown" => {
                let title = raw
                    .lines()
                    .find_map(|line| line.strip_prefix("# ").map(str::trim))
                    .unwrap_or(&stem)
                    .to_string();
                (None, raw.clone(), title)
            }
            _ => (None, raw.clone(), stem.clone()),
        };

        if body.trim().is_empty() {
            return Err(PipelineError::validation(format!(
                "File {} has no body content",
                path.display()
            )));
        }

        let metadata = DocumentMetadata::new(
            title,
            "export",
            Self::file_timestamp(path),
            relative,
        );
        let mut document = Document::new(body, metadata);
        if let Some(id) = id {
            document.id = id;
        }
        Ok(document)
    }

    /// JSON exports carry `{id?, content: {body}, metadata: {title?}}` or
    /// a flat `{id?, body, title?}` shape.
    fn parse_json_export(
        raw: &str,
        fallback_title: &str,
    ) -> Result<(Option<DocumentId>, String, String), PipelineError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let body = value
            .pointer("/content/body")
            .or_else(|| value.get("body"))
            .and_then(|b| b.as_str())
            .ok_or_else(|| PipelineError::validation("JSON export missing body"))?
            .to_string();
        let title = value
            .pointer("/metadata/title")
            .or_else(|| value.get("title"))
            .and_then(|t| t.as_str())
            .unwrap_or(fallback_title)
            .to_string();
        let id = value
            .get("id")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<DocumentId>().ok());
        Ok((id, body, title))
    }
}

#[async_trait]
impl ProcessingStage for Loader {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    /// Ignores its input batch (the loader is the source of the run) and
    /// emits every readable document under the export directory.
    async fn process(
        &self,
        _batch: Vec<Document>,
        ctx: &StageContext,
    ) -> Result<Vec<Document>, PipelineError> {
        let mut files = Vec::new();
        Self::collect_files(&self.config.export_dir, &mut files)
            .map_err(|e| PipelineError::stage_failed(STAGE_NAME, e))?;
        files.sort();

        tracing::info!(
            "Loading {} files from {}",
            files.len(),
            self.config.export_dir.display()
        );

        let mut documents = Vec::new();
        for path in files {
            if ctx.cancellation.is_cancelled() {
                tracing::info!("Loader cancelled; returning partial load");
                break;
            }
            let started = Instant::now();
            match self.read_document(&path) {
                Ok(mut document) => {
                    let truncated = document.truncate_body(self.config.max_body_bytes);

                    let source_info = SourceInfo::new(
                        document.metadata.path.clone(),
                        "export",
                        path.to_string_lossy(),
                    );
                    ctx.lineage
                        .ensure_created(document.id, Some(source_info), None)
                        .await?;

                    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
                    let step = if truncated {
                        ProcessingStep::new(STAGE_NAME, StepStatus::Warning)
                            .with_detail("truncated", "true")
                            .with_detail("max_body_bytes", self.config.max_body_bytes.to_string())
                            .with_duration(duration_ms)
                    } else {
                        ProcessingStep::success(STAGE_NAME, duration_ms)
                    };
                    ctx.record_outcome(document.id, step).await;
                    documents.push(document);
                }
                Err(e) => {
                    // per-file policy: skip, logged
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    ctx.errors.record(STAGE_NAME, None, &e);
                }
            }
        }
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::stages::test_support::context;

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[tokio::test]
    async fn test_empty_directory_yields_empty_batch() {
        let dir = tempfile::tempdir().unwrap();
        let loader = Loader::new(LoaderConfig::new(dir.path()).unwrap());
        let ctx = context();
        let documents = loader.process(Vec::new(), &ctx).await.unwrap();
        assert!(documents.is_empty());
        assert!(ctx.lineage.store().is_empty());
    }

    #[tokio::test]
    async fn test_loads_markdown_text_and_json() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.md", "# Title A\n\nBody of a");
        write(dir.path(), "b.txt", "plain body");
        write(
            dir.path(),
            "c.json",
            r#"{"content": {"body": "json body"}, "metadata": {"title": "From JSON"}}"#,
        );
        write(dir.path(), "ignored.bin", "not a document");

        let loader = Loader::new(LoaderConfig::new(dir.path()).unwrap());
        let ctx = context();
        let documents = loader.process(Vec::new(), &ctx).await.unwrap();
        assert_eq!(documents.len(), 3);

        let titles: Vec<&str> = documents.iter().map(|d| d.metadata.title.as_str()).collect();
        assert!(titles.contains(&"Title A"));
        assert!(titles.contains(&"b"));
        assert!(titles.contains(&"From JSON"));

        // lineage created with one step each
        for document in &documents {
            let lineage = ctx.lineage.get(document.id).await.unwrap();
            assert_eq!(lineage.processing_steps.len(), 1);
            assert_eq!(lineage.processing_steps[0].status, StepStatus::Success);
        }
    }

    #[tokio::test]
    async fn test_json_id_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let id = DocumentId::new();
        write(
            dir.path(),
            "doc.json",
            &format!(r#"{{"id": "{}", "body": "flat body"}}"#, id),
        );
        let loader = Loader::new(LoaderConfig::new(dir.path()).unwrap());
        let documents = loader.process(Vec::new(), &context()).await.unwrap();
        assert_eq!(documents[0].id, id);
    }

    #[tokio::test]
    async fn test_malformed_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.txt", "good body");
        write(dir.path(), "bad.json", "{ this is not json");
        write(dir.path(), "empty.txt", "   ");

        let ctx = context();
        let loader = Loader::new(LoaderConfig::new(dir.path()).unwrap());
        let documents = loader.process(Vec::new(), &ctx).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(ctx.errors.len(), 2);
    }

    #[tokio::test]
    async fn test_long_body_truncated_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "long.txt", &"x".repeat(64));

        let mut config = LoaderConfig::new(dir.path()).unwrap();
        config.max_body_bytes = 16;
        let ctx = context();
        let documents = Loader::new(config).process(Vec::new(), &ctx).await.unwrap();
        assert_eq!(documents[0].content.body.len(), 16);

        let lineage = ctx.lineage.get(documents[0].id).await.unwrap();
        assert_eq!(lineage.processing_steps[0].status, StepStatus::Warning);
        assert_eq!(
            lineage.processing_steps[0].details.get("truncated").map(String::as_str),
            Some("true")
        );
    }

    #[tokio::test]
    async fn test_nested_directories_are_walked() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        write(&dir.path().join("a/b"), "deep.md", "# Deep\n\nnested body");
        let documents = Loader::new(LoaderConfig::new(dir.path()).unwrap())
            .process(Vec::new(), &context())
            .await
            .unwrap();
        assert_eq!(documents.len(), 1);
        assert!(documents[0].metadata.path.contains("a/b"));
    }

    #[test]
    fn test_config_rejects_missing_directory() {
        assert!(LoaderConfig::new("/definitely/not/here").is_err());
    }
}
