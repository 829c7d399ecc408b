// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Schema Storage
//!
//! File-backed persistence for schema definitions. Each version is one
//! JSON document named `<schema>_<major>.<minor>.<patch>.json` holding a
//! `{metadata, schema}` envelope; making a version active rewrites its
//! siblings' metadata to inactive.
//!
//! Metadata for every stored schema is loaded once at construction and
//! kept in memory; a file that fails to parse is logged and skipped so
//! one corrupt envelope cannot take the registry down.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use docpipe_domain::services::datetime_serde;
use docpipe_domain::{PipelineError, SchemaDefinition, SchemaKind, SchemaVersion};

/// Metadata stored alongside each schema version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    pub name: String,
    pub version: SchemaVersion,
    pub kind: SchemaKind,
    #[serde(default)]
    pub description: String,
    #[serde(with = "datetime_serde")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
}

fn default_active() -> bool {
    true
}

/// The on-disk `{metadata, schema}` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaEnvelope {
    metadata: SchemaMetadata,
    schema: SchemaDefinition,
}

/// Persistent storage for schema definitions.
pub struct SchemaStorage {
    storage_dir: PathBuf,
    /// Active-version metadata per schema name
    metadata_cache: RwLock<HashMap<String, SchemaMetadata>>,
}

impl SchemaStorage {
    /// Opens (creating if needed) the storage directory and loads the
    /// metadata of every stored schema.
    pub fn new(storage_dir: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let storage_dir = storage_dir.into();
        fs::create_dir_all(&storage_dir)?;
        let storage = Self {
            storage_dir,
            metadata_cache: RwLock::new(HashMap::new()),
        };
        storage.load_metadata();
        Ok(storage)
    }

    fn load_metadata(&self) {
        let entries = match fs::read_dir(&self.storage_dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(
                    "Cannot list schema storage {}: {}",
                    self.storage_dir.display(),
                    e
                );
                return;
            }
        };
        let mut cache = self.metadata_cache.write();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_envelope(&path) {
                Ok(envelope) => {
                    let keep = match cache.get(&envelope.metadata.name) {
                        // prefer the active version, else the highest
                        Some(existing) => {
                            envelope.metadata.is_active
                                || (!existing.is_active
                                    && envelope.metadata.version > existing.version)
                        }
                        None => true,
                    };
                    if keep {
                        cache.insert(envelope.metadata.name.clone(), envelope.metadata);
                    }
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable schema file {}: {}", path.display(), e);
                }
            }
        }
    }

    fn read_envelope(path: &Path) -> Result<SchemaEnvelope, PipelineError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn schema_path(&self, name: &str, version: &SchemaVersion) -> PathBuf {
        self.storage_dir
            .join(format!("{}_{}.{}.{}.json", name, version.major, version.minor, version.patch))
    }

    /// Persists a schema version with its dependency set.
    ///
    /// With `make_active`, sibling versions are rewritten as inactive so
    /// exactly one version per name answers unversioned lookups.
    pub fn store(
        &self,
        schema: &SchemaDefinition,
        make_active: bool,
        dependencies: BTreeSet<String>,
    ) -> Result<(), PipelineError> {
        let metadata = SchemaMetadata {
            name: schema.name.clone(),
            version: schema.version.clone(),
            kind: schema.kind,
            description: schema.description.clone(),
            created_at: schema.version.created_at,
            is_active: make_active,
            dependencies,
        };
        let envelope = SchemaEnvelope {
            metadata: metadata.clone(),
            schema: schema.clone(),
        };

        let path = self.schema_path(&schema.name, &schema.version);
        let serialized = serde_json::to_string_pretty(&envelope)?;
        fs::write(&path, serialized)?;

        if make_active {
            self.deactivate_other_versions(&schema.name, &schema.version)?;
            self.metadata_cache
                .write()
                .insert(schema.name.clone(), metadata);
        } else if !self.metadata_cache.read().contains_key(&schema.name) {
            self.metadata_cache
                .write()
                .insert(schema.name.clone(), metadata);
        }
        Ok(())
    }

    fn deactivate_other_versions(
        &self,
        name: &str,
        active_version: &SchemaVersion,
    ) -> Result<(), PipelineError> {
        for version in self.versions(name) {
            if &version == active_version {
                continue;
            }
            let path = self.schema_path(name, &version);
            match Self::read_envelope(&path) {
                Ok(mut envelope) => {
                    if envelope.metadata.is_active {
                        envelope.metadata.is_active = false;
                        fs::write(&path, serde_json::to_string_pretty(&envelope)?)?;
                    }
                }
                Err(e) => {
                    tracing::warn!("Cannot deactivate schema file {}: {}", path.display(), e);
                }
            }
        }
        Ok(())
    }

    /// Loads a schema: the exact version when given, else the active one.
    pub fn get(
        &self,
        name: &str,
        version: Option<&SchemaVersion>,
    ) -> Result<Option<SchemaDefinition>, PipelineError> {
        let path = match version {
            Some(version) => self.schema_path(name, version),
            None => {
                let metadata = self.metadata_cache.read().get(name).cloned();
                match metadata {
                    Some(metadata) if metadata.is_active => {
                        self.schema_path(name, &metadata.version)
                    }
                    _ => return Ok(None),
                }
            }
        };
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(Self::read_envelope(&path)?.schema))
    }

    /// Metadata records, optionally filtered by kind, sorted by name then
    /// version.
    pub fn list(&self, kind: Option<SchemaKind>) -> Vec<SchemaMetadata> {
        let mut all: Vec<SchemaMetadata> = Vec::new();
        if let Ok(entries) = fs::read_dir(&self.storage_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                if let Ok(envelope) = Self::read_envelope(&path) {
                    all.push(envelope.metadata);
                }
            }
        }
        if let Some(kind) = kind {
            all.retain(|m| m.kind == kind);
        }
        all.sort_by(|a, b| a.name.cmp(&b.name).then(a.version.cmp(&b.version)));
        all
    }

    /// Every stored version of a schema, newest first.
    pub fn versions(&self, name: &str) -> Vec<SchemaVersion> {
        let prefix = format!("{}_", name);
        let mut versions = Vec::new();
        if let Ok(entries) = fs::read_dir(&self.storage_dir) {
            for entry in entries.flatten() {
                let file_name = entry.file_name();
                let Some(file_name) = file_name.to_str() else {
                    continue;
                };
                let Some(stem) = file_name.strip_suffix(".json") else {
                    continue;
                };
                let Some(triple) = stem.strip_prefix(&prefix) else {
                    continue;
                };
                if let Ok(version) = triple.parse::<SchemaVersion>() {
                    versions.push(version);
                }
            }
        }
        versions.sort_by(|a, b| b.cmp(a));
        versions
    }

    /// Hard-deletes one version, or every version of a name. Returns
    /// whether anything was removed.
    pub fn delete(
        &self,
        name: &str,
        version: Option<&SchemaVersion>,
    ) -> Result<bool, PipelineError> {
        let targets: Vec<SchemaVersion> = match version {
            Some(version) => vec![version.clone()],
            None => self.versions(name),
        };
        let mut deleted = false;
        for target in targets {
            let path = self.schema_path(name, &target);
            if path.exists() {
                fs::remove_file(&path)?;
                deleted = true;
            }
        }
        if deleted {
            self.metadata_cache.write().remove(name);
        }
        Ok(deleted)
    }
}
