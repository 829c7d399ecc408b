// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Schema Registry
//!
//! Central registry for schema definitions: versioned persistence via
//! [`SchemaStorage`], hot lookups via [`SchemaCache`], a dependency index,
//! and cycle detection on every registration.
//!
//! ## Dependency Rules
//!
//! A schema depends on: the target of every `schema_ref` field (which
//! must be populated; a missing reference is a registration error
//! distinct from a cycle), the `items_schema` of array/object fields, its
//! parent, and each cross-validation reference. Registering a schema
//! whose dependency closure reaches back to its own name fails with a
//! cycle error naming the path; nothing is persisted in that case.
//!
//! ## Locking
//!
//! The dependency index and active-schema map live behind one RwLock;
//! reads take a consistent snapshot, registration holds the write lock
//! across the cycle check and the index update.

use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use docpipe_domain::{PipelineError, SchemaDefinition, SchemaKind, SchemaVersion};

use super::cache::SchemaCache;
use super::storage::{SchemaMetadata, SchemaStorage};

/// Tunables for the registry.
#[derive(Debug, Clone)]
pub struct SchemaRegistryConfig {
    pub storage_dir: PathBuf,
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
}

impl SchemaRegistryConfig {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            cache_capacity: 128,
            cache_ttl: Duration::from_secs(3600),
        }
    }
}

#[derive(Default)]
struct RegistryState {
    active_schemas: HashMap<String, SchemaDefinition>,
    dependencies: HashMap<String, BTreeSet<String>>,
}

/// Central registry for managing schema definitions.
pub struct SchemaRegistry {
    storage: SchemaStorage,
    cache: SchemaCache,
    state: RwLock<RegistryState>,
}

impl SchemaRegistry {
    pub fn new(config: SchemaRegistryConfig) -> Result<Self, PipelineError> {
        let storage = SchemaStorage::new(&config.storage_dir)?;
        let registry = Self {
            storage,
            cache: SchemaCache::new(config.cache_capacity, config.cache_ttl),
            state: RwLock::new(RegistryState::default()),
        };
        registry.rebuild_state();
        Ok(registry)
    }

    /// Rebuilds the active map and dependency index from storage, used at
    /// startup so a restarted process sees persisted registrations.
    fn rebuild_state(&self) {
        let mut state = self.state.write();
        for metadata in self.storage.list(None) {
            if !metadata.is_active {
                continue;
            }
            if let Ok(Some(schema)) = self.storage.get(&metadata.name, None) {
                match schema.dependencies() {
                    Ok(deps) => {
                        state.dependencies.insert(schema.name.clone(), deps);
                    }
                    Err(e) => {
                        tracing::warn!("Stored schema '{}' has bad references: {}", schema.name, e)
                    }
                }
                state.active_schemas.insert(schema.name.clone(), schema);
            }
        }
    }

    /// Registers a schema version.
    ///
    /// Runs the override check against a resolvable parent, extracts
    /// dependencies, rejects cycles (naming the path), persists the
    /// envelope, and updates cache/active map/dependency index as
    /// requested.
    pub fn register(
        &self,
        schema: &SchemaDefinition,
        make_active: bool,
        update_dependencies: bool,
    ) -> Result<(), PipelineError> {
        if let Some(parent_name) = &schema.parent {
            if let Some(parent) = self.get(parent_name, None)? {
                schema.check_overrides(&parent)?;
            }
        }

        let deps = schema.dependencies()?;

        {
            let mut state = self.state.write();
            Self::check_cycles(&state.dependencies, &schema.name, &deps)?;

            self.storage.store(schema, make_active, deps.clone())?;

            if make_active {
                self.cache.set(schema);
                state.active_schemas.insert(schema.name.clone(), schema.clone());
            }
            if update_dependencies {
                state.dependencies.insert(schema.name.clone(), deps);
            }
        }

        tracing::debug!(
            "Registered schema '{}' version {} (active: {})",
            schema.name,
            schema.version,
            make_active
        );
        Ok(())
    }

    /// Fetches a schema: the exact version when given, else the active
    /// version, checking the cache first.
    pub fn get(
        &self,
        name: &str,
        version: Option<&SchemaVersion>,
    ) -> Result<Option<SchemaDefinition>, PipelineError> {
        if let Some(version) = version {
            // versioned lookups bypass the name-keyed cache
            return self.storage.get(name, Some(version));
        }

        if let Some(cached) = self.cache.get(name) {
            return Ok(Some(cached));
        }

        if let Some(active) = self.state.read().active_schemas.get(name) {
            self.cache.set(active);
            return Ok(Some(active.clone()));
        }

        let loaded = self.storage.get(name, None)?;
        if let Some(schema) = &loaded {
            self.cache.set(schema);
        }
        Ok(loaded)
    }

    /// Metadata records, optionally filtered by kind and activity.
    pub fn list(&self, kind: Option<SchemaKind>, include_inactive: bool) -> Vec<SchemaMetadata> {
        let mut metadata = self.storage.list(kind);
        if !include_inactive {
            metadata.retain(|m| m.is_active);
        }
        metadata
    }

    /// The direct dependency set of a schema.
    pub fn dependencies(&self, name: &str) -> BTreeSet<String> {
        self.state
            .read()
            .dependencies
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Removes a schema from the cache and the active-schema mapping.
    pub fn invalidate(&self, name: &str) {
        self.cache.delete(name);
        self.state.write().active_schemas.remove(name);
    }

    /// Every stored version of a schema, newest first.
    pub fn versions(&self, name: &str) -> Vec<SchemaVersion> {
        self.storage.versions(name)
    }

    /// Hard-deletes stored versions and drops the name from all indexes.
    pub fn delete(
        &self,
        name: &str,
        version: Option<&SchemaVersion>,
    ) -> Result<bool, PipelineError> {
        let deleted = self.storage.delete(name, version)?;
        if deleted {
            self.cache.delete(name);
            let mut state = self.state.write();
            state.active_schemas.remove(name);
            state.dependencies.remove(name);
        }
        Ok(deleted)
    }

    /// Worklist DFS from the new schema's dependency set through the
    /// current dependency map; reaching the schema's own name is a cycle.
    fn check_cycles(
        dependency_map: &HashMap<String, BTreeSet<String>>,
        name: &str,
        deps: &BTreeSet<String>,
    ) -> Result<(), PipelineError> {
        let mut stack: Vec<Vec<&str>> = deps.iter().map(|d| vec![d.as_str()]).collect();

        while let Some(path) = stack.pop() {
            let current = match path.last() {
                Some(current) => *current,
                None => continue,
            };
            if current == name {
                let mut rendered: Vec<&str> = vec![name];
                rendered.extend(path);
                return Err(PipelineError::cycle(rendered));
            }
            if let Some(next_deps) = dependency_map.get(current) {
                for next in next_deps {
                    if path.contains(&next.as_str()) {
                        continue;
                    }
                    let mut extended = path.clone();
                    extended.push(next);
                    stack.push(extended);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docpipe_domain::{FieldDefinition, FieldType};

    fn registry(dir: &std::path::Path) -> SchemaRegistry {
        SchemaRegistry::new(SchemaRegistryConfig::new(dir)).unwrap()
    }

    fn schema(name: &str) -> SchemaDefinition {
        SchemaDefinition::new(name, SchemaVersion::new(1, 0, 0), SchemaKind::Document)
            .with_field("title", FieldDefinition::new(FieldType::String).required())
    }

    fn schema_with_ref(name: &str, target: &str) -> SchemaDefinition {
        schema(name).with_field(
            "linked",
            FieldDefinition::new(FieldType::SchemaRef).with_ref(target),
        )
    }

    #[test]
    fn test_register_and_get_active() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        registry.register(&schema("document"), true, true).unwrap();
        let fetched = registry.get("document", None).unwrap().unwrap();
        assert_eq!(fetched.name, "document");
    }

    #[test]
    fn test_get_specific_version() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let v1 = schema("document");
        let mut v2 = schema("document");
        v2.version = SchemaVersion::new(2, 0, 0);
        registry.register(&v1, true, true).unwrap();
        registry.register(&v2, true, true).unwrap();

        let active = registry.get("document", None).unwrap().unwrap();
        assert_eq!(active.version, SchemaVersion::new(2, 0, 0));
        let pinned = registry
            .get("document", Some(&SchemaVersion::new(1, 0, 0)))
            .unwrap()
            .unwrap();
        assert_eq!(pinned.version, SchemaVersion::new(1, 0, 0));
    }

    #[test]
    fn test_dependencies_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        registry.register(&schema("chunk"), true, true).unwrap();
        registry
            .register(&schema_with_ref("document", "chunk"), true, true)
            .unwrap();
        let deps = registry.dependencies("document");
        assert!(deps.contains("chunk"));
        assert!(registry.dependencies("chunk").is_empty());
    }

    #[test]
    fn test_missing_schema_ref_rejected_as_validation() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let broken = schema("broken").with_field("linked", FieldDefinition::new(FieldType::SchemaRef));
        let err = registry.register(&broken, true, true).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn test_cycle_rejected_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        registry.register(&schema_with_ref("a", "b"), true, true).unwrap();
        registry.register(&schema_with_ref("b", "c"), true, true).unwrap();
        let err = registry
            .register(&schema_with_ref("c", "a"), true, true)
            .unwrap_err();
        assert!(matches!(err, PipelineError::CycleDetected(_)));
        assert!(err.to_string().contains("c -> a -> b -> c"), "got: {}", err);
        // nothing persisted for the rejected schema
        assert!(registry.get("c", None).unwrap().is_none());
    }

    #[test]
    fn test_self_dependency_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let err = registry
            .register(&schema_with_ref("selfish", "selfish"), true, true)
            .unwrap_err();
        assert!(matches!(err, PipelineError::CycleDetected(_)));
    }

    #[test]
    fn test_parent_override_enforced_when_parent_known() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        registry.register(&schema("base"), true, true).unwrap();

        let clashing = schema("child").with_parent("base");
        let err = registry.register(&clashing, true, true).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));

        let overriding = SchemaDefinition::new("child", SchemaVersion::new(1, 0, 0), SchemaKind::Document)
            .with_field("title", FieldDefinition::new(FieldType::String).overriding())
            .with_parent("base");
        registry.register(&overriding, true, true).unwrap();
        assert!(registry.dependencies("child").contains("base"));
    }

    #[test]
    fn test_invalidate_clears_cache_and_active_map() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        registry.register(&schema("document"), true, true).unwrap();
        registry.invalidate("document");
        // still resolvable through storage (read-through re-populates)
        assert!(registry.get("document", None).unwrap().is_some());
    }

    #[test]
    fn test_list_filters_kind_and_activity() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        registry.register(&schema("doc"), true, true).unwrap();
        let chunk = SchemaDefinition::new("chunk", SchemaVersion::new(1, 0, 0), SchemaKind::Chunk);
        registry.register(&chunk, false, true).unwrap();

        let active_only = registry.list(None, false);
        assert_eq!(active_only.len(), 1);
        let all = registry.list(None, true);
        assert_eq!(all.len(), 2);
        let chunks = registry.list(Some(SchemaKind::Chunk), true);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].name, "chunk");
    }

    #[test]
    fn test_registry_state_rebuilt_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let registry = registry(dir.path());
            registry.register(&schema("chunk"), true, true).unwrap();
            registry
                .register(&schema_with_ref("document", "chunk"), true, true)
                .unwrap();
        }
        let reopened = registry(dir.path());
        assert!(reopened.dependencies("document").contains("chunk"));
        // cycle detection still sees the persisted edges
        let err = reopened
            .register(&schema_with_ref("chunk2", "chunk2"), true, true)
            .unwrap_err();
        assert!(matches!(err, PipelineError::CycleDetected(_)));
    }
}
