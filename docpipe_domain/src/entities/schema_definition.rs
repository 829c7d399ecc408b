// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Schema Definition
//!
//! Schema model for the registry: a named, versioned field map with a
//! closed type system, per-field constraints, single inheritance, and
//! cross-schema references.
//!
//! ## Shape
//!
//! - **kind**: what the schema describes: `Document`, `Chunk`,
//!   `Reference`, or `Metadata`
//! - **fields**: name → [`FieldDefinition`] with a type tag from a closed
//!   set, a required flag, a default, and a constraints map
//! - **parent**: optional single-inheritance parent, referenced by name;
//!   redefining a parent field requires the `override` flag
//! - **validation_refs**: cross-schema validation references; each one
//!   contributes a dependency edge, like `schema_ref` fields do
//!
//! Dependency extraction and JSON-value validation live here; cycle
//! detection over the resulting edges is the registry's job since it owns
//! the full dependency map.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::value_objects::SchemaVersion;
use crate::PipelineError;

/// Kind of schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    Document,
    Chunk,
    Reference,
    Metadata,
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchemaKind::Document => "document",
            SchemaKind::Chunk => "chunk",
            SchemaKind::Reference => "reference",
            SchemaKind::Metadata => "metadata",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for SchemaKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "document" => Ok(SchemaKind::Document),
            "chunk" => Ok(SchemaKind::Chunk),
            "reference" => Ok(SchemaKind::Reference),
            "metadata" => Ok(SchemaKind::Metadata),
            _ => Err(PipelineError::validation(format!("Unknown schema kind: {}", s))),
        }
    }
}

/// Closed set of field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Array,
    Object,
    Null,
    Datetime,
    SchemaRef,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Null => "null",
            FieldType::Datetime => "datetime",
            FieldType::SchemaRef => "schema_ref",
        };
        write!(f, "{}", s)
    }
}

/// Constraints applicable to a field value.
///
/// `min`/`max` bound numeric values, `pattern` and the length bounds apply
/// to strings (lengths also to arrays), `enum` restricts to an allowed
/// value set. Unknown constraint keys are a construction-time error, not a
/// silently ignored map entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

impl FieldConstraints {
    pub fn is_empty(&self) -> bool {
        self.min.is_none()
            && self.max.is_none()
            && self.pattern.is_none()
            && self.enum_values.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
    }
}

/// Definition of a single schema field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "FieldConstraints::is_empty")]
    pub constraints: FieldConstraints,
    /// Must be set when redefining a parent field
    #[serde(rename = "override", default)]
    pub is_override: bool,
    /// Referenced schema name; mandatory for `SchemaRef` fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_schema: Option<String>,
    /// Item schema for `Array`/`Object` fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_schema: Option<String>,
}

impl FieldDefinition {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            description: String::new(),
            required: false,
            default: None,
            constraints: FieldConstraints::default(),
            is_override: false,
            ref_schema: None,
            items_schema: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_ref(mut self, schema_name: impl Into<String>) -> Self {
        self.ref_schema = Some(schema_name.into());
        self
    }

    pub fn with_items(mut self, schema_name: impl Into<String>) -> Self {
        self.items_schema = Some(schema_name.into());
        self
    }

    pub fn overriding(mut self) -> Self {
        self.is_override = true;
        self
    }

    pub fn with_constraints(mut self, constraints: FieldConstraints) -> Self {
        self.constraints = constraints;
        self
    }
}

/// A single validation failure against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub field: Option<String>,
    pub message: String,
}

impl SchemaViolation {
    fn new(field: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            field: field.map(str::to_string),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}: {}", field, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// A named, versioned schema definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub name: String,
    pub version: SchemaVersion,
    pub kind: SchemaKind,
    #[serde(default)]
    pub description: String,
    pub fields: BTreeMap<String, FieldDefinition>,
    #[serde(default)]
    pub required_fields: BTreeSet<String>,
    /// Parent schema name for single inheritance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Cross-schema validation references
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub validation_refs: BTreeSet<String>,
}

impl SchemaDefinition {
    pub fn new(name: impl Into<String>, version: SchemaVersion, kind: SchemaKind) -> Self {
        Self {
            name: name.into(),
            version,
            kind,
            description: String::new(),
            fields: BTreeMap::new(),
            required_fields: BTreeSet::new(),
            parent: None,
            validation_refs: BTreeSet::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, field: FieldDefinition) -> Self {
        let name = name.into();
        if field.required {
            self.required_fields.insert(name.clone());
        }
        self.fields.insert(name, field);
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_validation_ref(mut self, schema_name: impl Into<String>) -> Self {
        self.validation_refs.insert(schema_name.into());
        self
    }

    /// Extracts the direct dependency set.
    ///
    /// Every `SchemaRef` field must carry its `ref_schema`; a missing
    /// reference is a registration error distinct from a cycle. `Array`
    /// and `Object` fields contribute their `items_schema` when set; the
    /// parent and each validation reference contribute one edge.
    pub fn dependencies(&self) -> Result<BTreeSet<String>, PipelineError> {
        let mut deps = BTreeSet::new();
        for (field_name, field) in &self.fields {
            match field.field_type {
                FieldType::SchemaRef => match &field.ref_schema {
                    Some(target) => {
                        deps.insert(target.clone());
                    }
                    None => {
                        return Err(PipelineError::validation(format!(
                            "Missing schema reference in field '{}' of schema '{}'",
                            field_name, self.name
                        )));
                    }
                },
                FieldType::Array | FieldType::Object => {
                    if let Some(items) = &field.items_schema {
                        deps.insert(items.clone());
                    }
                }
                _ => {}
            }
        }
        if let Some(parent) = &self.parent {
            deps.insert(parent.clone());
        }
        deps.extend(self.validation_refs.iter().cloned());
        Ok(deps)
    }

    /// Checks the override rule against a resolved parent schema.
    ///
    /// A field whose name already exists on the parent must carry the
    /// `override` flag; anything else is a construction error, as in the
    /// inheritance contract.
    pub fn check_overrides(&self, parent: &SchemaDefinition) -> Result<(), PipelineError> {
        for (name, field) in &self.fields {
            if parent.fields.contains_key(name) && !field.is_override {
                return Err(PipelineError::validation(format!(
                    "Field '{}' already defined in parent schema '{}'; set override to redefine",
                    name, parent.name
                )));
            }
        }
        Ok(())
    }

    /// Field map with parent fields merged in (child overrides win).
    pub fn merged_fields(&self, parent: Option<&SchemaDefinition>) -> BTreeMap<String, FieldDefinition> {
        let mut merged = match parent {
            Some(p) => p.fields.clone(),
            None => BTreeMap::new(),
        };
        for (name, field) in &self.fields {
            merged.insert(name.clone(), field.clone());
        }
        merged
    }

    /// Validates a JSON object against this schema.
    ///
    /// Returns every violation rather than failing fast: missing required
    /// fields, unknown fields, type mismatches, and constraint violations.
    /// `SchemaRef` fields are not resolved here; cross-schema validation
    /// is the registry's concern.
    pub fn validate_value(&self, data: &serde_json::Value) -> Vec<SchemaViolation> {
        let mut violations = Vec::new();

        let object = match data.as_object() {
            Some(object) => object,
            None => {
                violations.push(SchemaViolation::new(None, "Data must be a JSON object"));
                return violations;
            }
        };

        for required in &self.required_fields {
            if !object.contains_key(required) {
                violations.push(SchemaViolation::new(
                    Some(required),
                    "Missing required field",
                ));
            }
        }

        for (field_name, value) in object {
            let field = match self.fields.get(field_name) {
                Some(field) => field,
                None => {
                    violations.push(SchemaViolation::new(Some(field_name), "Unknown field"));
                    continue;
                }
            };
            self.validate_field(field_name, field, value, &mut violations);
        }

        violations
    }

    fn validate_field(
        &self,
        field_name: &str,
        field: &FieldDefinition,
        value: &serde_json::Value,
        violations: &mut Vec<SchemaViolation>,
    ) {
        use serde_json::Value;

        let type_ok = match field.field_type {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
            FieldType::Null => value.is_null(),
            FieldType::Datetime => matches!(value, Value::String(s)
                if chrono::DateTime::parse_from_rfc3339(s).is_ok()),
            // Referenced-schema values are validated by the registry once
            // the target schema is resolved
            FieldType::SchemaRef => true,
        };
        if !type_ok {
            violations.push(SchemaViolation::new(
                Some(field_name),
                format!("Expected type {}", field.field_type),
            ));
            return;
        }

        let constraints = &field.constraints;
        if let Some(number) = value.as_f64() {
            if let Some(min) = constraints.min {
                if number < min {
                    violations.push(SchemaViolation::new(
                        Some(field_name),
                        format!("Value {} below minimum {}", number, min),
                    ));
                }
            }
            if let Some(max) = constraints.max {
                if number > max {
                    violations.push(SchemaViolation::new(
                        Some(field_name),
                        format!("Value {} above maximum {}", number, max),
                    ));
                }
            }
        }
        if let Some(s) = value.as_str() {
            if let Some(pattern) = &constraints.pattern {
                match regex::Regex::new(pattern) {
                    Ok(re) => {
                        if !re.is_match(s) {
                            violations.push(SchemaViolation::new(
                                Some(field_name),
                                format!("Value does not match pattern '{}'", pattern),
                            ));
                        }
                    }
                    Err(e) => violations.push(SchemaViolation::new(
                        Some(field_name),
                        format!("Invalid constraint pattern: {}", e),
                    )),
                }
            }
            if let Some(min_length) = constraints.min_length {
                if s.chars().count() < min_length {
                    violations.push(SchemaViolation::new(
                        Some(field_name),
                        format!("Length below minimum {}", min_length),
                    ));
                }
            }
            if let Some(max_length) = constraints.max_length {
                if s.chars().count() > max_length {
                    violations.push(SchemaViolation::new(
                        Some(field_name),
                        format!("Length above maximum {}", max_length),
                    ));
                }
            }
        }
        if let Some(items) = value.as_array() {
            if let Some(min_length) = constraints.min_length {
                if items.len() < min_length {
                    violations.push(SchemaViolation::new(
                        Some(field_name),
                        format!("Array length below minimum {}", min_length),
                    ));
                }
            }
            if let Some(max_length) = constraints.max_length {
                if items.len() > max_length {
                    violations.push(SchemaViolation::new(
                        Some(field_name),
                        format!("Array length above maximum {}", max_length),
                    ));
                }
            }
        }
        if let Some(allowed) = &constraints.enum_values {
            if !allowed.contains(value) {
                violations.push(SchemaViolation::new(
                    Some(field_name),
                    "Value not in allowed set",
                ));
            }
        }
    }
}
