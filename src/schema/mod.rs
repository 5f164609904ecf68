//! Schema fragments contributed by feature modules
//!
//! A module declares the shape of the records it owns as named fragments.
//! When a workspace connection is composed, fragments from every resolved
//! module are merged additively into one schema per name; a module may also
//! inject fragments into schemas owned by *other* modules, applied only
//! when the target module is part of the resolved set.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Type of a single schema field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Timestamp,
    /// Free-form nested document
    Map,
    /// Reference to a record of another schema
    Reference { of: String },
    /// Homogeneous list of another field type
    List { of: Box<FieldType> },
}

/// A single field declaration inside a schema fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    /// Fields with `select = false` are excluded from default reads
    /// (private credentials and the like)
    #[serde(default = "default_select")]
    pub select: bool,
}

fn default_select() -> bool {
    true
}

impl FieldSpec {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            select: true,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unselected(mut self) -> Self {
        self.select = false;
        self
    }
}

/// A named set of fields contributed to one schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaFragment {
    pub fields: HashMap<String, FieldSpec>,
}

impl SchemaFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    pub fn add_field(&mut self, name: impl Into<String>, spec: FieldSpec) {
        self.fields.insert(name.into(), spec);
    }
}

/// Merge `incoming` into `existing`, returning the merged fragment.
///
/// Merging is additive: fields only named by one side survive untouched.
/// A field named by both sides takes the incoming definition, so fragments
/// applied later in module-resolution order override earlier ones.
pub fn merge_fragment(existing: &SchemaFragment, incoming: &SchemaFragment) -> SchemaFragment {
    let mut merged = existing.clone();
    for (name, spec) in &incoming.fields {
        merged.fields.insert(name.clone(), spec.clone());
    }
    merged
}

/// Everything a module contributes schema-wise: its own fragments plus
/// fragments injected into other modules' schemas.
#[derive(Debug, Clone, Default)]
pub struct SchemaContribution {
    /// Schema name -> fragment
    pub own: HashMap<String, SchemaFragment>,
    /// Target module name (normalized lowercase) -> schema name -> fragment
    pub injects: HashMap<String, HashMap<String, SchemaFragment>>,
}

impl SchemaContribution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, name: impl Into<String>, fragment: SchemaFragment) -> Self {
        self.own.insert(name.into(), fragment);
        self
    }

    /// Contribute a fragment to a schema owned by another module. The
    /// target module name is normalized at registration time.
    pub fn with_inject(
        mut self,
        target_module: &str,
        schema_name: impl Into<String>,
        fragment: SchemaFragment,
    ) -> Self {
        self.injects
            .entry(target_module.to_lowercase())
            .or_default()
            .insert(schema_name.into(), fragment);
        self
    }
}
