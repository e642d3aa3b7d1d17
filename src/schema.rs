//! # Schema Registry
//!
//! A runtime mapping from model name to its ordered column descriptors,
//! consulted by insert compilation (auto-generated columns never appear in
//! compiled column lists) and by raw-tuple decoding. Constructed explicitly
//! and passed down; there is no process-wide singleton. Entries initialize
//! lazily, at most once.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::value::ValueKind;

/// One column of a model's table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub kind: ValueKind,
    pub nullable: bool,
    /// Populated by the database (serial keys, defaulted timestamps);
    /// excluded from insert payloads.
    pub auto_generated: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
            auto_generated: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn auto_generated(mut self) -> Self {
        self.auto_generated = true;
        self
    }
}

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    models: RwLock<HashMap<String, Arc<Vec<ColumnDescriptor>>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a registered model's columns.
    pub fn columns(&self, model: &str) -> Option<Arc<Vec<ColumnDescriptor>>> {
        self.models.read().get(model).cloned()
    }

    /// Return the registered columns for `model`, initializing them with
    /// `init` on first access. Later calls return the original entry even
    /// if they race; `init` runs at most once per winning writer.
    pub fn get_or_register<F>(&self, model: &str, init: F) -> Arc<Vec<ColumnDescriptor>>
    where
        F: FnOnce() -> Vec<ColumnDescriptor>,
    {
        if let Some(existing) = self.columns(model) {
            return existing;
        }
        let mut models = self.models.write();
        if let Some(existing) = models.get(model) {
            return existing.clone();
        }
        let columns = Arc::new(init());
        models.insert(model.to_string(), columns.clone());
        columns
    }

    /// Names of auto-generated columns for `model`; empty when unregistered.
    pub fn auto_generated(&self, model: &str) -> Vec<String> {
        self.columns(model)
            .map(|columns| {
                columns
                    .iter()
                    .filter(|c| c.auto_generated)
                    .map(|c| c.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}
