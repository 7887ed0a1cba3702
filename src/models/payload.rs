//! Payload types
//!
//! Providers return column-oriented tables: a list of field names and one
//! row of JSON values per record. Only the validator can turn a
//! [`RawPayload`] into a [`ValidatedPayload`], and only validated payloads
//! are admitted into the cache.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Frequency, ResourceType};

// == Raw Payload ==
/// Untrusted table as returned by a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPayload {
    /// Column names
    pub fields: Vec<String>,
    /// Rows, each aligned with `fields`
    pub items: Vec<Vec<Value>>,
}

impl RawPayload {
    pub fn new(fields: Vec<String>, items: Vec<Vec<Value>>) -> Self {
        Self { fields, items }
    }

    /// Position of a column by name.
    pub fn column_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    pub fn row_count(&self) -> usize {
        self.items.len()
    }

    /// Serialized size in bytes, used for tier budgets.
    pub fn encoded_len(&self) -> usize {
        serde_json::to_vec(self).map(|bytes| bytes.len()).unwrap_or(0)
    }
}

// == Validated Payload ==
/// A payload that passed structural and quality checks.
///
/// Cloning shares the underlying table, so cache readers get an immutable
/// view that stays valid after the entry is evicted.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPayload {
    inner: Arc<ValidatedInner>,
}

#[derive(Debug, PartialEq)]
struct ValidatedInner {
    resource_type: ResourceType,
    frequency: Option<Frequency>,
    table: RawPayload,
    size_bytes: usize,
}

impl ValidatedPayload {
    /// Wraps a table that has already been checked.
    pub(crate) fn new(
        resource_type: ResourceType,
        frequency: Option<Frequency>,
        table: RawPayload,
    ) -> Self {
        let size_bytes = table.encoded_len();
        Self {
            inner: Arc::new(ValidatedInner {
                resource_type,
                frequency,
                table,
                size_bytes,
            }),
        }
    }

    pub fn resource_type(&self) -> ResourceType {
        self.inner.resource_type
    }

    pub fn frequency(&self) -> Option<Frequency> {
        self.inner.frequency
    }

    /// Upstream updates per day for the data class this payload belongs to.
    pub fn update_frequency(&self) -> f64 {
        self.inner.resource_type.update_frequency(self.inner.frequency)
    }

    pub fn table(&self) -> &RawPayload {
        &self.inner.table
    }

    pub fn fields(&self) -> &[String] {
        &self.inner.table.fields
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.inner.table.items
    }

    pub fn row_count(&self) -> usize {
        self.inner.table.row_count()
    }

    pub fn size_bytes(&self) -> usize {
        self.inner.size_bytes
    }

    /// True when both handles share the same underlying table.
    pub fn ptr_eq(&self, other: &ValidatedPayload) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
