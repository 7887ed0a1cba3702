//! Data Validator
//!
//! Quality gate between the provider and the cache. Nothing reaches a cache
//! tier without passing [`DataValidator::validate`].

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::fetch::FetchOperation;
use crate::models::{Frequency, RawPayload, ResourceType, ValidatedPayload};

/// Checks required columns and null density of raw provider tables.
#[derive(Debug, Clone, Copy)]
pub struct DataValidator {
    max_null_ratio: f64,
}

impl Default for DataValidator {
    fn default() -> Self {
        Self::new(0.10)
    }
}

impl DataValidator {
    pub fn new(max_null_ratio: f64) -> Self {
        Self { max_null_ratio }
    }

    pub fn max_null_ratio(&self) -> f64 {
        self.max_null_ratio
    }

    // == Validate ==
    /// Accepts a payload that carries every required column for its kind and
    /// whose required cells are at most `max_null_ratio` null.
    ///
    /// A payload with no rows is accepted: a range without trading days is
    /// a valid, empty answer.
    pub fn validate(
        &self,
        raw: RawPayload,
        resource_type: ResourceType,
    ) -> Result<ValidatedPayload, ValidationError> {
        self.validate_with(raw, resource_type, None)
    }

    /// Validates the payload returned for `operation`.
    pub fn validate_operation(
        &self,
        raw: RawPayload,
        operation: &FetchOperation,
    ) -> Result<ValidatedPayload, ValidationError> {
        self.validate_with(raw, operation.resource_type(), operation.frequency())
    }

    fn validate_with(
        &self,
        raw: RawPayload,
        resource_type: ResourceType,
        frequency: Option<Frequency>,
    ) -> Result<ValidatedPayload, ValidationError> {
        let required = resource_type.required_fields();

        let missing: Vec<String> = required
            .iter()
            .filter(|field| raw.column_index(field).is_none())
            .map(|field| field.to_string())
            .collect();
        if !missing.is_empty() {
            warn!(resource = %resource_type, missing = ?missing, "payload rejected: missing fields");
            return Err(ValidationError::MissingRequiredFields {
                resource: resource_type.as_str().to_string(),
                fields: missing,
            });
        }

        let columns: Vec<usize> = required
            .iter()
            .filter_map(|field| raw.column_index(field))
            .collect();
        let ratio = null_ratio(&raw, &columns);
        if ratio > self.max_null_ratio {
            warn!(resource = %resource_type, ratio, threshold = self.max_null_ratio, "payload rejected: too many nulls");
            return Err(ValidationError::ExcessiveNullRatio {
                ratio,
                threshold: self.max_null_ratio,
            });
        }

        debug!(resource = %resource_type, rows = raw.row_count(), ratio, "payload validated");
        Ok(ValidatedPayload::new(resource_type, frequency, raw))
    }
}

/// Fraction of null cells across the given columns. Short rows count their
/// missing cells as null.
fn null_ratio(raw: &RawPayload, columns: &[usize]) -> f64 {
    let total = raw.items.len() * columns.len();
    if total == 0 {
        return 0.0;
    }
    let nulls = raw
        .items
        .iter()
        .flat_map(|row| columns.iter().map(move |&i| row.get(i)))
        .filter(|cell| matches!(cell, None | Some(Value::Null)))
        .count();
    nulls as f64 / total as f64
}
