use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{AppError, AppResult};
use crate::models::Record;
use crate::services::normalizer::Normalized;

/// Whether recovered records are checked against the request before they are
/// handed back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPolicy {
    /// Trust the model output as recovered.
    #[default]
    Lenient,
    /// Reject nulls, column mismatches, wrong row counts and diagnostic records.
    Strict,
}

pub fn validate_records(
    normalized: &Normalized,
    expected_row_count: usize,
    expected_columns: Option<&[String]>,
    policy: ValidationPolicy,
) -> AppResult<()> {
    if policy == ValidationPolicy::Lenient {
        return Ok(());
    }

    if normalized.strategy.is_degraded() {
        return Err(AppError::Validation(
            "model output could not be parsed into records".to_string(),
        ));
    }

    if normalized.records.len() != expected_row_count {
        return Err(AppError::Validation(format!(
            "expected {} rows, model returned {}",
            expected_row_count,
            normalized.records.len()
        )));
    }

    let expected: Option<BTreeSet<&str>> = expected_columns.map(|cols| cols.iter().map(String::as_str).collect());

    for (index, record) in normalized.records.iter().enumerate() {
        check_record(index, record, expected.as_ref())?;
    }

    Ok(())
}

fn check_record(index: usize, record: &Record, expected: Option<&BTreeSet<&str>>) -> AppResult<()> {
    if let Some((key, _)) = record.iter().find(|(_, value)| value.is_null()) {
        return Err(AppError::Validation(format!("row {} has a null value for {}", index + 1, key)));
    }

    if let Some(expected) = expected {
        let actual: BTreeSet<&str> = record.keys().map(String::as_str).collect();
        if &actual != expected {
            let missing: Vec<&str> = expected.difference(&actual).copied().collect();
            let extra: Vec<&str> = actual.difference(expected).copied().collect();
            return Err(AppError::Validation(format!(
                "row {} does not match the requested columns (missing: [{}], unexpected: [{}])",
                index + 1,
                missing.join(", "),
                extra.join(", ")
            )));
        }
    }

    Ok(())
}
