use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{AppError, AppResult};

/// A single generated row: field name to scalar JSON value.
pub type Record = Map<String, Value>;

pub const DEFAULT_ROW_COUNT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeHint {
    Text,
    Number,
    Integer,
    Float,
    Email,
    Date,
    DateTime,
    Boolean,
    Phone,
    Address,
    Currency,
    Percentage,
    Url,
    Other(String),
}

impl TypeHint {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "text" | "string" => TypeHint::Text,
            "number" | "numeric" => TypeHint::Number,
            "integer" | "int" => TypeHint::Integer,
            "float" | "decimal" => TypeHint::Float,
            "email" => TypeHint::Email,
            "date" => TypeHint::Date,
            "datetime" | "timestamp" => TypeHint::DateTime,
            "boolean" | "bool" => TypeHint::Boolean,
            "phone" => TypeHint::Phone,
            "address" => TypeHint::Address,
            "currency" | "money" => TypeHint::Currency,
            "percentage" | "percent" => TypeHint::Percentage,
            "url" => TypeHint::Url,
            _ => TypeHint::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TypeHint::Text => "text",
            TypeHint::Number => "number",
            TypeHint::Integer => "integer",
            TypeHint::Float => "float",
            TypeHint::Email => "email",
            TypeHint::Date => "date",
            TypeHint::DateTime => "datetime",
            TypeHint::Boolean => "boolean",
            TypeHint::Phone => "phone",
            TypeHint::Address => "address",
            TypeHint::Currency => "currency",
            TypeHint::Percentage => "percentage",
            TypeHint::Url => "url",
            TypeHint::Other(raw) => raw,
        }
    }
}

impl fmt::Display for TypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TypeHint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TypeHint {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(TypeHint::parse(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<TypeHint>,
}

impl ColumnSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_hint: None,
        }
    }

    pub fn typed(name: &str, type_hint: TypeHint) -> Self {
        Self {
            name: name.to_string(),
            type_hint: Some(type_hint),
        }
    }

    /// Parses the `name[:type]` form used on the command line.
    pub fn from_arg(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((name, hint)) if !hint.trim().is_empty() => Self::typed(name.trim(), TypeHint::parse(hint)),
            Some((name, _)) => Self::new(name.trim()),
            None => Self::new(raw.trim()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub description: String,
    #[serde(default = "default_rows")]
    pub rows: u32,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

fn default_rows() -> u32 {
    DEFAULT_ROW_COUNT
}

impl GenerationRequest {
    pub fn new(description: &str, rows: u32) -> Self {
        Self {
            description: description.to_string(),
            rows,
            columns: Vec::new(),
        }
    }

    pub fn with_columns(mut self, columns: Vec<ColumnSpec>) -> Self {
        self.columns = columns;
        self
    }

    pub fn column_names(&self) -> Option<Vec<String>> {
        if self.columns.is_empty() {
            None
        } else {
            Some(self.columns.iter().map(|c| c.name.clone()).collect())
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.description.trim().is_empty() {
            return Err(AppError::Validation("description is required".to_string()));
        }

        if self.rows == 0 {
            return Err(AppError::Validation("row count must be at least 1".to_string()));
        }

        let mut seen = std::collections::HashSet::new();
        for column in &self.columns {
            if column.name.trim().is_empty() {
                return Err(AppError::Validation("column names cannot be empty".to_string()));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(AppError::Validation(format!("duplicate column name: {}", column.name)));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedMetric {
    pub id: i64,
    pub model_name: String,
    pub task_type: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub latency_ms: f64,
    pub accuracy_score: f64,
    pub timestamp: String,
    pub user_rating: i64,
    pub cost_usd: f64,
}

impl PersistedMetric {
    pub const COLUMNS: [&'static str; 10] = [
        "id",
        "model_name",
        "task_type",
        "input_tokens",
        "output_tokens",
        "latency_ms",
        "accuracy_score",
        "timestamp",
        "user_rating",
        "cost_usd",
    ];

    /// Column list handed to the prompt builder when the remote model is
    /// asked for metric rows.
    pub fn column_specs() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::typed("id", TypeHint::Integer),
            ColumnSpec::typed("model_name", TypeHint::Text),
            ColumnSpec::typed("task_type", TypeHint::Text),
            ColumnSpec::typed("input_tokens", TypeHint::Integer),
            ColumnSpec::typed("output_tokens", TypeHint::Integer),
            ColumnSpec::typed("latency_ms", TypeHint::Float),
            ColumnSpec::typed("accuracy_score", TypeHint::Float),
            ColumnSpec::typed("timestamp", TypeHint::DateTime),
            ColumnSpec::typed("user_rating", TypeHint::Integer),
            ColumnSpec::typed("cost_usd", TypeHint::Currency),
        ]
    }

    /// Maps a recovered remote record onto the stored shape. Missing or
    /// mistyped fields take fixed defaults; the id comes from `fallback_id`
    /// when the record has no usable one.
    pub fn from_record(record: &Record, fallback_id: impl FnOnce() -> AppResult<i64>) -> AppResult<Self> {
        let id = match Self::record_id(record) {
            Some(id) => id,
            None => fallback_id()?,
        };

        Ok(Self {
            id,
            model_name: lookup(record, &["model_name", "model"])
                .and_then(as_string)
                .unwrap_or_else(|| "AI-Generated".to_string()),
            task_type: lookup(record, &["task_type", "task"])
                .and_then(as_string)
                .unwrap_or_else(|| "generated".to_string()),
            input_tokens: lookup(record, &["input_tokens"]).and_then(as_i64).unwrap_or(100),
            output_tokens: lookup(record, &["output_tokens"]).and_then(as_i64).unwrap_or(50),
            latency_ms: lookup(record, &["latency_ms", "latency"]).and_then(as_f64).unwrap_or(200.0),
            accuracy_score: lookup(record, &["accuracy_score", "accuracy"])
                .and_then(as_f64)
                .unwrap_or(0.95),
            timestamp: lookup(record, &["timestamp"])
                .and_then(as_string)
                .unwrap_or_else(|| "2024-01-01".to_string()),
            user_rating: lookup(record, &["user_rating", "rating"])
                .and_then(as_i64)
                .unwrap_or(5)
                .clamp(1, 5),
            cost_usd: lookup(record, &["cost_usd", "cost"]).and_then(as_f64).unwrap_or(0.01),
        })
    }
}

impl PersistedMetric {
    /// The id a remote record carries, read the same lenient way as every
    /// other numeric field (`4001`, `4001.0` and `"4001"` all count).
    pub fn record_id(record: &Record) -> Option<i64> {
        lookup(record, &["id"]).and_then(as_i64)
    }
}

fn lookup<'a>(record: &'a Record, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| record.get(*key)).filter(|v| !v.is_null())
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_start_matches('$').parse::<f64>().ok(),
        _ => None,
    }
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
