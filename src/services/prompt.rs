use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::models::{ColumnSpec, TypeHint};
use crate::utils::{FREE_COLUMNS_TEMPLATE, NAMED_COLUMNS_TEMPLATE, TABLE_PROMPT_TEMPLATE};

static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER_REGEX.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").expect("Invalid regex pattern"))
}

/// Substitutes `{key}` slots in one pass over the template, so values that
/// themselves contain braces are inserted verbatim. Unknown slots are kept.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures| {
            values
                .iter()
                .find(|(key, _)| *key == &caps[1])
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Builds the instruction sent to the completion service. The caller has
    /// already rejected empty descriptions.
    pub fn build(&self, description: &str, rows: u32, columns: &[ColumnSpec]) -> String {
        let columns_text = if columns.is_empty() {
            FREE_COLUMNS_TEMPLATE.to_string()
        } else {
            let names = columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ");
            let count = columns.len().to_string();
            fill(NAMED_COLUMNS_TEMPLATE, &[("column_names", names.as_str()), ("column_count", count.as_str())])
        };

        let rows = rows.to_string();
        let format_rules = Self::format_rules(columns);
        fill(
            TABLE_PROMPT_TEMPLATE,
            &[
                ("description", description.trim()),
                ("rows", rows.as_str()),
                ("columns", columns_text.as_str()),
                ("format_rules", format_rules.as_str()),
            ],
        )
    }

    fn format_rules(columns: &[ColumnSpec]) -> String {
        let mut hints: Vec<&TypeHint> = Vec::new();
        for hint in columns.iter().filter_map(|c| c.type_hint.as_ref()) {
            if !hints.contains(&hint) {
                hints.push(hint);
            }
        }

        if hints.is_empty() {
            return String::new();
        }

        let mut text = String::from("\nFormatting rules:");
        for hint in hints {
            let columns_with_hint = columns
                .iter()
                .filter(|c| c.type_hint.as_ref() == Some(hint))
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            text.push_str(&format!("\n- {} ({}): {}", hint, columns_with_hint, Self::rule_for(hint)));
        }
        text.push('\n');
        text
    }

    pub fn rule_for(hint: &TypeHint) -> String {
        match hint {
            TypeHint::Text => "realistic names, descriptions or categories".to_string(),
            TypeHint::Number => "appropriate numeric values, not quoted".to_string(),
            TypeHint::Integer => "whole numbers, not quoted".to_string(),
            TypeHint::Float => "decimal numbers, not quoted".to_string(),
            TypeHint::Email => "valid email address format".to_string(),
            TypeHint::Date => "dates in YYYY-MM-DD format".to_string(),
            TypeHint::DateTime => "ISO-8601 timestamps such as 2024-01-31T14:05:00Z".to_string(),
            TypeHint::Boolean => "true or false, not quoted".to_string(),
            TypeHint::Phone => "realistic phone number format".to_string(),
            TypeHint::Address => "realistic postal addresses".to_string(),
            TypeHint::Currency => "monetary values as numbers with exactly 2 decimals".to_string(),
            TypeHint::Percentage => "numeric values between 0 and 100".to_string(),
            TypeHint::Url => "valid URL format starting with https://".to_string(),
            TypeHint::Other(raw) => format!("appropriate values for {}", raw),
        }
    }
}
