pub static TABLE_PROMPT_TEMPLATE: &str = r#"{description}

Generate exactly {rows} rows of realistic data based on this description.
{columns}{format_rules}
Requirements:
- Return ONLY a valid JSON array of objects. No explanations, no extra text before or after the array.
- Do NOT wrap the response in markdown code fences (```json or ```).
- No null values: every field of every object must have a value.
- Data should be realistic and varied.
- Ensure data types are appropriate for each field.

Response (JSON array only):"#;

pub static NAMED_COLUMNS_TEMPLATE: &str = r#"Use exactly these column names: {column_names}
Each object must have exactly {column_count} fields ({column_names}), no more, no fewer.
"#;

pub static FREE_COLUMNS_TEMPLATE: &str = r#"Choose appropriate column names based on the description and use the same names in every object.
"#;
