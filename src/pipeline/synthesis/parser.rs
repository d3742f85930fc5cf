use serde_json::Value;

use super::validation::SchemaViolation;

/// Extract the JSON object from a provider response.
///
/// Tolerates markdown fences and leading or trailing prose around a
/// single top-level object.
pub fn parse_response(response: &str) -> Result<Value, SchemaViolation> {
    let trimmed = strip_fences(response.trim());

    let candidate = if trimmed.starts_with('{') {
        trimmed
    } else {
        match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if end > start => &trimmed[start..=end],
            _ => return Err(SchemaViolation::NotJson("no JSON object found".into())),
        }
    };

    let value: Value =
        serde_json::from_str(candidate).map_err(|e| SchemaViolation::NotJson(e.to_string()))?;

    if !value.is_object() {
        return Err(SchemaViolation::WrongType {
            path: "$".into(),
            expected: "object",
        });
    }
    Ok(value)
}

fn strip_fences(text: &str) -> &str {
    let mut text = text;
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}
