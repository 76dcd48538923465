//! Recover a JSON array from noisy language-model output.
//!
//! Models wrap answers in markdown fences, add commentary around them and emit trailing
//! commas. This module only guarantees syntactic validity; callers validate the shape of
//! each element.

use serde_json::Value;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no array found")]
    NoArrayFound,
    #[error("malformed json: {0}")]
    MalformedJson(String),
}

/// Extract the outermost JSON array from `raw`.
///
/// Everything before the first `[` and after the last `]` is discarded, so surrounding prose
/// must not itself contain square brackets.
pub fn extract_json_array(raw: &str) -> Result<Vec<Value>, ExtractionError> {
    let text = strip_code_fence(raw);

    let start = text.find('[').ok_or(ExtractionError::NoArrayFound)?;
    let end = text.rfind(']').ok_or(ExtractionError::NoArrayFound)?;
    if start >= end {
        return Err(ExtractionError::NoArrayFound);
    }

    let chunk = &text[start..=end];
    let repaired = strip_trailing_commas(chunk);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(other) => Err(ExtractionError::MalformedJson(format!(
            "expected array, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(ExtractionError::MalformedJson(e.to_string())),
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let mut t = raw.trim();
    if let Some(rest) = t.strip_prefix("```") {
        t = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
    }
    if let Some(rest) = t.strip_suffix("```") {
        t = rest;
    }
    t.trim()
}

/// Drop commas that are immediately followed (modulo whitespace) by `}` or `]`.
///
/// String literals are copied through untouched.
fn strip_trailing_commas(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in s.char_indices() {
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            ',' => {
                let next = s[i + 1..].chars().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(ch);
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
