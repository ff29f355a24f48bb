//! Size-bounding for JSON stored in timeline entries.
//!
//! Snapshots keep request payloads and response previews for the debug panel;
//! this keeps them from exploding in size. This is not security redaction,
//! purely size-bounding.

use serde_json::Value;

#[derive(Debug, Clone, Copy)]
pub struct BoundLimits {
    pub max_str: usize,
    pub max_list: usize,
    pub max_depth: usize,
}

impl BoundLimits {
    /// For stored request payloads.
    pub fn payload() -> Self {
        Self {
            max_str: 4_000,
            max_list: 50,
            max_depth: 6,
        }
    }

    /// For small, consistent response previews.
    pub fn preview() -> Self {
        Self {
            max_str: 200,
            max_list: 3,
            max_depth: 3,
        }
    }
}

/// Recursively clamp strings, lists, and nesting depth.
pub fn bound_json(value: &Value, limits: BoundLimits) -> Value {
    bound_rec(value, limits, limits.max_depth)
}

fn bound_rec(value: &Value, limits: BoundLimits, depth: usize) -> Value {
    if depth == 0 {
        return Value::String("__truncated_depth__".into());
    }
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
        Value::String(s) => {
            if s.len() <= limits.max_str {
                value.clone()
            } else {
                let mut cut = s.chars().take(limits.max_str).collect::<String>();
                cut.push_str("...__truncated__");
                Value::String(cut)
            }
        }
        Value::Array(items) => {
            let mut out: Vec<Value> = items
                .iter()
                .take(limits.max_list)
                .map(|v| bound_rec(v, limits, depth - 1))
                .collect();
            if items.len() > limits.max_list {
                out.push(Value::String(format!("__truncated_list_len={}__", items.len())));
            }
            Value::Array(out)
        }
        Value::Object(map) => {
            let out = map
                .iter()
                .map(|(k, v)| (k.clone(), bound_rec(v, limits, depth - 1)))
                .collect();
            Value::Object(out)
        }
    }
}
