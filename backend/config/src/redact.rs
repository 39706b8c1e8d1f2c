//! Config redaction: produce safe-to-share config snapshots by masking secrets.

use serde_json::Value;

use crate::schema::SnapConfig;

/// Keys whose string values are secrets.
static SENSITIVE_KEYS: &[&str] = &[
    "apiKey",
    "api_key",
    "apikey",
    "token",
    "accessToken",
    "access_token",
    "secret",
    "password",
];

/// Redact a config, replacing sensitive fields with a short hint.
///
/// The resulting value is safe to log or print from `studysnap doctor`.
pub fn redact(config: &SnapConfig) -> Value {
    let value = serde_json::to_value(config).unwrap_or(Value::Null);
    redact_value(&value)
}

/// Redact an arbitrary JSON value tree.
pub fn redact_value(value: &Value) -> Value {
    redact_recursive(value, "")
}

fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

fn redact_string(s: &str, key: &str) -> Value {
    if is_sensitive_key(key) && !s.is_empty() {
        // Preserve a length hint: first 4 chars + ***
        let hint = if s.chars().count() > 8 {
            format!("{}***", s.chars().take(4).collect::<String>())
        } else {
            "***".to_string()
        };
        return Value::String(hint);
    }
    Value::String(s.to_string())
}

fn redact_recursive(value: &Value, key: &str) -> Value {
    match value {
        Value::String(s) => redact_string(s, key),
        Value::Array(arr) => Value::Array(arr.iter().map(|v| redact_recursive(v, key)).collect()),
        Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (k, v) in map {
                result.insert(k.clone(), redact_recursive(v, k));
            }
            Value::Object(result)
        }
        other => other.clone(),
    }
}
