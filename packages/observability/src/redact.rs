//! Secret redaction for structured log fields.
//!
//! Sessions handle bearer credentials on every request, so the log pipeline
//! masks anything that looks like one regardless of what the caller intended.

use serde_json::Value;

/// Replacement written in place of sensitive values.
pub const REDACTED: &str = "[REDACTED]";

/// Field-name fragments that always mark a value as sensitive.
const DENYLIST_KEYS: &[&str] = &[
    "token",
    "password",
    "authorization",
    "secret",
    "cookie",
    "credential",
];

/// Returns true if a field named `key` must never be logged verbatim.
pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    DENYLIST_KEYS.iter().any(|entry| lower.contains(entry))
}

/// Returns true if `raw` looks like a credential regardless of its field name.
///
/// Catches `Bearer ...` header values and three-segment JWTs.
pub fn looks_like_credential(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed
        .get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("bearer "))
    {
        return true;
    }
    looks_like_jwt(trimmed)
}

fn looks_like_jwt(raw: &str) -> bool {
    let segments: Vec<&str> = raw.split('.').collect();
    segments.len() == 3
        && raw.len() > 40
        && segments.iter().all(|s| {
            !s.is_empty()
                && s
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '=')
        })
}

/// Sanitize one field value, recursing into objects and arrays.
pub fn redact_value(key: &str, value: Value) -> Value {
    if is_sensitive_key(key) {
        return Value::String(REDACTED.to_string());
    }

    match value {
        Value::String(s) if looks_like_credential(&s) => Value::String(REDACTED.to_string()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let v = redact_value(&k, v);
                    (k, v)
                })
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| redact_value(key, v)).collect())
        }
        other => other,
    }
}

/// Mask any bearer credential embedded in free-form message text.
pub fn redact_message(message: &str) -> String {
    let lower = message.to_ascii_lowercase();
    let Some(start) = lower.find("bearer ") else {
        return message.to_string();
    };

    let token_start = start + "bearer ".len();
    let token_end = message[token_start..]
        .find(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == ',')
        .map(|offset| token_start + offset)
        .unwrap_or(message.len());

    format!(
        "{}{}{}",
        &message[..token_start],
        REDACTED,
        redact_message(&message[token_end..])
    )
}
