use serde::Serialize;

/// Returned in place of a rendering when the value cannot be serialized.
pub const SERIALIZE_FAILURE: &str = "ERR_SERIALIZE_FAILED";

/// Returned in place of a field value when previously serialized text
/// cannot be parsed back.
pub const EXTRACT_FAILURE: &str = "ERR_EXTRACT_FAILED";

/// Renders `value` as pretty-printed JSON for audit logging. A JSON null
/// renders as an empty string. A serialization failure is logged once and
/// swallowed into [`SERIALIZE_FAILURE`]; this helper observes the request
/// path and must not be able to abort it.
pub fn serialize<T: Serialize + ?Sized>(value: &T) -> String {
    let json = match serde_json::to_value(value) {
        Ok(json) => json,
        Err(err) => {
            tracing::error!(error = %err, "admin_audit.serialize_failed");
            return SERIALIZE_FAILURE.to_string();
        }
    };

    if json.is_null() {
        return String::new();
    }

    serde_json::to_string_pretty(&json).unwrap_or_else(|_| SERIALIZE_FAILURE.to_string())
}

/// Serializes each argument independently and joins the renderings with
/// `", "`. Empty input yields an empty string.
pub fn serialize_args(args: &[String]) -> String {
    args.join(", ")
}

/// Returns the pretty-printed sub-value at `field` inside previously
/// serialized text. Blank input and a missing field both yield `""`; text
/// that no longer parses yields [`EXTRACT_FAILURE`]. Never panics.
pub fn extract_field(text: &str, field: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let root: serde_json::Value = match serde_json::from_str(text) {
        Ok(root) => root,
        Err(err) => {
            tracing::error!(error = %err, field, "admin_audit.extract_failed");
            return EXTRACT_FAILURE.to_string();
        }
    };

    match root.get(field) {
        None => String::new(),
        Some(value) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| EXTRACT_FAILURE.to_string())
        }
    }
}
