//! Minimal JSON-schema argument validation.
//!
//! The generated schemas only use the object/properties/required/type
//! subset, so validation walks exactly that. Unknown arguments are
//! rejected: every schema carries `additionalProperties: false`.

use serde_json::Value;

use crate::ToolError;

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

/// Check call arguments against a tool's input schema.
pub fn validate_args(tool: &str, schema: &Value, args: &Value) -> Result<(), ToolError> {
    let invalid = |message: String| ToolError::InvalidArgs {
        tool: tool.to_string(),
        message,
    };

    let args_map = args
        .as_object()
        .ok_or_else(|| invalid("arguments must be an object".to_string()))?;
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !args_map.contains_key(name) {
                return Err(invalid(format!("missing required argument '{name}'")));
            }
        }
    }

    for (name, value) in args_map {
        let Some(spec) = properties.get(name) else {
            return Err(invalid(format!("unknown argument '{name}'")));
        };
        if value.is_null() {
            continue;
        }
        if let Some(expected) = spec.get("type").and_then(Value::as_str) {
            if !type_matches(expected, value) {
                return Err(invalid(format!(
                    "argument '{name}' must be of type {expected}"
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "includeContent": { "type": "boolean" },
                "contentLimit": { "type": "integer" }
            },
            "required": ["id"],
            "additionalProperties": false
        })
    }

    #[test]
    fn accepts_well_formed_args() {
        let args = json!({ "id": "alice", "includeContent": true, "contentLimit": 500 });
        assert!(validate_args("query_character", &schema(), &args).is_ok());
    }

    #[test]
    fn rejects_missing_required() {
        let err = validate_args("query_character", &schema(), &json!({})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgs { .. }));
    }

    #[test]
    fn rejects_wrong_types_and_unknown_keys() {
        assert!(validate_args("query_character", &schema(), &json!({ "id": 7 })).is_err());
        assert!(validate_args(
            "query_character",
            &schema(),
            &json!({ "id": "alice", "bogus": 1 })
        )
        .is_err());
        assert!(validate_args("query_character", &schema(), &json!("nope")).is_err());
    }
}
