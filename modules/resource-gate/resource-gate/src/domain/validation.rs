//! Schema-derived payload validation.

use resource_gate_sdk::{AccessError, Field, FieldType, FieldViolation, ResourceSchema, Row};
use serde_json::Value;

/// Validates a sanitized write payload against its schema.
///
/// `writable` names the fields a caller is allowed to supply; only those are
/// checked for presence on create, since every other column is filled in by
/// the server or by storage defaults.
///
/// # Errors
/// Returns `AccessError::ValidationFailed` with every violation found.
pub fn validate_payload<'a>(
    schema: &ResourceSchema,
    payload: &Row,
    writable: impl IntoIterator<Item = &'a String>,
    is_create: bool,
) -> Result<(), AccessError> {
    let mut violations = Vec::new();

    if is_create {
        for name in writable {
            let Some(field) = schema.field(name) else {
                continue;
            };
            if field.required && payload.get(name).is_none_or(Value::is_null) {
                violations.push(FieldViolation::new(name.as_str(), "is required"));
            }
        }
    }

    for (name, value) in payload {
        let Some(field) = schema.field(name) else {
            continue;
        };
        if value.is_null() {
            if field.required && !is_create {
                violations.push(FieldViolation::new(name.as_str(), "must not be null"));
            }
            continue;
        }
        if let Some(message) = check_type(field, value) {
            violations.push(FieldViolation::new(name.as_str(), message));
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(AccessError::ValidationFailed { violations })
    }
}

fn check_type(field: &Field, value: &Value) -> Option<String> {
    let ok = match field.field_type {
        FieldType::String | FieldType::Textarea => value.is_string(),
        FieldType::Number => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::Date => value.is_string() || value.is_number(),
        FieldType::Enum => {
            let options = field.select_options.as_deref().unwrap_or_default();
            return match value.as_str() {
                Some(v) if options.iter().any(|o| o == v) => None,
                _ => Some(format!("must be one of: {}", options.join(", "))),
            };
        }
    };
    (!ok).then(|| format!("must be a {}", field.field_type.as_str()))
}
