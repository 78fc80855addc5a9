//! Extractor adapter: one inference call per document, normalised to a plain
//! field map.
//!
//! Whatever shape the model returns, callers get a `Map` with exactly the
//! schema's keys:
//!
//! - a top-level array contributes its first object
//! - keys outside the schema are dropped, missing keys are `null`
//! - text fields hold a string or `null` (numbers and booleans are
//!   stringified, nested structures serialised as JSON)
//! - list fields hold an array of records normalised the same way

use crate::document::{Content, Modality};
use crate::error::InferenceError;
use crate::inference::Inference;
use crate::taxonomy::{Schema, SchemaField};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Result of extracting one document.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractOutcome {
    Extracted(Map<String, Value>),
    /// The call failed or returned unusable output.
    Failed(String),
    /// The call hit its deadline.
    TimedOut { secs: u64 },
}

/// Run extraction for `schema` and normalise the answer.
///
/// Never returns an error: failures are reported in the outcome so one
/// document cannot abort its siblings.
pub async fn extract(
    inference: &dyn Inference,
    content: &Content,
    schema: &Schema,
    modality: Modality,
) -> ExtractOutcome {
    let value = match inference.extract(content, schema, modality).await {
        Ok(v) => v,
        Err(InferenceError::Timeout { secs }) => return ExtractOutcome::TimedOut { secs },
        Err(e) => {
            warn!("Extraction for {} failed: {}", schema.name, e);
            return ExtractOutcome::Failed(e.to_string());
        }
    };
    match normalize(value, schema) {
        Ok(map) => {
            debug!(
                "Extracted {} of {} fields for {}",
                map.values().filter(|v| !v.is_null()).count(),
                schema.fields.len(),
                schema.name
            );
            ExtractOutcome::Extracted(map)
        }
        Err(e) => {
            warn!("Extraction for {} returned unusable data: {}", schema.name, e);
            ExtractOutcome::Failed(e.to_string())
        }
    }
}

/// Convert a raw extraction answer into the schema's field map.
pub fn normalize(value: Value, schema: &Schema) -> Result<Map<String, Value>, InferenceError> {
    let object = match value {
        Value::Object(map) => map,
        Value::Array(items) => items
            .into_iter()
            .find_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .ok_or_else(|| {
                InferenceError::MalformedOutput("array answer contains no object".to_string())
            })?,
        other => {
            return Err(InferenceError::MalformedOutput(format!(
                "expected an object, got {}",
                kind_of(&other)
            )))
        }
    };
    Ok(normalize_record(object, &schema.fields))
}

fn normalize_record(mut object: Map<String, Value>, fields: &[SchemaField]) -> Map<String, Value> {
    fields
        .iter()
        .map(|field| {
            let raw = object.remove(&field.name).unwrap_or(Value::Null);
            let value = match &field.items {
                Some(items) => normalize_list(raw, items),
                None => normalize_text(raw),
            };
            (field.name.clone(), value)
        })
        .collect()
}

fn normalize_text(value: Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                Value::Null
            } else {
                Value::String(s.to_string())
            }
        }
        Value::Number(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        nested => Value::String(nested.to_string()),
    }
}

fn normalize_list(value: Value, items: &[SchemaField]) -> Value {
    match value {
        Value::Array(records) => Value::Array(
            records
                .into_iter()
                .filter_map(|r| match r {
                    Value::Object(map) => Some(Value::Object(normalize_record(map, items))),
                    _ => None,
                })
                .collect(),
        ),
        // A single record where a list was expected.
        Value::Object(map) => Value::Array(vec![Value::Object(normalize_record(map, items))]),
        _ => Value::Null,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id_schema() -> Schema {
        Schema::new(
            "national_id",
            vec![
                SchemaField::text("name", "Full name"),
                SchemaField::text("id_number", "12 digits"),
                SchemaField::text("dob", "Date of birth"),
            ],
        )
    }

    fn invoice_schema() -> Schema {
        Schema::new(
            "invoice",
            vec![
                SchemaField::text("so_hoa_don", "Invoice number"),
                SchemaField::list(
                    "items",
                    "Line items",
                    vec![
                        SchemaField::text("ten", "Item"),
                        SchemaField::text("so_luong", "Quantity"),
                    ],
                ),
            ],
        )
    }

    #[test]
    fn keeps_exactly_schema_keys() {
        let raw = json!({"name": "NGUYEN VAN A", "id_number": 1234567890u64, "extra": "x"});
        let map = normalize(raw, &id_schema()).unwrap();
        assert_eq!(
            Value::Object(map),
            json!({"name": "NGUYEN VAN A", "id_number": "1234567890", "dob": null})
        );
    }

    #[test]
    fn array_answer_uses_first_object() {
        let raw = json!([1, {"name": "A"}, {"name": "B"}]);
        let map = normalize(raw, &id_schema()).unwrap();
        assert_eq!(map["name"], "A");
    }

    #[test]
    fn scalar_answer_is_malformed() {
        let err = normalize(json!("nope"), &id_schema()).unwrap_err();
        assert!(err.to_string().contains("a string"));
    }

    #[test]
    fn list_fields_are_normalised_per_record() {
        let raw = json!({
            "so_hoa_don": "0001234",
            "items": [{"ten": "Gạo", "so_luong": 10, "gia": 1}, "junk", {"ten": " "}]
        });
        let map = normalize(raw, &invoice_schema()).unwrap();
        assert_eq!(
            map["items"],
            json!([{"ten": "Gạo", "so_luong": "10"}, {"ten": null, "so_luong": null}])
        );
    }

    #[test]
    fn single_record_becomes_list() {
        let raw = json!({"items": {"ten": "Muối"}});
        let map = normalize(raw, &invoice_schema()).unwrap();
        assert_eq!(map["items"], json!([{"ten": "Muối", "so_luong": null}]));
        assert_eq!(map["so_hoa_don"], Value::Null);
    }

    #[test]
    fn nested_value_in_text_field_is_serialised() {
        let raw = json!({"name": {"first": "A"}, "dob": true});
        let map = normalize(raw, &id_schema()).unwrap();
        assert_eq!(map["name"], r#"{"first":"A"}"#);
        assert_eq!(map["dob"], "true");
    }
}
