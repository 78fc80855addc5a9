//! Extraction schemas: named sets of fields with descriptions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One field of a schema.
///
/// A field with `items` is a list of records, each shaped by `items`.
/// Every other field is a text scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<SchemaField>>,
}

impl SchemaField {
    pub fn text(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            items: None,
        }
    }

    pub fn list(
        name: impl Into<String>,
        description: impl Into<String>,
        items: Vec<SchemaField>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            items: Some(items),
        }
    }

    pub fn is_list(&self) -> bool {
        self.items.is_some()
    }
}

/// A named extraction contract bound to a document type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub fields: Vec<SchemaField>,
}

impl Schema {
    pub fn new(name: impl Into<String>, fields: Vec<SchemaField>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Render the schema as a JSON template `{field: "description"}`, with
    /// list fields shown as a one-element array of their record template.
    pub fn template(&self) -> Value {
        Value::Object(template_of(&self.fields))
    }
}

fn template_of(fields: &[SchemaField]) -> Map<String, Value> {
    fields
        .iter()
        .map(|f| {
            let v = match &f.items {
                Some(items) => Value::Array(vec![Value::Object(template_of(items))]),
                None => Value::String(f.description.clone()),
            };
            (f.name.clone(), v)
        })
        .collect()
}
