//! crates/planner_core/src/document.rs
//!
//! The raw document shape exchanged with the document store, and the
//! conversions between documents and typed domain records.

use crate::ports::{PortError, PortResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A stored document: its id plus the JSON object of fields.
/// The id is never part of `data`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Looks up a top-level field of the document.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Decodes the document into a domain record, injecting the id as `id`.
    pub fn decode<T: DeserializeOwned>(&self) -> PortResult<T> {
        let mut value = self.data.clone();
        if let Value::Object(map) = &mut value {
            map.insert("id".to_string(), Value::String(self.id.clone()));
        }
        serde_json::from_value(value)
            .map_err(|e| PortError::Decode(format!("document {}: {}", self.id, e)))
    }
}

/// Serializes a record into the field object that gets stored, dropping `id`.
pub fn to_fields<T: Serialize>(record: &T) -> PortResult<Value> {
    let mut value = serde_json::to_value(record).map_err(|e| PortError::Decode(e.to_string()))?;
    match &mut value {
        Value::Object(map) => {
            map.remove("id");
            Ok(value)
        }
        _ => Err(PortError::Decode(
            "records must serialize to a JSON object".to_string(),
        )),
    }
}

/// Decodes every document of a snapshot, failing on the first bad one.
pub fn decode_all<T: DeserializeOwned>(docs: &[Document]) -> PortResult<Vec<T>> {
    docs.iter().map(Document::decode).collect()
}

/// Shallow merge of `patch` into `target`: top-level fields of the patch
/// overwrite, everything else is kept.
pub fn merge_fields(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                target.insert(key.clone(), value.clone());
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Item {
        id: String,
        name: String,
    }

    #[test]
    fn decode_injects_the_document_id() {
        let doc = Document::new("abc", json!({ "name": "first" }));
        let item: Item = doc.decode().unwrap();
        assert_eq!(item, Item { id: "abc".into(), name: "first".into() });
    }

    #[test]
    fn to_fields_strips_the_id() {
        let fields = to_fields(&Item { id: "abc".into(), name: "first".into() }).unwrap();
        assert_eq!(fields, json!({ "name": "first" }));
    }

    #[test]
    fn merge_only_overwrites_patched_fields() {
        let mut target = json!({ "firstName": "A", "lastName": "B" });
        merge_fields(&mut target, &json!({ "firstName": "X" }));
        assert_eq!(target, json!({ "firstName": "X", "lastName": "B" }));
    }

    #[test]
    fn decode_reports_missing_fields() {
        let doc = Document::new("abc", json!({}));
        assert!(matches!(doc.decode::<Item>(), Err(PortError::Decode(_))));
    }
}
