use crate::domain::value_objects::offline::ServerId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// リモートストアから読み出したドキュメント。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteDocument {
    pub id: ServerId,
    pub fields: Map<String, Value>,
}

impl RemoteDocument {
    pub fn new(id: ServerId, fields: Map<String, Value>) -> Self {
        Self { id, fields }
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}
