use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 納品書の業務フィールド（顧客・日付・金額など）。同期コアは中身を解釈しない。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RecordPayload(Map<String, Value>);

impl RecordPayload {
    pub fn new(value: Value) -> Result<Self, String> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Err("Record payload cannot be null".to_string()),
            other => Err(format!(
                "Record payload must be a JSON object, got {}",
                json_kind(&other)
            )),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<RecordPayload> for Value {
    fn from(payload: RecordPayload) -> Self {
        Value::Object(payload.0)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
