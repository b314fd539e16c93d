use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Serialized entity state at the sync boundary. Domain code works with typed
/// structs and converts at the edge; only the engine passes this around.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncPayload(Value);

impl SyncPayload {
    pub fn new(value: Value) -> Result<Self, String> {
        Self::validate(&value)?;
        Ok(Self(value))
    }

    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| format!("Invalid JSON payload: {e}"))?;
        Self::new(value)
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }

    /// Set a single field; the payload must be a JSON object.
    pub fn set_field(&mut self, key: &str, value: Value) -> Result<(), String> {
        match &mut self.0 {
            Value::Object(map) => {
                map.insert(key.to_string(), value);
                Ok(())
            }
            _ => Err("Sync payload is not a JSON object".to_string()),
        }
    }

    pub fn get_field(&self, key: &str) -> Option<&Value> {
        self.0.as_object().and_then(|map| map.get(key))
    }

    fn validate(value: &Value) -> Result<(), String> {
        if value.is_null() {
            return Err("Sync payload cannot be null".to_string());
        }
        Ok(())
    }
}

impl From<SyncPayload> for Value {
    fn from(payload: SyncPayload) -> Self {
        payload.0
    }
}
