//! Payload serialization used for handler results, failure bodies and
//! application-defined parameter shapes.

use crate::coerce::Shape;
use crate::error::RestError;
use serde_json::Value;

/// Narrow serializer contract consumed by the dispatcher.
pub trait Serializer: Send + Sync {
    /// Media type written as the default `content-type`
    fn media_type(&self) -> &str;

    /// Charset appended to the default `content-type`
    fn media_encode(&self) -> &str;

    fn serialize(&self, value: &Value) -> Result<String, RestError>;

    /// Parse `content` for a shape the coercion registry does not know.
    fn deserialize(&self, content: &str, shape: &Shape) -> Result<Value, RestError>;
}

/// Pretty-printed JSON in UTF-8.
#[derive(Debug, Clone, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn media_type(&self) -> &str {
        "application/json"
    }

    fn media_encode(&self) -> &str {
        "utf-8"
    }

    fn serialize(&self, value: &Value) -> Result<String, RestError> {
        serde_json::to_string_pretty(value).map_err(|e| RestError::Serialization(e.to_string()))
    }

    fn deserialize(&self, content: &str, shape: &Shape) -> Result<Value, RestError> {
        serde_json::from_str(content).map_err(|e| RestError::coercion(content, shape.to_string(), e))
    }
}
