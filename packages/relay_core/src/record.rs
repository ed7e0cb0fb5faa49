use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::MalformedPayload;

/// Name substituted when a client sends an empty `name`.
pub const UNKNOWN_NAME: &str = "unknown";

/// One accepted chat message.
///
/// The object is kept exactly as the client sent it: key order and number
/// text survive untouched. Only `name` is interpreted, and it is checked
/// and rewritten where it sits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    into = "Map<String, Value>",
    try_from = "Map<String, Value>"
)]
pub struct ChatRecord {
    fields: Map<String, Value>,
}

impl ChatRecord {
    pub fn new(name: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("name".to_string(), Value::String(name.into()));
        Self { fields }
    }

    /// Attach an extra passthrough field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        self.fields
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Every field, `name` included, in arrival order.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Parse a raw inbound frame.
    ///
    /// The frame must be a JSON object carrying a string `name`. The record is
    /// returned as received; see [`ChatRecord::normalize`].
    pub fn parse(raw: &str) -> Result<Self, MalformedPayload> {
        let value: Value = serde_json::from_str(raw).map_err(MalformedPayload::InvalidJson)?;

        let Value::Object(fields) = value else {
            return Err(MalformedPayload::NotAnObject);
        };
        Self::try_from(fields)
    }

    /// Rewrite an empty `name` to [`UNKNOWN_NAME`]. Nothing else is touched.
    pub fn normalize(mut self) -> Self {
        if let Some(Value::String(name)) = self.fields.get_mut("name") {
            if name.is_empty() {
                *name = UNKNOWN_NAME.to_string();
            }
        }
        self
    }

    /// Parse and normalize in one step.
    pub fn accept(raw: &str) -> Result<Self, MalformedPayload> {
        Self::parse(raw).map(Self::normalize)
    }
}

impl TryFrom<Map<String, Value>> for ChatRecord {
    type Error = MalformedPayload;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        match fields.get("name") {
            Some(Value::String(_)) => Ok(Self { fields }),
            Some(_) => Err(MalformedPayload::NameNotString),
            None => Err(MalformedPayload::MissingName),
        }
    }
}

impl From<ChatRecord> for Map<String, Value> {
    fn from(record: ChatRecord) -> Self {
        record.fields
    }
}
