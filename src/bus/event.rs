use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bookkeeping attached to every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub source: Option<String>,
    pub correlation_id: String,
}

/// An immutable record of something that happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub payload: Value,
    pub metadata: EventMetadata,
}

/// Caller-supplied values that replace the bus-generated ones.
#[derive(Debug, Clone, Default)]
pub struct MetadataOverrides {
    pub id: Option<String>,
    pub source: Option<String>,
    pub correlation_id: Option<String>,
    pub timestamp: Option<u64>,
}

impl MetadataOverrides {
    pub fn source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

impl Event {
    /// Build an event, generating whatever `overrides` leaves out.
    pub fn new(name: &str, payload: Value, overrides: MetadataOverrides) -> Self {
        Self {
            id: overrides.id.unwrap_or_else(|| format!("evt_{}", random_token(12))),
            name: name.to_string(),
            payload,
            metadata: EventMetadata {
                timestamp: overrides.timestamp.unwrap_or_else(now_ms),
                source: overrides.source,
                correlation_id: overrides
                    .correlation_id
                    .unwrap_or_else(|| random_token(16)),
            },
        }
    }

    /// Read a string field from an object payload.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

/// URL-safe random identifier built from `len` random bytes.
fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random::<u8>()).collect();
    URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
