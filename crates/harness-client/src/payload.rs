// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Payloads and the converters that produce them.
//!
//! Every argument, result and memo value crosses the service boundary as a
//! [`Payload`]. A [`DataConverter`] holds an ordered list of
//! [`PayloadConverter`]s; the first converter that accepts a value encodes it,
//! and decoding picks the converter by the payload's encoding. The JSON
//! converter is always present as the fallback.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, Result};

/// Encoding name of the built-in JSON converter.
pub const JSON_ENCODING: &str = "json/plain";

/// An encoded value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Encoding used to produce `data`.
    pub encoding: String,
    /// Encoded bytes.
    pub data: Vec<u8>,
}

impl Payload {
    /// Create a payload.
    pub fn new(encoding: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            encoding: encoding.into(),
            data,
        }
    }
}

/// Converts values to and from one payload encoding.
pub trait PayloadConverter: Send + Sync {
    /// Encoding name written into produced payloads.
    fn encoding(&self) -> &str;

    /// Encode a value. Returns `Ok(None)` when this converter does not handle it.
    fn to_payload(&self, value: &Value) -> Result<Option<Payload>>;

    /// Decode a payload written with this converter's encoding.
    fn from_payload(&self, payload: &Payload) -> Result<Value>;
}

/// Plain JSON encoding; accepts every value.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

impl PayloadConverter for JsonConverter {
    fn encoding(&self) -> &str {
        JSON_ENCODING
    }

    fn to_payload(&self, value: &Value) -> Result<Option<Payload>> {
        Ok(Some(Payload::new(JSON_ENCODING, serde_json::to_vec(value)?)))
    }

    fn from_payload(&self, payload: &Payload) -> Result<Value> {
        Ok(serde_json::from_slice(&payload.data)?)
    }
}

/// Ordered chain of payload converters.
#[derive(Clone)]
pub struct DataConverter {
    converters: Vec<Arc<dyn PayloadConverter>>,
}

impl Default for DataConverter {
    fn default() -> Self {
        Self {
            converters: vec![Arc::new(JsonConverter)],
        }
    }
}

impl fmt::Debug for DataConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataConverter")
            .field("encodings", &self.encodings())
            .finish()
    }
}

impl DataConverter {
    /// Create a converter chain; the JSON converter is appended as the fallback.
    pub fn new(converters: Vec<Arc<dyn PayloadConverter>>) -> Self {
        Self::default().with_converters(converters)
    }

    /// Return a new chain with `converters` tried before the existing ones.
    pub fn with_converters(&self, converters: Vec<Arc<dyn PayloadConverter>>) -> Self {
        let mut chain = converters;
        chain.extend(self.converters.iter().cloned());
        Self { converters: chain }
    }

    /// Encodings known to this chain, in priority order.
    pub fn encodings(&self) -> Vec<&str> {
        self.converters.iter().map(|c| c.encoding()).collect()
    }

    /// Encode a single value.
    pub fn to_payload(&self, value: &Value) -> Result<Payload> {
        for converter in &self.converters {
            if let Some(payload) = converter.to_payload(value)? {
                return Ok(payload);
            }
        }
        Err(ClientError::Serialization(format!(
            "no payload converter accepted value {}",
            value
        )))
    }

    /// Encode a list of values.
    pub fn to_payloads(&self, values: &[Value]) -> Result<Vec<Payload>> {
        values.iter().map(|v| self.to_payload(v)).collect()
    }

    /// Decode a single payload.
    pub fn from_payload(&self, payload: &Payload) -> Result<Value> {
        let converter = self
            .converters
            .iter()
            .find(|c| c.encoding() == payload.encoding)
            .ok_or_else(|| {
                ClientError::Serialization(format!(
                    "no payload converter for encoding {}",
                    payload.encoding
                ))
            })?;
        converter.from_payload(payload)
    }

    /// Decode a list of payloads.
    pub fn from_payloads(&self, payloads: &[Payload]) -> Result<Vec<Value>> {
        payloads.iter().map(|p| self.from_payload(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Stores strings as raw UTF-8 bytes.
    struct RawStringConverter;

    impl PayloadConverter for RawStringConverter {
        fn encoding(&self) -> &str {
            "binary/plain"
        }

        fn to_payload(&self, value: &Value) -> Result<Option<Payload>> {
            Ok(value
                .as_str()
                .map(|s| Payload::new("binary/plain", s.as_bytes().to_vec())))
        }

        fn from_payload(&self, payload: &Payload) -> Result<Value> {
            String::from_utf8(payload.data.clone())
                .map(Value::String)
                .map_err(|e| ClientError::Serialization(e.to_string()))
        }
    }

    #[test]
    fn test_default_chain_is_json() {
        let converter = DataConverter::default();
        assert_eq!(converter.encodings(), vec![JSON_ENCODING]);

        let payload = converter.to_payload(&json!({"a": 1})).unwrap();
        assert_eq!(payload.encoding, JSON_ENCODING);
        assert_eq!(converter.from_payload(&payload).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_custom_converter_takes_priority() {
        let converter = DataConverter::new(vec![Arc::new(RawStringConverter)]);
        assert_eq!(converter.encodings(), vec!["binary/plain", JSON_ENCODING]);

        let text = converter.to_payload(&json!("hello")).unwrap();
        assert_eq!(text.encoding, "binary/plain");
        assert_eq!(text.data, b"hello".to_vec());

        // Non-strings fall through to JSON
        let number = converter.to_payload(&json!(42)).unwrap();
        assert_eq!(number.encoding, JSON_ENCODING);
    }

    #[test]
    fn test_unknown_encoding_fails() {
        let converter = DataConverter::default();
        let err = converter
            .from_payload(&Payload::new("binary/protobuf", vec![1, 2]))
            .unwrap_err();
        assert!(err.to_string().contains("binary/protobuf"));
    }
}
