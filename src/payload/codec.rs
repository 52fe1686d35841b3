use crate::payload::{FieldValue, Payload};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current wire format version
pub const FORMAT_VERSION: u8 = 1;

const TAG_STR: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_LONG: u8 = 3;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Failed to encode payload: {0}")]
    EncodeError(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid hex string: {0}")]
    InvalidHex(String),

    #[error("Invalid base64 string: {0}")]
    InvalidBase64(String),
}

/// Self-describing envelope: field count comes from the sequence prefix,
/// every field carries a type tag and length-prefixed content.
#[derive(Serialize, Deserialize)]
struct WirePayload {
    version: u8,
    fields: Vec<WireField>,
}

#[derive(Serialize, Deserialize)]
struct WireField {
    key: String,
    tag: u8,
    content: Vec<u8>,
}

impl WireField {
    fn from_value(key: &str, value: &FieldValue) -> Self {
        let (tag, content) = match value {
            FieldValue::Str(s) => (TAG_STR, s.as_bytes().to_vec()),
            FieldValue::Int(v) => (TAG_INT, v.to_le_bytes().to_vec()),
            FieldValue::Long(v) => (TAG_LONG, v.to_le_bytes().to_vec()),
        };
        Self {
            key: key.to_string(),
            tag,
            content,
        }
    }

    fn into_value(self) -> Result<(String, FieldValue), CodecError> {
        let value = match self.tag {
            TAG_STR => {
                let s = String::from_utf8(self.content).map_err(|_| {
                    CodecError::MalformedPayload(format!("field '{}' is not valid UTF-8", self.key))
                })?;
                FieldValue::Str(s)
            }
            TAG_INT => {
                let bytes: [u8; 4] = self.content.as_slice().try_into().map_err(|_| {
                    CodecError::MalformedPayload(format!(
                        "field '{}' has {} bytes, int needs 4",
                        self.key,
                        self.content.len()
                    ))
                })?;
                FieldValue::Int(i32::from_le_bytes(bytes))
            }
            TAG_LONG => {
                let bytes: [u8; 8] = self.content.as_slice().try_into().map_err(|_| {
                    CodecError::MalformedPayload(format!(
                        "field '{}' has {} bytes, long needs 8",
                        self.key,
                        self.content.len()
                    ))
                })?;
                FieldValue::Long(i64::from_le_bytes(bytes))
            }
            other => {
                return Err(CodecError::MalformedPayload(format!(
                    "field '{}' has unknown type tag {}",
                    self.key, other
                )))
            }
        };
        Ok((self.key, value))
    }
}

/// Codec for serializing/deserializing payloads
pub struct PayloadCodec;

impl PayloadCodec {
    /// Encode a payload to binary bytes (postcard framing)
    ///
    /// Fails on an empty key, which `decode` would reject.
    pub fn encode(payload: &Payload) -> Result<Vec<u8>, CodecError> {
        if payload.iter().any(|(key, _)| key.is_empty()) {
            return Err(CodecError::EncodeError("Empty key".to_string()));
        }

        let wire = WirePayload {
            version: FORMAT_VERSION,
            fields: payload
                .iter()
                .map(|(key, value)| WireField::from_value(key, value))
                .collect(),
        };
        postcard::to_allocvec(&wire).map_err(|e| CodecError::EncodeError(e.to_string()))
    }

    /// Decode a payload from binary bytes
    pub fn decode(bytes: &[u8]) -> Result<Payload, CodecError> {
        let (wire, rest): (WirePayload, &[u8]) = postcard::take_from_bytes(bytes)
            .map_err(|e| CodecError::MalformedPayload(e.to_string()))?;

        if !rest.is_empty() {
            return Err(CodecError::MalformedPayload(format!(
                "{} trailing bytes",
                rest.len()
            )));
        }
        if wire.version != FORMAT_VERSION {
            return Err(CodecError::MalformedPayload(format!(
                "unsupported format version {}",
                wire.version
            )));
        }

        let fields = wire
            .fields
            .into_iter()
            .map(WireField::into_value)
            .collect::<Result<Vec<_>, _>>()?;

        Payload::from_fields(fields).map_err(|e| CodecError::MalformedPayload(e.to_string()))
    }

    /// Encode to hex string
    pub fn encode_hex(payload: &Payload) -> Result<String, CodecError> {
        Ok(hex::encode(Self::encode(payload)?))
    }

    /// Decode from hex string
    pub fn decode_hex(hex_str: &str) -> Result<Payload, CodecError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|e| CodecError::InvalidHex(e.to_string()))?;
        Self::decode(&bytes)
    }

    /// Encode to base64 string (URL-safe, no padding)
    pub fn encode_base64(payload: &Payload) -> Result<String, CodecError> {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
        Ok(URL_SAFE_NO_PAD.encode(Self::encode(payload)?))
    }

    /// Decode from base64 string
    pub fn decode_base64(b64_str: &str) -> Result<Payload, CodecError> {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
        let bytes = URL_SAFE_NO_PAD
            .decode(b64_str.trim())
            .map_err(|e| CodecError::InvalidBase64(e.to_string()))?;
        Self::decode(&bytes)
    }
}
