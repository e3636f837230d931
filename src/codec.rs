//! Value serialization seam.
//!
//! The stores never interpret value payloads; embedders provide a codec
//! turning their value type into bytes and back. Codecs must be injective:
//! `try_update` on the snapshot store compares encoded bytes.

use bytes::Bytes;

use crate::error::{Result, StoreError};

pub trait ValueCodec: Send + Sync {
    type Value;

    fn encode(&self, value: &Self::Value) -> Bytes;
    fn decode(&self, bytes: &[u8]) -> Result<Self::Value>;
}

/// Identity codec for raw byte values.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl ValueCodec for RawCodec {
    type Value = Bytes;

    fn encode(&self, value: &Bytes) -> Bytes {
        value.clone()
    }

    fn decode(&self, bytes: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(bytes))
    }
}

/// UTF-8 string codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Codec;

impl ValueCodec for Utf8Codec {
    type Value = String;

    fn encode(&self, value: &String) -> Bytes {
        Bytes::copy_from_slice(value.as_bytes())
    }

    fn decode(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| StoreError::Codec(format!("invalid UTF-8 value: {}", e)))
    }
}
