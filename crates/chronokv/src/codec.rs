//! Value codecs
//!
//! Typed transaction methods turn values into bytes through a
//! [`SerializationManager`]. Two codecs ship with the crate:
//! - [`JsonCodec`]: human-readable, larger
//! - [`MsgPackCodec`]: binary, compact
//!
//! # Example
//!
//! ```
//! use chronokv::codec::{JsonCodec, SerializationManager};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Account {
//!     owner: String,
//!     balance: i64,
//! }
//!
//! let codec = JsonCodec;
//! let bytes = codec.serialize(&Account { owner: "ada".into(), balance: 10 }).unwrap();
//! let back: Account = codec.deserialize(&bytes).unwrap();
//! assert_eq!(back.balance, 10);
//! ```

use crate::{ChronoError, CodecKind, Result};
use serde::{de::DeserializeOwned, Serialize};

/// Converts values to and from stored bytes
pub trait SerializationManager: Send + Sync {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>>;

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;

    /// Codec name (e.g., "json")
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl SerializationManager for JsonCodec {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| ChronoError::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| ChronoError::Serialization(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

/// MessagePack codec. Structs are encoded as maps so fields can be added later.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl SerializationManager for MsgPackCodec {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(value).map_err(|e| ChronoError::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        rmp_serde::from_slice(bytes).map_err(|e| ChronoError::Serialization(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "msgpack"
    }
}

/// Codec selected by [`CodecKind`]
#[derive(Debug, Clone, Copy)]
pub enum Codec {
    Json(JsonCodec),
    MsgPack(MsgPackCodec),
}

impl From<CodecKind> for Codec {
    fn from(kind: CodecKind) -> Self {
        match kind {
            CodecKind::Json => Codec::Json(JsonCodec),
            CodecKind::MsgPack => Codec::MsgPack(MsgPackCodec),
        }
    }
}

impl SerializationManager for Codec {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            Codec::Json(codec) => codec.serialize(value),
            Codec::MsgPack(codec) => codec.serialize(value),
        }
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self {
            Codec::Json(codec) => codec.deserialize(bytes),
            Codec::MsgPack(codec) => codec.deserialize(bytes),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Codec::Json(codec) => codec.name(),
            Codec::MsgPack(codec) => codec.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u64,
        items: Vec<String>,
        tags: BTreeMap<String, String>,
    }

    fn order() -> Order {
        Order {
            id: 7,
            items: vec!["apple".into(), "pear".into()],
            tags: [("priority".to_string(), "high".to_string())]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn test_codecs_selected_by_kind() {
        for kind in [CodecKind::Json, CodecKind::MsgPack] {
            let codec = Codec::from(kind);
            let bytes = codec.serialize(&order()).unwrap();
            let back: Order = codec.deserialize(&bytes).unwrap();
            assert_eq!(back, order());
        }
        assert_eq!(Codec::from(CodecKind::MsgPack).name(), "msgpack");
    }

    #[test]
    fn test_msgpack_is_more_compact_than_json() {
        let json = JsonCodec.serialize(&order()).unwrap();
        let msgpack = MsgPackCodec.serialize(&order()).unwrap();
        assert!(msgpack.len() < json.len());
    }

    #[test]
    fn test_garbage_is_a_serialization_error() {
        let err = JsonCodec.deserialize::<Order>(b"not json").unwrap_err();
        assert!(matches!(err, ChronoError::Serialization(_)));
        assert!(MsgPackCodec.deserialize::<Order>(&[0xc1]).is_err());
    }
}
