use crate::{codec, error};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

/// Encode a native last-evaluated key into an opaque cursor.
///
/// The cursor is base64 over the JSON serialization of the native key. It
/// is a transport token: callers must never interpret it, and no ordering
/// is implied.
pub fn encode(last_evaluated_key: &codec::Item) -> String {
    let json = Value::Object(last_evaluated_key.clone()).to_string();
    STANDARD.encode(json)
}

/// Decode an opaque cursor back into the native exclusive-start key.
pub fn decode(cursor: &str) -> error::Result<codec::Item> {
    let bytes = STANDARD
        .decode(cursor)
        .map_err(|source| error::Error::Cursor(Box::new(source)))?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|source| error::Error::Cursor(Box::new(source)))?;
    match value {
        Value::Object(key) => Ok(key),
        _ => Err(error::Error::Cursor("cursor is not a key object".into())),
    }
}

/// Encode a key that may already be an opaque cursor.
///
/// Strings pass through unchanged, supporting idempotent re-encoding of a
/// cursor that was never decoded.
pub fn encode_value(last_evaluated_key: Value) -> error::Result<Option<String>> {
    match last_evaluated_key {
        Value::Null => Ok(None),
        Value::String(cursor) => Ok(Some(cursor)),
        Value::Object(key) => Ok(Some(encode(&key))),
        _ => Err(error::Error::Cursor("cursor is not a key object".into())),
    }
}

/// Decode a cursor that may already be a native key object.
///
/// Objects pass through unchanged, supporting idempotent re-decoding.
pub fn decode_value(exclusive_start_key: Value) -> error::Result<Option<codec::Item>> {
    match exclusive_start_key {
        Value::Null => Ok(None),
        Value::Object(key) => Ok(Some(key)),
        Value::String(cursor) => Ok(Some(decode(&cursor)?)),
        _ => Err(error::Error::Cursor("cursor is not a key object".into())),
    }
}
