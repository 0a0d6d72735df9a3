//! Line-level encode/decode.
//!
//! Inbound lines are read with a tolerant reader: unknown fields are
//! ignored, a missing or unknown `type` is a codec error.

use serde_json::Value;

use super::types::{InboundEvent, Reply};
use crate::error::{Error, Result};

/// Parse a single NDJSON line into an inbound event.
pub fn parse_line(line: &str) -> Result<InboundEvent> {
    let raw: Value = serde_json::from_str(line)?;
    if raw.get("type").and_then(Value::as_str).is_none() {
        return Err(Error::Codec("Missing 'type' field".into()));
    }
    if raw.get("user_id").and_then(Value::as_i64).is_none() {
        return Err(Error::Codec("Missing or non-integer 'user_id' field".into()));
    }
    serde_json::from_value(raw).map_err(|e| Error::Codec(e.to_string()))
}

/// Encode a reply as one NDJSON line (without the trailing newline).
pub fn encode_reply(reply: &Reply) -> Result<String> {
    Ok(serde_json::to_string(reply)?)
}
