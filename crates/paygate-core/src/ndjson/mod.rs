//! NDJSON codec for the chat transport bridge.
//!
//! Inbound chat events and outbound replies travel as newline-delimited
//! JSON, one object per line. Document bytes are carried base64-encoded.

mod parser;
mod types;

pub use parser::{encode_reply, parse_line};
pub use types::*;
