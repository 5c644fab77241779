//! Record payload: a JSON tag header, a newline, then the raw body.
//!
//! An empty payload is valid and decodes to no tags and an empty body; it is
//! what a forcing round commits when no real value was ever accepted.

use serde_json::{Map, Value};

use crate::errors::{LogDbError, Result};

pub type Tags = Map<String, Value>;

pub fn encode(tags: &Tags, body: &[u8]) -> Result<Vec<u8>> {
    let mut buf = serde_json::to_vec(tags)?;
    buf.reserve(body.len() + 1);
    buf.push(b'\n');
    buf.extend_from_slice(body);
    Ok(buf)
}

pub fn decode(buf: &[u8]) -> Result<(Tags, Vec<u8>)> {
    if buf.is_empty() {
        return Ok((Tags::new(), Vec::new()));
    }
    let split = buf
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| LogDbError::MalformedPayload("missing tag header".to_string()))?;
    let tags: Value = serde_json::from_slice(&buf[..split])?;
    match tags {
        Value::Object(tags) => Ok((tags, buf[split + 1..].to_vec())),
        other => Err(LogDbError::MalformedPayload(format!(
            "tag header is not an object: {}",
            other
        ))),
    }
}

/// String value of a tag, or "" when absent.
pub fn tag_str<'a>(tags: &'a Tags, name: &str) -> &'a str {
    tags.get(name).and_then(Value::as_str).unwrap_or("")
}
