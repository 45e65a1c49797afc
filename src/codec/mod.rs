//! Body encoding and decoding.
//!
//! API responses may be gzip-encoded; report files are gzipped even when the
//! storage host does not say so. JSON is parsed with `serde_json`, which keeps
//! integer literals as `u64`/`i64` and therefore preserves 64-bit ids exactly.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use serde_json::Value;
use std::io::{Read, Write};

use crate::errors::{AdvertisingError, AdvertisingResult};
use crate::transport::HttpResponse;
use crate::types::Artifact;

/// Leading bytes of every gzip member.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Returns true if the bytes start with the gzip magic header.
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// Decompresses a gzip buffer.
pub fn gunzip(bytes: &[u8]) -> AdvertisingResult<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| AdvertisingError::decode(format!("gzip decompression failed: {e}")))?;
    Ok(decompressed)
}

/// Compresses a buffer with gzip.
pub fn gzip(bytes: &[u8]) -> AdvertisingResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| AdvertisingError::decode(format!("gzip compression failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| AdvertisingError::decode(format!("gzip compression failed: {e}")))
}

/// Serializes a request body.
pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> AdvertisingResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| AdvertisingError::validation(format!("Invalid request body: {e}")))
}

/// Parses JSON, mapping an empty body to `null`.
pub fn parse_json(bytes: &[u8]) -> AdvertisingResult<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(bytes)?)
}

/// Removes the transfer compression announced by `content-encoding`.
pub fn decode_content(response: &HttpResponse) -> AdvertisingResult<Vec<u8>> {
    let gzipped = response
        .header("content-encoding")
        .is_some_and(|encoding| encoding.eq_ignore_ascii_case("gzip"));

    if gzipped {
        gunzip(&response.body)
    } else {
        Ok(response.body.to_vec())
    }
}

/// Decodes the body of a successful API call.
///
/// A body that is not valid JSON is returned as a JSON string rather than
/// failing the call.
pub fn decode_api_body(response: &HttpResponse) -> AdvertisingResult<Value> {
    let bytes = decode_content(response)?;
    match parse_json(&bytes) {
        Ok(value) => Ok(value),
        Err(_) => Ok(Value::String(String::from_utf8_lossy(&bytes).into_owned())),
    }
}

/// Decodes a downloaded report or snapshot.
///
/// Strips `content-encoding` gzip and then any gzip layer detected by its
/// magic header. The result is parsed as JSON when `always_json` is set or
/// the content type is JSON; otherwise it is returned as text.
pub fn decode_artifact(response: &HttpResponse, always_json: bool) -> AdvertisingResult<Artifact> {
    let mut bytes = decode_content(response)?;
    if is_gzip(&bytes) {
        bytes = gunzip(&bytes)?;
    }

    if always_json || is_json_content_type(response.header("content-type")) {
        return parse_json(&bytes).map(Artifact::Json);
    }

    String::from_utf8(bytes)
        .map(Artifact::Text)
        .map_err(|e| AdvertisingError::decode(format!("Artifact is not valid UTF-8: {e}")))
}

/// Returns true for `application/json` and `+json` media types.
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|media| {
            let media = media.trim().to_ascii_lowercase();
            media == "application/json" || media.ends_with("+json")
        })
        .unwrap_or(false)
}

/// Encodes a JSON object as a URL query string.
///
/// Scalars are rendered as their plain text, arrays repeat the key and `null`
/// produces an empty value.
pub fn query_string(params: &Value) -> AdvertisingResult<String> {
    let map = match params {
        Value::Null => return Ok(String::new()),
        Value::Object(map) => map,
        other => {
            return Err(AdvertisingError::validation(format!(
                "Query parameters must be an object, got {other}"
            )))
        }
    };

    let mut pairs: Vec<(&str, String)> = Vec::with_capacity(map.len());
    for (key, value) in map {
        match value {
            Value::Array(items) => {
                for item in items {
                    pairs.push((key, scalar_text(key, item)?));
                }
            }
            other => pairs.push((key, scalar_text(key, other)?)),
        }
    }

    serde_urlencoded::to_string(&pairs)
        .map_err(|e| AdvertisingError::validation(format!("Invalid query parameters: {e}")))
}

fn scalar_text(key: &str, value: &Value) -> AdvertisingResult<String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Array(_) | Value::Object(_) => Err(AdvertisingError::validation(format!(
            "Query parameter {key} must be a scalar"
        ))),
    }
}
