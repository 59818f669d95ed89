//! JSON framing for worker messages.

use crate::domain::errors::CodecError;
use crate::domain::messages::{HashRequest, HashResponse};
use crate::domain::request_id::RequestId;
use serde_json::Value;

pub fn encode_request(request: &HashRequest) -> Result<String, CodecError> {
    Ok(serde_json::to_string(request)?)
}

pub fn decode_request(frame: &str) -> Result<HashRequest, CodecError> {
    Ok(serde_json::from_str(frame)?)
}

pub fn encode_response(response: &HashResponse) -> Result<String, CodecError> {
    Ok(serde_json::to_string(response)?)
}

pub fn decode_response(frame: &str) -> Result<HashResponse, CodecError> {
    Ok(serde_json::from_str(frame)?)
}

/// Recover `requestId` from a frame that failed to decode, so the failure
/// can still be routed to the one request it belongs to.
pub fn peek_request_id(frame: &str) -> Option<RequestId> {
    let value: Value = serde_json::from_str(frame).ok()?;
    value
        .get("requestId")
        .and_then(Value::as_u64)
        .map(RequestId::from_raw)
}
