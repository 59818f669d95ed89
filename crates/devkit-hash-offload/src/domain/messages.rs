//! # Worker Message Contract
//!
//! Tagged request/response variants exchanged with hash workers.
//!
//! ## Wire Format (JSON, `kind` tag, camelCase fields)
//!
//! ```text
//! Request  { kind: "hash",   requestId, password, rounds, [salt], [variant] }
//! Request  { kind: "verify", requestId, password, hash }
//! Response { kind: "hash",   requestId, result: string, computeTimeMs }
//! Response { kind: "verify", requestId, result: bool }
//! Response { kind: "error",  requestId, error: string }
//! ```

use crate::domain::errors::OffloadError;
use crate::domain::password::Password;
use crate::domain::request_id::RequestId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// HASH OPTIONS
// =============================================================================

/// bcrypt version prefix written into the encoded hash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashVariant {
    #[serde(rename = "2a")]
    TwoA,
    #[default]
    #[serde(rename = "2b")]
    TwoB,
    #[serde(rename = "2x")]
    TwoX,
    #[serde(rename = "2y")]
    TwoY,
}

impl HashVariant {
    /// The version tag as it appears between the first two `$`.
    pub fn tag(self) -> &'static str {
        match self {
            HashVariant::TwoA => "2a",
            HashVariant::TwoB => "2b",
            HashVariant::TwoX => "2x",
            HashVariant::TwoY => "2y",
        }
    }
}

impl fmt::Display for HashVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for HashVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('$') {
            "2a" => Ok(HashVariant::TwoA),
            "2b" => Ok(HashVariant::TwoB),
            "2x" => Ok(HashVariant::TwoX),
            "2y" => Ok(HashVariant::TwoY),
            other => Err(format!("unknown bcrypt variant '{}' (expected 2a, 2b, 2x or 2y)", other)),
        }
    }
}

// =============================================================================
// JOBS (caller side, no request id yet)
// =============================================================================

/// Parameters for a hash job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashParams {
    pub password: Password,
    /// Cost factor. Range is enforced by the worker, not here.
    pub rounds: u32,
    /// Fixed salt, 22 chars of bcrypt base64. Random when absent.
    pub salt: Option<String>,
    pub variant: Option<HashVariant>,
}

/// Parameters for a verify job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyParams {
    pub password: Password,
    pub hash: String,
}

/// A unit of work submitted to the correlator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashJob {
    Hash(HashParams),
    Verify(VerifyParams),
}

impl HashJob {
    /// Hash with a random salt and the default variant.
    pub fn hash(password: impl Into<Password>, rounds: u32) -> Self {
        HashJob::Hash(HashParams {
            password: password.into(),
            rounds,
            salt: None,
            variant: None,
        })
    }

    pub fn verify(password: impl Into<Password>, hash: impl Into<String>) -> Self {
        HashJob::Verify(VerifyParams {
            password: password.into(),
            hash: hash.into(),
        })
    }

    pub fn kind(&self) -> JobKind {
        match self {
            HashJob::Hash(_) => JobKind::Hash,
            HashJob::Verify(_) => JobKind::Verify,
        }
    }

    /// Tag the job with its correlation id.
    pub fn into_request(self, request_id: RequestId) -> HashRequest {
        match self {
            HashJob::Hash(params) => HashRequest::Hash {
                request_id,
                password: params.password,
                rounds: params.rounds,
                salt: params.salt,
                variant: params.variant,
            },
            HashJob::Verify(params) => HashRequest::Verify {
                request_id,
                password: params.password,
                hash: params.hash,
            },
        }
    }
}

/// Discriminant shared by jobs, requests and results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Hash,
    Verify,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Hash => f.write_str("hash"),
            JobKind::Verify => f.write_str("verify"),
        }
    }
}

// =============================================================================
// WIRE MESSAGES
// =============================================================================

/// Request sent to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HashRequest {
    Hash {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        password: Password,
        rounds: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        salt: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variant: Option<HashVariant>,
    },
    Verify {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        password: Password,
        hash: String,
    },
}

impl HashRequest {
    pub fn request_id(&self) -> RequestId {
        match self {
            HashRequest::Hash { request_id, .. } | HashRequest::Verify { request_id, .. } => {
                *request_id
            }
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            HashRequest::Hash { .. } => JobKind::Hash,
            HashRequest::Verify { .. } => JobKind::Verify,
        }
    }
}

/// Response emitted by a worker. Exactly one per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum HashResponse {
    #[serde(rename = "hash")]
    HashResult {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        result: String,
        #[serde(rename = "computeTimeMs")]
        compute_time_ms: u64,
    },
    #[serde(rename = "verify")]
    VerifyResult {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        result: bool,
    },
    #[serde(rename = "error")]
    Failure {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        error: String,
    },
}

impl HashResponse {
    pub fn failure(request_id: RequestId, error: impl Into<String>) -> Self {
        HashResponse::Failure {
            request_id,
            error: error.into(),
        }
    }

    pub fn request_id(&self) -> RequestId {
        match self {
            HashResponse::HashResult { request_id, .. }
            | HashResponse::VerifyResult { request_id, .. }
            | HashResponse::Failure { request_id, .. } => *request_id,
        }
    }

    /// Kind of result carried, `None` for failures.
    pub fn kind(&self) -> Option<JobKind> {
        match self {
            HashResponse::HashResult { .. } => Some(JobKind::Hash),
            HashResponse::VerifyResult { .. } => Some(JobKind::Verify),
            HashResponse::Failure { .. } => None,
        }
    }
}

// =============================================================================
// SETTLED RESULTS
// =============================================================================

/// A computed hash and how long the worker spent on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashOutput {
    pub hash: String,
    pub compute_time_ms: u64,
}

/// Typed payload a resolved submission yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutput {
    Hashed(HashOutput),
    Verified(bool),
}

impl JobOutput {
    pub fn kind(&self) -> JobKind {
        match self {
            JobOutput::Hashed(_) => JobKind::Hash,
            JobOutput::Verified(_) => JobKind::Verify,
        }
    }

    pub fn into_hash(self) -> Result<HashOutput, OffloadError> {
        match self {
            JobOutput::Hashed(output) => Ok(output),
            other => Err(OffloadError::UnexpectedResponse {
                expected: JobKind::Hash,
                actual: other.kind(),
            }),
        }
    }

    pub fn into_verified(self) -> Result<bool, OffloadError> {
        match self {
            JobOutput::Verified(matches) => Ok(matches),
            other => Err(OffloadError::UnexpectedResponse {
                expected: JobKind::Verify,
                actual: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_request_wire_shape() {
        let request = HashJob::hash("test123", 10).into_request(RequestId::from_raw(7));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"kind": "hash", "requestId": 7, "password": "test123", "rounds": 10})
        );
    }

    #[test]
    fn test_hash_request_with_options() {
        let job = HashJob::Hash(HashParams {
            password: "pw".into(),
            rounds: 4,
            salt: Some("......................".into()),
            variant: Some(HashVariant::TwoY),
        });
        let value = serde_json::to_value(job.into_request(RequestId::from_raw(1))).unwrap();
        assert_eq!(value["variant"], "2y");
        assert_eq!(value["salt"], "......................");
    }

    #[test]
    fn test_verify_request_wire_shape() {
        let request = HashJob::verify("pw", "$2b$04$x").into_request(RequestId::from_raw(3));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"kind": "verify", "requestId": 3, "password": "pw", "hash": "$2b$04$x"})
        );
    }

    #[test]
    fn test_response_wire_shapes() {
        let hashed = HashResponse::HashResult {
            request_id: RequestId::from_raw(1),
            result: "h".into(),
            compute_time_ms: 12,
        };
        assert_eq!(
            serde_json::to_value(&hashed).unwrap(),
            json!({"kind": "hash", "requestId": 1, "result": "h", "computeTimeMs": 12})
        );

        let failure = HashResponse::failure(RequestId::from_raw(2), "boom");
        assert_eq!(
            serde_json::to_value(&failure).unwrap(),
            json!({"kind": "error", "requestId": 2, "error": "boom"})
        );

        let parsed: HashResponse =
            serde_json::from_value(json!({"kind": "verify", "requestId": 9, "result": true}))
                .unwrap();
        assert_eq!(parsed.request_id(), RequestId::from_raw(9));
        assert_eq!(parsed.kind(), Some(JobKind::Verify));
    }

    #[test]
    fn test_variant_parse() {
        assert_eq!("2a".parse::<HashVariant>().unwrap(), HashVariant::TwoA);
        assert_eq!("$2y".parse::<HashVariant>().unwrap(), HashVariant::TwoY);
        assert!("3a".parse::<HashVariant>().is_err());
    }

    #[test]
    fn test_output_kind_mismatch() {
        let err = JobOutput::Verified(true).into_hash().unwrap_err();
        assert!(matches!(
            err,
            OffloadError::UnexpectedResponse {
                expected: JobKind::Hash,
                actual: JobKind::Verify
            }
        ));
    }
}
