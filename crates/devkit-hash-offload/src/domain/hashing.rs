//! # BCrypt Primitive
//!
//! Synchronous hash/verify used by the worker runtime. Pure CPU work,
//! no I/O. Runtime grows exponentially with the cost factor.

use crate::domain::errors::HashingError;
use crate::domain::messages::{HashOutput, HashVariant};
use crate::domain::password::Password;
use base64::Engine;
use bcrypt::{BcryptError, Version, BASE_64};
use std::time::Instant;
use tracing::debug;

/// Lowest cost bcrypt accepts.
pub const MIN_COST: u32 = 4;

/// Highest cost bcrypt accepts.
pub const MAX_COST: u32 = 31;

/// Length of an encoded salt (16 bytes in bcrypt base64).
pub const SALT_LEN: usize = 22;

/// Length of a full encoded hash, e.g. `$2b$10$` + 53 chars.
pub const HASH_LEN: usize = 60;

const BCRYPT_ALPHABET: &[u8] = b"./ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

fn is_bcrypt_char(byte: u8) -> bool {
    BCRYPT_ALPHABET.contains(&byte)
}

fn to_version(variant: HashVariant) -> Version {
    match variant {
        HashVariant::TwoA => Version::TwoA,
        HashVariant::TwoB => Version::TwoB,
        HashVariant::TwoX => Version::TwoX,
        HashVariant::TwoY => Version::TwoY,
    }
}

/// Decode a 22 char bcrypt-base64 salt into its 16 raw bytes.
pub fn decode_salt(salt: &str) -> Result<[u8; 16], HashingError> {
    if salt.len() != SALT_LEN {
        return Err(HashingError::InvalidSalt(format!(
            "salt must be {} chars of bcrypt base64, got {}",
            SALT_LEN,
            salt.len()
        )));
    }
    if let Some(bad) = salt.bytes().find(|b| !is_bcrypt_char(*b)) {
        return Err(HashingError::InvalidSalt(format!(
            "invalid character '{}' in salt",
            char::from(bad)
        )));
    }

    let bytes = BASE_64
        .decode(salt)
        .map_err(|e| HashingError::InvalidSalt(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| HashingError::InvalidSalt("salt does not decode to 16 bytes".to_string()))
}

/// Hash `password` at `rounds`, with a random salt unless one is given.
///
/// Timing covers only the primitive call; salt decoding happens first.
pub fn hash_password(
    password: &Password,
    rounds: u32,
    salt: Option<&str>,
    variant: Option<HashVariant>,
) -> Result<HashOutput, HashingError> {
    let fixed_salt = salt.map(decode_salt).transpose()?;
    let version = to_version(variant.unwrap_or_default());

    let started = Instant::now();
    let parts = match fixed_salt {
        Some(raw) => bcrypt::hash_with_salt(password.expose(), rounds, raw),
        None => bcrypt::hash_with_result(password.expose(), rounds),
    }
    .map_err(|e| match e {
        BcryptError::CostNotAllowed(cost) => HashingError::InvalidCost {
            rounds: cost,
            min: MIN_COST,
            max: MAX_COST,
        },
        other => HashingError::Bcrypt(other),
    })?;
    let elapsed = started.elapsed();

    Ok(HashOutput {
        hash: parts.format_for_version(version),
        compute_time_ms: elapsed.as_millis() as u64,
    })
}

/// Check `password` against `candidate`.
///
/// A candidate that is not a well-formed bcrypt hash never matches; the
/// format problem is reported as `false`, not as an error.
pub fn verify_password(password: &Password, candidate: &str) -> bool {
    match bcrypt::verify(password.expose(), candidate) {
        Ok(matches) => matches,
        Err(e) => {
            debug!(error = %e, "Candidate hash rejected by bcrypt, treating as mismatch");
            false
        }
    }
}

/// Whether `value` has the canonical encoded shape `$2?$NN$<53 chars>`
/// with a cost bcrypt accepts.
pub fn is_bcrypt_hash(value: &str) -> bool {
    hash_cost(value).is_some()
}

/// Cost factor encoded in a hash, if it has the canonical shape and the
/// cost is within `MIN_COST..=MAX_COST`.
pub fn hash_cost(value: &str) -> Option<u32> {
    let bytes = value.as_bytes();
    let shaped = bytes.len() == HASH_LEN
        && bytes[0] == b'$'
        && bytes[1] == b'2'
        && matches!(bytes[2], b'a' | b'b' | b'x' | b'y')
        && bytes[3] == b'$'
        && bytes[4].is_ascii_digit()
        && bytes[5].is_ascii_digit()
        && bytes[6] == b'$'
        && bytes[7..].iter().all(|b| is_bcrypt_char(*b));
    if !shaped {
        return None;
    }

    let cost: u32 = value.get(4..6)?.parse().ok()?;
    (MIN_COST..=MAX_COST).contains(&cost).then_some(cost)
}
