//! Activation Code Codec
//!
//! Code format: `PPPP-TTBB-UUUU-CCCC`
//! - `PPPP`: random prefix (2 random bytes, uppercase hex)
//! - `TTBB`: duration tier (`TT`) and low byte of the batch id (`BB`)
//! - `UUUU`: random unique id (2 random bytes, uppercase hex)
//! - `CCCC`: first 4 hex characters of `SHA-256(PPPP + TTBB + UUUU + secret)`
//!
//! The checksum detects typos and tampering. It is not a MAC: anyone holding
//! the secret can mint codes, and 16 bits do not resist a determined attacker.
//!
//! The codec is pure. It proves a code is well-formed and untampered, never
//! that it is unused; that is the persistence layer's job.

use platform::crypto::{constant_time_eq, random_hex_upper, sha256};
use std::fmt;
use thiserror::Error;

/// Characters per group
pub const GROUP_LEN: usize = 4;
/// Length of the canonical textual form, hyphens included
pub const CODE_LEN: usize = GROUP_LEN * 4 + 3;

/// Decoded duration for the `FF` tier
pub const YEAR_DAYS: u32 = 365;
/// Decoded duration for the `FE` tier (any 256..=364 day duration)
pub const LONG_DAYS: u32 = 256;

const TIER_YEAR: &str = "FF";
const TIER_LONG: &str = "FE";

/// Codec-level failures. Client input errors, never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("code must be four hyphen-separated groups of 4 uppercase alphanumeric characters")]
    MalformedFormat,

    #[error("code checksum does not match")]
    ChecksumMismatch,

    #[error("duration must be at least one day")]
    InvalidDuration,
}

/// A well-formed activation code split into its four groups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActivationCode {
    prefix: String,
    encoded_tier: String,
    unique_id: String,
    checksum: String,
}

impl ActivationCode {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn encoded_tier(&self) -> &str {
        &self.encoded_tier
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }
}

impl fmt::Display for ActivationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.prefix, self.encoded_tier, self.unique_id, self.checksum
        )
    }
}

/// Fields recovered from a valid code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCode {
    pub duration_days: u32,
    /// Only `batch_id % 256` survives encoding. The full batch id lives on
    /// the persisted record.
    pub batch_low_byte: u8,
    pub prefix: String,
    pub unique_id: String,
}

/// Two hex characters for the duration tier.
///
/// `>= 365` days collapse to `FF`, `256..=364` to `FE`.
pub fn tier_code(duration_days: u32) -> String {
    if duration_days >= YEAR_DAYS {
        TIER_YEAR.to_string()
    } else if duration_days > 255 {
        TIER_LONG.to_string()
    } else {
        format!("{:02X}", duration_days)
    }
}

/// Two hex characters for the batch. Batch ids alias modulo 256.
pub fn batch_code(batch_id: u32) -> String {
    format!("{:02X}", batch_id % 256)
}

/// Inverse of [`tier_code`] (lossy for durations above 255 days).
pub fn decode_duration(tier: &str) -> Option<u32> {
    match tier {
        TIER_YEAR => Some(YEAR_DAYS),
        TIER_LONG => Some(LONG_DAYS),
        other => u32::from_str_radix(other, 16).ok().filter(|&days| days > 0),
    }
}

/// Shape check only: `^[A-Z0-9]{4}-[A-Z0-9]{4}-[A-Z0-9]{4}-[A-Z0-9]{4}$`.
pub fn is_well_formed(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == CODE_LEN
        && bytes.iter().enumerate().all(|(i, &b)| {
            if i % (GROUP_LEN + 1) == GROUP_LEN {
                b == b'-'
            } else {
                b.is_ascii_uppercase() || b.is_ascii_digit()
            }
        })
}

/// Encoder/decoder bound to one checksum secret.
#[derive(Clone)]
pub struct CodeCodec {
    secret: String,
}

impl fmt::Debug for CodeCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeCodec").finish_non_exhaustive()
    }
}

impl CodeCodec {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Generate a fresh code for `duration_days` in batch `batch_id`.
    pub fn encode(&self, duration_days: u32, batch_id: u32) -> Result<ActivationCode, CodecError> {
        if duration_days == 0 {
            return Err(CodecError::InvalidDuration);
        }

        let prefix = random_hex_upper(2);
        let encoded_tier = format!("{}{}", tier_code(duration_days), batch_code(batch_id));
        let unique_id = random_hex_upper(2);

        Ok(self.assemble(prefix, encoded_tier, unique_id))
    }

    /// Validate a code and recover its fields. Pure: no I/O, no hidden state.
    pub fn decode(&self, code: &str) -> Result<DecodedCode, CodecError> {
        if !is_well_formed(code) {
            return Err(CodecError::MalformedFormat);
        }

        let mut groups = code.split('-');
        let (Some(prefix), Some(encoded_tier), Some(unique_id), Some(checksum)) =
            (groups.next(), groups.next(), groups.next(), groups.next())
        else {
            return Err(CodecError::MalformedFormat);
        };

        let expected = self.checksum(prefix, encoded_tier, unique_id);
        if !constant_time_eq(expected.as_bytes(), checksum.as_bytes()) {
            return Err(CodecError::ChecksumMismatch);
        }

        let duration_days =
            decode_duration(&encoded_tier[..2]).ok_or(CodecError::MalformedFormat)?;
        let batch_low_byte =
            u8::from_str_radix(&encoded_tier[2..], 16).map_err(|_| CodecError::MalformedFormat)?;

        Ok(DecodedCode {
            duration_days,
            batch_low_byte,
            prefix: prefix.to_string(),
            unique_id: unique_id.to_string(),
        })
    }

    /// `SHA-256(prefix + encoded_tier + unique_id + secret)`, first 4 hex chars
    pub fn checksum(&self, prefix: &str, encoded_tier: &str, unique_id: &str) -> String {
        let mut input =
            Vec::with_capacity(prefix.len() + encoded_tier.len() + unique_id.len() + self.secret.len());
        input.extend_from_slice(prefix.as_bytes());
        input.extend_from_slice(encoded_tier.as_bytes());
        input.extend_from_slice(unique_id.as_bytes());
        input.extend_from_slice(self.secret.as_bytes());

        hex::encode_upper(&sha256(&input)[..2])
    }

    /// Seal three groups with their checksum. Callers supply 4-char groups.
    pub(crate) fn assemble(
        &self,
        prefix: String,
        encoded_tier: String,
        unique_id: String,
    ) -> ActivationCode {
        let checksum = self.checksum(&prefix, &encoded_tier, &unique_id);
        ActivationCode {
            prefix,
            encoded_tier,
            unique_id,
            checksum,
        }
    }
}
