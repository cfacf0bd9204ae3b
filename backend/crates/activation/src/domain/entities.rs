//! Domain Entities
//!
//! Core business entities for the activation domain.

use crate::domain::services::compute_expiry;
use crate::domain::value_objects::{CodeStatus, FailureReason, unit_price_for};
use chrono::{DateTime, NaiveDate, Utc};
use kernel::id::{ActivationAttemptId, ActivationId};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Persisted activation code
#[derive(Debug, Clone, PartialEq)]
pub struct CodeRecord {
    pub code: String,
    pub duration_days: u32,
    pub batch_id: u32,
    pub status: CodeStatus,
    pub device_id: Option<String>,
    pub used_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CodeRecord {
    /// Fresh code as created by batch generation
    pub fn available(code: String, duration_days: u32, batch_id: u32) -> Self {
        Self {
            code,
            duration_days,
            batch_id,
            status: CodeStatus::Available,
            device_id: None,
            used_at: None,
            revoked_reason: None,
            created_at: Utc::now(),
        }
    }

    /// `used_at + duration_days`, only for used codes
    pub fn expiry_date(&self) -> Option<DateTime<Utc>> {
        self.used_at
            .and_then(|used_at| compute_expiry(used_at, self.duration_days))
    }
}

/// Group of codes generated together
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub batch_id: u32,
    pub duration_days: u32,
    pub count: u32,
    pub created_at: DateTime<Utc>,
}

impl Batch {
    pub fn new(batch_id: u32, duration_days: u32, count: u32) -> Self {
        Self {
            batch_id,
            duration_days,
            count,
            created_at: Utc::now(),
        }
    }
}

/// Per-batch code counts, as read from persistence
#[derive(Debug, Clone, PartialEq)]
pub struct BatchStats {
    pub batch: Batch,
    pub total: u64,
    pub used: u64,
    pub revoked: u64,
}

impl BatchStats {
    pub fn available(&self) -> u64 {
        self.total.saturating_sub(self.used + self.revoked)
    }

    pub fn unit_price(&self) -> u64 {
        unit_price_for(self.batch.duration_days)
    }

    pub fn total_value(&self) -> u64 {
        self.total * self.unit_price()
    }

    pub fn earned(&self) -> u64 {
        self.used * self.unit_price()
    }

    pub fn potential(&self) -> u64 {
        self.available() * self.unit_price()
    }
}

/// Successful activation of a code on a device
#[derive(Debug, Clone)]
pub struct Activation {
    pub id: ActivationId,
    pub code: String,
    pub device_id: String,
    pub activated_at: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub token: String,
    /// Client-supplied, informational only
    pub entry_timestamp: i64,
}

/// Audit log entry for any activation outcome past the format check
#[derive(Debug, Clone)]
pub struct ActivationAttempt {
    pub id: ActivationAttemptId,
    pub device_id: String,
    pub code: String,
    pub entry_timestamp: Option<i64>,
    pub validated_at: DateTime<Utc>,
    pub success: bool,
    pub error_message: Option<String>,
    pub client_ip: Option<IpAddr>,
}

impl ActivationAttempt {
    pub fn new(
        device_id: &str,
        code: &str,
        entry_timestamp: Option<i64>,
        client_ip: Option<IpAddr>,
        outcome: Result<(), &str>,
    ) -> Self {
        Self {
            id: ActivationAttemptId::new(),
            device_id: device_id.to_string(),
            code: code.to_string(),
            entry_timestamp,
            validated_at: Utc::now(),
            success: outcome.is_ok(),
            error_message: outcome.err().map(str::to_string),
            client_ip,
        }
    }
}

/// Append-only record of a rejected activation
#[derive(Debug, Clone, PartialEq)]
pub struct FailedAttempt {
    pub device_id: String,
    pub code: String,
    pub reason: FailureReason,
    pub attempted_at: DateTime<Utc>,
}

impl FailedAttempt {
    pub fn new(device_id: &str, code: &str, reason: FailureReason) -> Self {
        Self {
            device_id: device_id.to_string(),
            code: code.to_string(),
            reason,
            attempted_at: Utc::now(),
        }
    }
}

/// Device barred from activating until an admin unbans it
#[derive(Debug, Clone, PartialEq)]
pub struct BannedDevice {
    pub device_id: String,
    pub reason: String,
    pub attempt_count: u32,
    pub banned_at: DateTime<Utc>,
}

impl BannedDevice {
    pub fn new(device_id: &str, reason: impl Into<String>, attempt_count: u32) -> Self {
        Self {
            device_id: device_id.to_string(),
            reason: reason.into(),
            attempt_count,
            banned_at: Utc::now(),
        }
    }
}

/// Failed attempt counts across the whole log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttemptTotals {
    pub total: u64,
    pub by_reason: BTreeMap<FailureReason, u64>,
}

/// Stored activation with the tier and batch of its code
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationView {
    pub id: ActivationId,
    pub code: String,
    pub device_id: String,
    pub activated_at: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub entry_timestamp: i64,
    pub duration_days: u32,
    pub batch_id: u32,
}

/// Code counts for one duration across all batches
#[derive(Debug, Clone, PartialEq)]
pub struct TierStats {
    pub duration_days: u32,
    pub total: u64,
    pub used: u64,
    pub revoked: u64,
}

impl TierStats {
    pub fn empty(duration_days: u32) -> Self {
        Self {
            duration_days,
            total: 0,
            used: 0,
            revoked: 0,
        }
    }

    pub fn available(&self) -> u64 {
        self.total.saturating_sub(self.used + self.revoked)
    }

    pub fn unit_price(&self) -> u64 {
        unit_price_for(self.duration_days)
    }
}

/// Activations of one duration on one UTC day
#[derive(Debug, Clone, PartialEq)]
pub struct DailyActivations {
    pub day: NaiveDate,
    pub duration_days: u32,
    pub count: u64,
}
