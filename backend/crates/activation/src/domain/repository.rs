//! Repository Traits
//!
//! Interfaces for data persistence. Implementations live in the infra layer.
//! Persistence is the single source of truth: callers never cache status.

use crate::domain::entities::{
    Activation, ActivationAttempt, ActivationView, AttemptTotals, Batch, BannedDevice, BatchStats,
    CodeRecord, DailyActivations, FailedAttempt, TierStats,
};
use crate::domain::value_objects::{CodeStatus, FailureReason};
use crate::error::ActivationResult;
use chrono::{DateTime, Utc};

/// Filter for admin code search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeQuery {
    pub batch_id: Option<u32>,
    pub status: Option<CodeStatus>,
    /// Case-insensitive substring of the code text
    pub search: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

/// Filter for the activation history
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivationQuery {
    /// Exact device id
    pub device_id: Option<String>,
    /// Exact code text
    pub code: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

/// Activation code repository trait
#[trait_variant::make(CodeRepository: Send)]
pub trait LocalCodeRepository {
    /// Look up a code by its exact text
    async fn find_code(&self, code: &str) -> ActivationResult<Option<CodeRecord>>;

    /// Atomically move the code from `available` to `used` and store the
    /// activation. Returns false, writing nothing, if the code was no longer
    /// available.
    async fn try_activate(&self, activation: &Activation) -> ActivationResult<bool>;

    /// `available -> revoked`. Returns false if the code was not available.
    async fn mark_revoked(&self, code: &str, reason: &str) -> ActivationResult<bool>;

    async fn find_batch(&self, batch_id: u32) -> ActivationResult<Option<Batch>>;

    /// Which of `codes` already exist, in any batch
    async fn find_existing_codes(&self, codes: &[String]) -> ActivationResult<Vec<String>>;

    /// Store a batch and its codes in one transaction
    async fn create_batch(&self, batch: &Batch, codes: &[CodeRecord]) -> ActivationResult<()>;

    /// Counts for every batch, newest batch first
    async fn batch_stats(&self) -> ActivationResult<Vec<BatchStats>>;

    async fn list_codes(&self, query: &CodeQuery) -> ActivationResult<Vec<CodeRecord>>;

    /// Activation history, newest first
    async fn list_activations(&self, query: &ActivationQuery) -> ActivationResult<Vec<ActivationView>>;

    /// Code counts grouped by duration, shortest first
    async fn tier_stats(&self) -> ActivationResult<Vec<TierStats>>;

    /// Activations at or after `since`, grouped by UTC day and duration,
    /// oldest day first
    async fn daily_activations(&self, since: DateTime<Utc>) -> ActivationResult<Vec<DailyActivations>>;
}

/// Fraud state repository trait (failed attempt log and ban table)
#[trait_variant::make(FraudRepository: Send)]
pub trait LocalFraudRepository {
    async fn find_banned_device(&self, device_id: &str) -> ActivationResult<Option<BannedDevice>>;

    async fn insert_failed_attempt(&self, attempt: &FailedAttempt) -> ActivationResult<()>;

    /// Attempts for `device_id` with `reason` at or after `since`
    async fn count_recent_failed_attempts(
        &self,
        device_id: &str,
        reason: FailureReason,
        since: DateTime<Utc>,
    ) -> ActivationResult<u32>;

    /// Idempotent on `device_id`: an existing ban is left untouched
    async fn insert_banned_device(&self, device: &BannedDevice) -> ActivationResult<()>;

    /// Returns whether a ban record was removed
    async fn delete_banned_device(&self, device_id: &str) -> ActivationResult<bool>;

    /// Newest first
    async fn list_banned_devices(&self) -> ActivationResult<Vec<BannedDevice>>;

    /// Newest first
    async fn recent_failed_attempts(&self, limit: u32) -> ActivationResult<Vec<FailedAttempt>>;

    async fn failed_attempt_totals(&self) -> ActivationResult<AttemptTotals>;
}

/// Activation attempt audit log
#[trait_variant::make(AttemptLogRepository: Send)]
pub trait LocalAttemptLogRepository {
    async fn record_attempt(&self, attempt: &ActivationAttempt) -> ActivationResult<()>;
}
