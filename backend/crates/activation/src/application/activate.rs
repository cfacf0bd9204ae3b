//! Activate Code Use Case
//!
//! Per-device state (clean or banned) is never stored as a status field. It
//! is derived from the ban table and the failed attempt log on every call.

use crate::application::config::ActivationConfig;
use crate::domain::codec::{CodeCodec, DecodedCode, decode_duration, tier_code};
use crate::domain::entities::{
    Activation, ActivationAttempt, BannedDevice, CodeRecord, FailedAttempt,
};
use crate::domain::repository::{AttemptLogRepository, CodeRepository, FraudRepository};
use crate::domain::services::{FraudDecision, compute_expiry, evaluate_fraud, generate_token};
use crate::domain::value_objects::{CodeStatus, DeviceId, FailureReason};
use crate::error::{ActivationError, ActivationResult};
use chrono::{DateTime, Utc};
use kernel::id::ActivationId;
use std::net::IpAddr;
use std::sync::Arc;

const BAN_REASON: &str = "Repeated attempts with already used codes";

/// Input DTO for activation
#[derive(Debug, Clone)]
pub struct ActivateInput {
    pub code: String,
    /// Client clock, stored for audit only and never used for decisions
    pub entry_timestamp: i64,
    pub device_id: String,
    pub client_ip: Option<IpAddr>,
}

/// Output DTO for activation
#[derive(Debug, Clone)]
pub struct ActivateOutput {
    pub token: String,
    pub expiry_date: DateTime<Utc>,
    pub duration_days: u32,
}

/// Activate Code Use Case
pub struct ActivateUseCase<C, F, L>
where
    C: CodeRepository,
    F: FraudRepository,
    L: AttemptLogRepository,
{
    code_repo: Arc<C>,
    fraud_repo: Arc<F>,
    attempt_log: Arc<L>,
    codec: CodeCodec,
    config: Arc<ActivationConfig>,
}

impl<C, F, L> ActivateUseCase<C, F, L>
where
    C: CodeRepository,
    F: FraudRepository,
    L: AttemptLogRepository,
{
    pub fn new(
        code_repo: Arc<C>,
        fraud_repo: Arc<F>,
        attempt_log: Arc<L>,
        config: Arc<ActivationConfig>,
    ) -> Self {
        Self {
            code_repo,
            fraud_repo,
            attempt_log,
            codec: CodeCodec::new(config.code_secret.clone()),
            config,
        }
    }

    pub async fn execute(&self, input: ActivateInput) -> ActivationResult<ActivateOutput> {
        let device_id = DeviceId::parse(&input.device_id)
            .ok_or_else(|| ActivationError::InvalidRequest("deviceId is required".into()))?;

        // Banned devices are rejected before any code lookup or logging
        if let Some(ban) = self.fraud_repo.find_banned_device(device_id.as_str()).await? {
            tracing::warn!(
                device_id = %device_id,
                banned_at = %ban.banned_at,
                "Activation attempt from banned device"
            );
            return Err(ActivationError::DeviceBanned);
        }

        let decoded = self.codec.decode(&input.code).map_err(|e| {
            tracing::debug!(device_id = %device_id, error = %e, "Malformed activation code");
            ActivationError::InvalidFormat(e)
        })?;

        let record = match self.code_repo.find_code(&input.code).await? {
            Some(record) => record,
            None => return self.reject(&device_id, &input, FailureReason::NotFound).await,
        };

        match record.status {
            CodeStatus::Used => {
                return self
                    .reject(&device_id, &input, FailureReason::AlreadyUsed)
                    .await;
            }
            CodeStatus::Revoked => {
                return self.reject(&device_id, &input, FailureReason::Revoked).await;
            }
            CodeStatus::Available => {}
        }

        warn_on_record_mismatch(&record, &decoded);

        let now = Utc::now();
        let expiry_date = compute_expiry(now, record.duration_days).ok_or_else(|| {
            ActivationError::Internal(format!(
                "expiry out of range for {} days on code {}",
                record.duration_days, record.code
            ))
        })?;
        let activation = Activation {
            id: ActivationId::new(),
            code: record.code.clone(),
            device_id: device_id.as_str().to_string(),
            activated_at: now,
            expiry_date,
            token: generate_token(
                self.config.token_format,
                &self.config.token_secret,
                &record.code,
                device_id.as_str(),
                now,
            ),
            entry_timestamp: input.entry_timestamp,
        };

        if !self.code_repo.try_activate(&activation).await? {
            tracing::warn!(code = %record.code, device_id = %device_id, "Lost activation race");
            return self
                .reject(&device_id, &input, FailureReason::AlreadyUsed)
                .await;
        }

        self.log_attempt(&device_id, &input, Ok(())).await;

        tracing::info!(
            code = %activation.code,
            device_id = %device_id,
            duration_days = record.duration_days,
            batch_id = record.batch_id,
            "Code activated"
        );

        Ok(ActivateOutput {
            token: activation.token,
            expiry_date: activation.expiry_date,
            duration_days: record.duration_days,
        })
    }

    /// Record a rejection, run the fraud policy where it applies, and return
    /// the error the caller sees.
    async fn reject<T>(
        &self,
        device_id: &DeviceId,
        input: &ActivateInput,
        reason: FailureReason,
    ) -> ActivationResult<T> {
        let rejection = match reason {
            FailureReason::NotFound => ActivationError::CodeNotFound,
            FailureReason::AlreadyUsed => ActivationError::AlreadyUsed,
            FailureReason::Revoked => ActivationError::CodeRevoked,
        };

        let message = rejection.to_string();
        self.log_attempt(device_id, input, Err(message.as_str()))
            .await;

        self.fraud_repo
            .insert_failed_attempt(&FailedAttempt::new(
                device_id.as_str(),
                &input.code,
                reason,
            ))
            .await?;

        if !reason.triggers_fraud_check() {
            tracing::debug!(device_id = %device_id, reason = %reason, "Activation rejected");
            return Err(rejection);
        }

        // Server clock, never the client's entry timestamp
        let since = Utc::now() - self.config.fraud_window_chrono();
        let recent = self
            .fraud_repo
            .count_recent_failed_attempts(device_id.as_str(), FailureReason::AlreadyUsed, since)
            .await?;

        tracing::warn!(
            device_id = %device_id,
            code = %input.code,
            reason = %reason,
            attempt_count = recent,
            "Suspicious activation attempt"
        );

        match evaluate_fraud(recent, self.config.ban_threshold) {
            FraudDecision::Allow => Err(rejection),
            FraudDecision::Ban => {
                self.fraud_repo
                    .insert_banned_device(&BannedDevice::new(device_id.as_str(), BAN_REASON, recent))
                    .await?;
                tracing::warn!(device_id = %device_id, attempt_count = recent, "Device banned");
                Err(ActivationError::DeviceBanned)
            }
        }
    }

    /// Best-effort audit log write
    async fn log_attempt(&self, device_id: &DeviceId, input: &ActivateInput, outcome: Result<(), &str>) {
        let attempt = ActivationAttempt::new(
            device_id.as_str(),
            &input.code,
            Some(input.entry_timestamp),
            input.client_ip,
            outcome,
        );
        if let Err(e) = self.attempt_log.record_attempt(&attempt).await {
            tracing::warn!(error = %e, device_id = %device_id, "Failed to record activation attempt");
        }
    }
}

/// The persisted record is authoritative; a disagreement with the code text
/// points at a generation bug or a tampered database row.
fn warn_on_record_mismatch(record: &CodeRecord, decoded: &DecodedCode) {
    let expected_days = decode_duration(&tier_code(record.duration_days));
    if expected_days != Some(decoded.duration_days)
        || u32::from(decoded.batch_low_byte) != record.batch_id % 256
    {
        tracing::warn!(
            code = %record.code,
            record_duration = record.duration_days,
            record_batch = record.batch_id,
            decoded_duration = decoded.duration_days,
            decoded_batch = decoded.batch_low_byte,
            "Code text disagrees with persisted record"
        );
    }
}
