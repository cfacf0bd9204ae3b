//! Fraud Administration Use Cases

use crate::domain::entities::{AttemptTotals, BannedDevice, FailedAttempt};
use crate::domain::repository::FraudRepository;
use crate::domain::value_objects::DeviceId;
use crate::error::{ActivationError, ActivationResult};
use std::sync::Arc;

/// Failed attempts shown in the fraud report
pub const RECENT_ATTEMPTS_LIMIT: u32 = 100;

/// Unban Device Use Case
pub struct UnbanDeviceUseCase<F>
where
    F: FraudRepository,
{
    fraud_repo: Arc<F>,
}

impl<F> UnbanDeviceUseCase<F>
where
    F: FraudRepository,
{
    pub fn new(fraud_repo: Arc<F>) -> Self {
        Self { fraud_repo }
    }

    /// Delete the ban record. Unbanning a device that is not banned is a
    /// successful no-op. Attempt history is kept.
    ///
    /// Returns whether a ban was removed.
    pub async fn execute(&self, device_id: &str) -> ActivationResult<bool> {
        let device_id = DeviceId::parse(device_id)
            .ok_or_else(|| ActivationError::InvalidRequest("deviceId is required".into()))?;

        let removed = self
            .fraud_repo
            .delete_banned_device(device_id.as_str())
            .await?;

        if removed {
            tracing::info!(device_id = %device_id, "Device unbanned");
        } else {
            tracing::debug!(device_id = %device_id, "Unban requested for device without ban");
        }

        Ok(removed)
    }
}

#[derive(Debug, Clone)]
pub struct FraudReport {
    pub banned_devices: Vec<BannedDevice>,
    pub recent_attempts: Vec<FailedAttempt>,
    pub totals: AttemptTotals,
}

impl FraudReport {
    pub fn total_banned(&self) -> usize {
        self.banned_devices.len()
    }
}

/// Fraud Report Use Case
pub struct FraudReportUseCase<F>
where
    F: FraudRepository,
{
    fraud_repo: Arc<F>,
}

impl<F> FraudReportUseCase<F>
where
    F: FraudRepository,
{
    pub fn new(fraud_repo: Arc<F>) -> Self {
        Self { fraud_repo }
    }

    pub async fn execute(&self) -> ActivationResult<FraudReport> {
        let banned_devices = self.fraud_repo.list_banned_devices().await?;
        let recent_attempts = self
            .fraud_repo
            .recent_failed_attempts(RECENT_ATTEMPTS_LIMIT)
            .await?;
        let totals = self.fraud_repo.failed_attempt_totals().await?;

        Ok(FraudReport {
            banned_devices,
            recent_attempts,
            totals,
        })
    }
}
