//! API DTOs (Data Transfer Objects)

use crate::application::analytics::{AnalyticsReport, TierBreakdown, TimelinePoint};
use crate::application::manage_codes::RevenueSummary;
use crate::domain::entities::{ActivationView, BannedDevice, BatchStats, CodeRecord, FailedAttempt};
use crate::domain::value_objects::{CodeStatus, FailureReason};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request for POST /api/activate
///
/// Fields are optional so a missing one maps to `InvalidRequest` instead of
/// a framework rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub entry_timestamp: Option<i64>,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Response for POST /api/activate
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateResponse {
    pub success: bool,
    pub token: String,
    /// Epoch milliseconds
    pub expiry_date: i64,
    pub duration_days: u32,
}

/// Request for POST /api/admin/batches
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBatchRequest {
    pub batch_id: u32,
    pub duration_days: u32,
    pub count: u32,
}

/// Response for POST /api/admin/batches
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBatchResponse {
    pub success: bool,
    pub batch_id: u32,
    pub duration_days: u32,
    pub count: u32,
    pub codes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueDto {
    pub total: u64,
    pub earned: u64,
    pub potential: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDto {
    pub batch_id: u32,
    pub duration_days: u32,
    pub count: u32,
    pub created_at: DateTime<Utc>,
    pub total: u64,
    pub used: u64,
    pub revoked: u64,
    pub available: u64,
    pub unit_price: u64,
    pub revenue: RevenueDto,
}

impl From<&BatchStats> for BatchDto {
    fn from(stats: &BatchStats) -> Self {
        Self {
            batch_id: stats.batch.batch_id,
            duration_days: stats.batch.duration_days,
            count: stats.batch.count,
            created_at: stats.batch.created_at,
            total: stats.total,
            used: stats.used,
            revoked: stats.revoked,
            available: stats.available(),
            unit_price: stats.unit_price(),
            revenue: RevenueDto {
                total: stats.total_value(),
                earned: stats.earned(),
                potential: stats.potential(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTotalsDto {
    pub total_codes: u64,
    pub used: u64,
    pub revoked: u64,
    pub available: u64,
    pub revenue: RevenueDto,
}

impl From<&RevenueSummary> for BatchTotalsDto {
    fn from(summary: &RevenueSummary) -> Self {
        Self {
            total_codes: summary.total_codes,
            used: summary.used,
            revoked: summary.revoked,
            available: summary.available,
            revenue: RevenueDto {
                total: summary.total_value,
                earned: summary.earned,
                potential: summary.potential,
            },
        }
    }
}

/// Response for GET /api/admin/batches
#[derive(Debug, Clone, Serialize)]
pub struct BatchesResponse {
    pub batches: Vec<BatchDto>,
    pub totals: BatchTotalsDto,
}

/// Query for GET /api/admin/codes
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCodesParams {
    pub batch_id: Option<u32>,
    pub status: Option<CodeStatus>,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeDto {
    pub code: String,
    pub duration_days: u32,
    pub batch_id: u32,
    pub status: CodeStatus,
    pub device_id: Option<String>,
    pub used_at: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<CodeRecord> for CodeDto {
    fn from(record: CodeRecord) -> Self {
        Self {
            expiry_date: record.expiry_date(),
            code: record.code,
            duration_days: record.duration_days,
            batch_id: record.batch_id,
            status: record.status,
            device_id: record.device_id,
            used_at: record.used_at,
            created_at: record.created_at,
        }
    }
}

/// Response for GET /api/admin/codes
#[derive(Debug, Clone, Serialize)]
pub struct CodesResponse {
    pub codes: Vec<CodeDto>,
    pub limit: u32,
    pub offset: u32,
}

/// Request for POST /api/admin/codes/revoke
#[derive(Debug, Clone, Deserialize)]
pub struct RevokeRequest {
    pub code: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevokeResponse {
    pub success: bool,
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BannedDeviceDto {
    pub device_id: String,
    pub reason: String,
    pub attempt_count: u32,
    pub banned_at: DateTime<Utc>,
}

impl From<BannedDevice> for BannedDeviceDto {
    fn from(device: BannedDevice) -> Self {
        Self {
            device_id: device.device_id,
            reason: device.reason,
            attempt_count: device.attempt_count,
            banned_at: device.banned_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedAttemptDto {
    pub device_id: String,
    pub code: String,
    pub reason: FailureReason,
    pub attempted_at: DateTime<Utc>,
}

impl From<FailedAttempt> for FailedAttemptDto {
    fn from(attempt: FailedAttempt) -> Self {
        Self {
            device_id: attempt.device_id,
            code: attempt.code,
            reason: attempt.reason,
            attempted_at: attempt.attempted_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudStatsDto {
    pub total_banned: usize,
    pub total_attempts: u64,
    /// Keyed by `not_found`, `already_used`, `revoked`
    pub attempts_by_reason: BTreeMap<&'static str, u64>,
}

/// Response for GET /api/admin/fraud
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudResponse {
    pub banned_devices: Vec<BannedDeviceDto>,
    pub recent_attempts: Vec<FailedAttemptDto>,
    pub stats: FraudStatsDto,
}

/// Request for POST /api/admin/fraud/unban
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnbanRequest {
    pub device_id: String,
    /// Only `"unban"` is accepted when present
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnbanResponse {
    pub success: bool,
    pub device_id: String,
    pub removed: bool,
}

/// Query for GET /api/admin/activations
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListActivationsParams {
    pub device_id: Option<String>,
    pub code: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationDto {
    pub id: String,
    pub code: String,
    pub device_id: String,
    pub activated_at: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub entry_timestamp: i64,
    pub duration_days: u32,
    pub batch_id: u32,
}

impl From<ActivationView> for ActivationDto {
    fn from(view: ActivationView) -> Self {
        Self {
            id: view.id.to_string(),
            code: view.code,
            device_id: view.device_id,
            activated_at: view.activated_at,
            expiry_date: view.expiry_date,
            entry_timestamp: view.entry_timestamp,
            duration_days: view.duration_days,
            batch_id: view.batch_id,
        }
    }
}

/// Response for GET /api/admin/activations
#[derive(Debug, Clone, Serialize)]
pub struct ActivationsResponse {
    pub activations: Vec<ActivationDto>,
    pub count: usize,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierDto {
    pub duration_days: u32,
    pub unit_price: u64,
    pub codes: u64,
    pub used: u64,
    pub revenue: u64,
}

impl From<&TierBreakdown> for TierDto {
    fn from(tier: &TierBreakdown) -> Self {
        Self {
            duration_days: tier.duration_days,
            unit_price: tier.unit_price,
            codes: tier.codes,
            used: tier.used,
            revenue: tier.revenue,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineDto {
    pub day: NaiveDate,
    pub activations: u64,
    pub revenue: u64,
}

impl From<&TimelinePoint> for TimelineDto {
    fn from(point: &TimelinePoint) -> Self {
        Self {
            day: point.day,
            activations: point.activations,
            revenue: point.revenue,
        }
    }
}

/// Response for GET /api/admin/analytics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    pub total_batches: usize,
    pub totals: BatchTotalsDto,
    pub conversion_rate: f64,
    pub tiers: Vec<TierDto>,
    pub recent_activations: Vec<ActivationDto>,
    pub timeline: Vec<TimelineDto>,
}

impl From<AnalyticsReport> for AnalyticsResponse {
    fn from(report: AnalyticsReport) -> Self {
        Self {
            total_batches: report.total_batches,
            totals: BatchTotalsDto::from(&report.summary),
            conversion_rate: report.conversion_rate,
            tiers: report.tiers.iter().map(TierDto::from).collect(),
            recent_activations: report
                .recent_activations
                .into_iter()
                .map(ActivationDto::from)
                .collect(),
            timeline: report.timeline.iter().map(TimelineDto::from).collect(),
        }
    }
}
