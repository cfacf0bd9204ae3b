//! HTTP Handlers

use crate::application::activate::{ActivateInput, ActivateUseCase};
use crate::application::analytics::{
    AnalyticsUseCase, ListActivationsInput, ListActivationsUseCase,
};
use crate::application::config::ActivationConfig;
use crate::application::generate_batch::{GenerateBatchInput, GenerateBatchUseCase};
use crate::application::manage_codes::{
    BatchReportUseCase, ListCodesInput, ListCodesUseCase, RevokeCodeUseCase,
};
use crate::application::manage_fraud::{FraudReportUseCase, UnbanDeviceUseCase};
use crate::domain::codec::{CodecError, is_well_formed};
use crate::domain::repository::{AttemptLogRepository, CodeRepository, FraudRepository};
use crate::domain::value_objects::FailureReason;
use crate::error::{ActivationError, ActivationResult};
use crate::presentation::dto::{
    ActivateRequest, ActivateResponse, ActivationDto, ActivationsResponse, AnalyticsResponse,
    BatchDto, BatchTotalsDto, BatchesResponse, CodeDto, CodesResponse, FraudResponse,
    FraudStatsDto, GenerateBatchRequest, GenerateBatchResponse, ListActivationsParams,
    ListCodesParams, RevokeRequest, RevokeResponse, UnbanRequest, UnbanResponse,
};
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use platform::client::extract_client_ip;
use std::net::SocketAddr;
use std::sync::Arc;

const DEFAULT_REVOKE_REASON: &str = "Revoked by admin";

/// Everything the handlers need from one repository
pub trait ActivationStore:
    CodeRepository + FraudRepository + AttemptLogRepository + Clone + Send + Sync + 'static
{
}

impl<T> ActivationStore for T where
    T: CodeRepository + FraudRepository + AttemptLogRepository + Clone + Send + Sync + 'static
{
}

/// Shared state for activation handlers
#[derive(Clone)]
pub struct ActivationAppState<R>
where
    R: ActivationStore,
{
    pub repo: Arc<R>,
    pub config: Arc<ActivationConfig>,
}

/// Unwrap a JSON body, turning framework rejections into `InvalidRequest`
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ActivationResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ActivationError::InvalidRequest(e.body_text()))
}

fn required(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.trim().is_empty())
}

/// POST /api/activate
pub async fn activate<R>(
    State(state): State<ActivationAppState<R>>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    payload: Result<Json<ActivateRequest>, JsonRejection>,
) -> ActivationResult<Json<ActivateResponse>>
where
    R: ActivationStore,
{
    let req = json_body(payload)?;

    let (Some(code), Some(device_id), Some(entry_timestamp)) = (
        required(req.code),
        required(req.device_id),
        req.entry_timestamp,
    ) else {
        return Err(ActivationError::InvalidRequest(
            "code, entryTimestamp and deviceId are required".into(),
        ));
    };

    // Shape check before the request reaches the workflow
    if !is_well_formed(&code) {
        return Err(ActivationError::InvalidFormat(CodecError::MalformedFormat));
    }

    let use_case = ActivateUseCase::new(
        state.repo.clone(),
        state.repo.clone(),
        state.repo.clone(),
        state.config.clone(),
    );

    let output = use_case
        .execute(ActivateInput {
            code,
            entry_timestamp,
            device_id,
            client_ip: extract_client_ip(&headers, Some(addr.ip())),
        })
        .await?;

    Ok(Json(ActivateResponse {
        success: true,
        token: output.token,
        expiry_date: output.expiry_date.timestamp_millis(),
        duration_days: output.duration_days,
    }))
}

/// POST /api/admin/batches
pub async fn generate_batch<R>(
    State(state): State<ActivationAppState<R>>,
    payload: Result<Json<GenerateBatchRequest>, JsonRejection>,
) -> ActivationResult<impl IntoResponse>
where
    R: ActivationStore,
{
    let req = json_body(payload)?;

    let use_case = GenerateBatchUseCase::new(state.repo.clone(), state.config.clone());
    let output = use_case
        .execute(GenerateBatchInput {
            batch_id: req.batch_id,
            duration_days: req.duration_days,
            count: req.count,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(GenerateBatchResponse {
            success: true,
            batch_id: output.batch.batch_id,
            duration_days: output.batch.duration_days,
            count: output.batch.count,
            codes: output.codes,
        }),
    ))
}

/// GET /api/admin/batches
pub async fn list_batches<R>(
    State(state): State<ActivationAppState<R>>,
) -> ActivationResult<Json<BatchesResponse>>
where
    R: ActivationStore,
{
    let report = BatchReportUseCase::new(state.repo.clone()).execute().await?;

    Ok(Json(BatchesResponse {
        batches: report.batches.iter().map(BatchDto::from).collect(),
        totals: BatchTotalsDto::from(&report.summary),
    }))
}

/// GET /api/admin/codes
pub async fn list_codes<R>(
    State(state): State<ActivationAppState<R>>,
    params: Result<Query<ListCodesParams>, QueryRejection>,
) -> ActivationResult<Json<CodesResponse>>
where
    R: ActivationStore,
{
    let Query(params) = params.map_err(|e| ActivationError::InvalidRequest(e.body_text()))?;

    let (query, codes) = ListCodesUseCase::new(state.repo.clone())
        .execute(ListCodesInput {
            batch_id: params.batch_id,
            status: params.status,
            search: params.search,
            limit: params.limit,
            offset: params.offset,
        })
        .await?;

    Ok(Json(CodesResponse {
        codes: codes.into_iter().map(CodeDto::from).collect(),
        limit: query.limit,
        offset: query.offset,
    }))
}

/// GET /api/admin/activations
pub async fn list_activations<R>(
    State(state): State<ActivationAppState<R>>,
    params: Result<Query<ListActivationsParams>, QueryRejection>,
) -> ActivationResult<Json<ActivationsResponse>>
where
    R: ActivationStore,
{
    let Query(params) = params.map_err(|e| ActivationError::InvalidRequest(e.body_text()))?;

    let (query, activations) = ListActivationsUseCase::new(state.repo.clone())
        .execute(ListActivationsInput {
            device_id: params.device_id,
            code: params.code,
            limit: params.limit,
            offset: params.offset,
        })
        .await?;

    Ok(Json(ActivationsResponse {
        count: activations.len(),
        activations: activations.into_iter().map(ActivationDto::from).collect(),
        limit: query.limit,
        offset: query.offset,
    }))
}

/// GET /api/admin/analytics
pub async fn analytics<R>(
    State(state): State<ActivationAppState<R>>,
) -> ActivationResult<Json<AnalyticsResponse>>
where
    R: ActivationStore,
{
    let report = AnalyticsUseCase::new(state.repo.clone()).execute().await?;
    Ok(Json(AnalyticsResponse::from(report)))
}

/// POST /api/admin/codes/revoke
pub async fn revoke_code<R>(
    State(state): State<ActivationAppState<R>>,
    payload: Result<Json<RevokeRequest>, JsonRejection>,
) -> ActivationResult<Json<RevokeResponse>>
where
    R: ActivationStore,
{
    let req = json_body(payload)?;
    let reason = required(req.reason).unwrap_or_else(|| DEFAULT_REVOKE_REASON.to_string());

    RevokeCodeUseCase::new(state.repo.clone())
        .execute(&req.code, &reason)
        .await?;

    Ok(Json(RevokeResponse {
        success: true,
        code: req.code,
    }))
}

/// GET /api/admin/fraud
pub async fn fraud_report<R>(
    State(state): State<ActivationAppState<R>>,
) -> ActivationResult<Json<FraudResponse>>
where
    R: ActivationStore,
{
    let report = FraudReportUseCase::new(state.repo.clone()).execute().await?;

    // Reasons never seen still report zero
    let attempts_by_reason = FailureReason::ALL
        .iter()
        .map(|reason| {
            let count = report.totals.by_reason.get(reason).copied().unwrap_or(0);
            (reason.as_str(), count)
        })
        .collect();

    let stats = FraudStatsDto {
        total_banned: report.total_banned(),
        total_attempts: report.totals.total,
        attempts_by_reason,
    };

    Ok(Json(FraudResponse {
        banned_devices: report.banned_devices.into_iter().map(Into::into).collect(),
        recent_attempts: report.recent_attempts.into_iter().map(Into::into).collect(),
        stats,
    }))
}

/// POST /api/admin/fraud/unban
pub async fn unban_device<R>(
    State(state): State<ActivationAppState<R>>,
    payload: Result<Json<UnbanRequest>, JsonRejection>,
) -> ActivationResult<Json<UnbanResponse>>
where
    R: ActivationStore,
{
    let req = json_body(payload)?;

    if req.action.as_deref().is_some_and(|action| action != "unban") {
        return Err(ActivationError::InvalidRequest("action must be \"unban\"".into()));
    }

    let removed = UnbanDeviceUseCase::new(state.repo.clone())
        .execute(&req.device_id)
        .await?;

    Ok(Json(UnbanResponse {
        success: true,
        device_id: req.device_id.trim().to_string(),
        removed,
    }))
}

/// Any activation or admin route while persistence is down
pub async fn unavailable() -> ActivationError {
    ActivationError::Unavailable
}
