//! Code Administration Use Cases
//!
//! Revocation, code search and the per-batch sales report.

use crate::domain::entities::{BatchStats, CodeRecord};
use crate::domain::repository::{CodeQuery, CodeRepository};
use crate::domain::value_objects::CodeStatus;
use crate::error::{ActivationError, ActivationResult};
use std::sync::Arc;

pub const DEFAULT_LIST_LIMIT: u32 = 50;
pub const MAX_LIST_LIMIT: u32 = 500;

/// Revoke Code Use Case
pub struct RevokeCodeUseCase<C>
where
    C: CodeRepository,
{
    code_repo: Arc<C>,
}

impl<C> RevokeCodeUseCase<C>
where
    C: CodeRepository,
{
    pub fn new(code_repo: Arc<C>) -> Self {
        Self { code_repo }
    }

    /// Revoke an available code. Used and revoked codes are terminal.
    pub async fn execute(&self, code: &str, reason: &str) -> ActivationResult<()> {
        let record = self
            .code_repo
            .find_code(code)
            .await?
            .ok_or(ActivationError::CodeNotFound)?;

        if record.status.is_terminal() {
            return Err(ActivationError::NotRevocable(record.status));
        }

        if !self.code_repo.mark_revoked(code, reason).await? {
            // Raced with an activation or another revoke
            let status = self
                .code_repo
                .find_code(code)
                .await?
                .map(|r| r.status)
                .unwrap_or(CodeStatus::Used);
            return Err(ActivationError::NotRevocable(status));
        }

        tracing::info!(code = %code, reason = %reason, "Code revoked");
        Ok(())
    }
}

/// Search filters as received from the admin API
#[derive(Debug, Clone, Default)]
pub struct ListCodesInput {
    pub batch_id: Option<u32>,
    pub status: Option<CodeStatus>,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListCodesInput {
    fn into_query(self) -> CodeQuery {
        CodeQuery {
            batch_id: self.batch_id,
            status: self.status,
            search: self
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            limit: self
                .limit
                .unwrap_or(DEFAULT_LIST_LIMIT)
                .clamp(1, MAX_LIST_LIMIT),
            offset: self.offset.unwrap_or(0),
        }
    }
}

/// List Codes Use Case
pub struct ListCodesUseCase<C>
where
    C: CodeRepository,
{
    code_repo: Arc<C>,
}

impl<C> ListCodesUseCase<C>
where
    C: CodeRepository,
{
    pub fn new(code_repo: Arc<C>) -> Self {
        Self { code_repo }
    }

    pub async fn execute(&self, input: ListCodesInput) -> ActivationResult<(CodeQuery, Vec<CodeRecord>)> {
        let query = input.into_query();
        let codes = self.code_repo.list_codes(&query).await?;
        Ok((query, codes))
    }
}

/// Sums over every batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RevenueSummary {
    pub total_codes: u64,
    pub used: u64,
    pub revoked: u64,
    pub available: u64,
    pub total_value: u64,
    pub earned: u64,
    pub potential: u64,
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batches: Vec<BatchStats>,
    pub summary: RevenueSummary,
}

/// Batch Report Use Case
pub struct BatchReportUseCase<C>
where
    C: CodeRepository,
{
    code_repo: Arc<C>,
}

impl<C> BatchReportUseCase<C>
where
    C: CodeRepository,
{
    pub fn new(code_repo: Arc<C>) -> Self {
        Self { code_repo }
    }

    pub async fn execute(&self) -> ActivationResult<BatchReport> {
        let batches = self.code_repo.batch_stats().await?;

        let summary = batches
            .iter()
            .fold(RevenueSummary::default(), |mut sum, stats| {
                sum.total_codes += stats.total;
                sum.used += stats.used;
                sum.revoked += stats.revoked;
                sum.available += stats.available();
                sum.total_value += stats.total_value();
                sum.earned += stats.earned();
                sum.potential += stats.potential();
                sum
            });

        Ok(BatchReport { batches, summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_limit_defaults_and_caps() {
        let query = ListCodesInput::default().into_query();
        assert_eq!(query.limit, DEFAULT_LIST_LIMIT);
        assert_eq!(query.offset, 0);

        let query = ListCodesInput {
            limit: Some(10_000),
            ..Default::default()
        }
        .into_query();
        assert_eq!(query.limit, MAX_LIST_LIMIT);

        let query = ListCodesInput {
            limit: Some(0),
            search: Some("   ".into()),
            ..Default::default()
        }
        .into_query();
        assert_eq!(query.limit, 1);
        assert!(query.search.is_none());
    }
}
