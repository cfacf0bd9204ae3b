//! In-Memory Repository Implementation
//!
//! Same contract as the PostgreSQL adapter, backed by one mutex-guarded
//! state. The guard is never held across an await point.

use crate::domain::entities::{
    Activation, ActivationAttempt, ActivationView, AttemptTotals, Batch, BannedDevice, BatchStats,
    CodeRecord, DailyActivations, FailedAttempt, TierStats,
};
use crate::domain::repository::{
    ActivationQuery, AttemptLogRepository, CodeQuery, CodeRepository, FraudRepository,
};
use crate::domain::value_objects::{CodeStatus, FailureReason};
use crate::error::{ActivationError, ActivationResult};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct State {
    codes: HashMap<String, CodeRecord>,
    batches: BTreeMap<u32, Batch>,
    activations: Vec<Activation>,
    attempts: Vec<ActivationAttempt>,
    failed_attempts: Vec<FailedAttempt>,
    banned: HashMap<String, BannedDevice>,
}

/// In-memory repository
#[derive(Clone, Default)]
pub struct InMemoryActivationRepository {
    state: Arc<Mutex<State>>,
    attempt_log_down: Arc<AtomicBool>,
}

impl InMemoryActivationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ActivationResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| ActivationError::Internal("in-memory store poisoned".into()))
    }

    /// Insert or replace a code record directly
    pub fn put_code(&self, record: CodeRecord) -> ActivationResult<()> {
        self.lock()?.codes.insert(record.code.clone(), record);
        Ok(())
    }

    /// Append a failed attempt with an explicit timestamp
    pub fn put_failed_attempt(&self, attempt: FailedAttempt) -> ActivationResult<()> {
        self.lock()?.failed_attempts.push(attempt);
        Ok(())
    }

    /// Make every audit log write fail
    pub fn set_attempt_log_down(&self, down: bool) {
        self.attempt_log_down.store(down, Ordering::SeqCst);
    }

    pub fn activations(&self) -> ActivationResult<Vec<Activation>> {
        Ok(self.lock()?.activations.clone())
    }

    pub fn attempts(&self) -> ActivationResult<Vec<ActivationAttempt>> {
        Ok(self.lock()?.attempts.clone())
    }

    pub fn failed_attempts(&self) -> ActivationResult<Vec<FailedAttempt>> {
        Ok(self.lock()?.failed_attempts.clone())
    }
}

impl CodeRepository for InMemoryActivationRepository {
    async fn find_code(&self, code: &str) -> ActivationResult<Option<CodeRecord>> {
        Ok(self.lock()?.codes.get(code).cloned())
    }

    async fn try_activate(&self, activation: &Activation) -> ActivationResult<bool> {
        let mut guard = self.lock()?;
        let state = &mut *guard;

        let Some(record) = state.codes.get_mut(&activation.code) else {
            return Ok(false);
        };
        if record.status != CodeStatus::Available {
            return Ok(false);
        }

        record.status = CodeStatus::Used;
        record.device_id = Some(activation.device_id.clone());
        record.used_at = Some(activation.activated_at);
        state.activations.push(activation.clone());

        Ok(true)
    }

    async fn mark_revoked(&self, code: &str, reason: &str) -> ActivationResult<bool> {
        let mut state = self.lock()?;
        match state.codes.get_mut(code) {
            Some(record) if record.status == CodeStatus::Available => {
                record.status = CodeStatus::Revoked;
                record.revoked_reason = Some(reason.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_batch(&self, batch_id: u32) -> ActivationResult<Option<Batch>> {
        Ok(self.lock()?.batches.get(&batch_id).cloned())
    }

    async fn find_existing_codes(&self, codes: &[String]) -> ActivationResult<Vec<String>> {
        let state = self.lock()?;
        Ok(codes
            .iter()
            .filter(|code| state.codes.contains_key(code.as_str()))
            .cloned()
            .collect())
    }

    async fn create_batch(&self, batch: &Batch, codes: &[CodeRecord]) -> ActivationResult<()> {
        let mut state = self.lock()?;

        if state.batches.contains_key(&batch.batch_id) {
            return Err(ActivationError::BatchExists(batch.batch_id));
        }
        if codes.iter().any(|r| state.codes.contains_key(&r.code)) {
            return Err(ActivationError::Internal("duplicate activation code".into()));
        }

        state.batches.insert(batch.batch_id, batch.clone());
        for record in codes {
            state.codes.insert(record.code.clone(), record.clone());
        }
        Ok(())
    }

    async fn batch_stats(&self) -> ActivationResult<Vec<BatchStats>> {
        let state = self.lock()?;

        let mut stats: Vec<BatchStats> = state
            .batches
            .values()
            .map(|batch| {
                let mut entry = BatchStats {
                    batch: batch.clone(),
                    total: 0,
                    used: 0,
                    revoked: 0,
                };
                for record in state.codes.values().filter(|r| r.batch_id == batch.batch_id) {
                    entry.total += 1;
                    match record.status {
                        CodeStatus::Used => entry.used += 1,
                        CodeStatus::Revoked => entry.revoked += 1,
                        CodeStatus::Available => {}
                    }
                }
                entry
            })
            .collect();

        stats.sort_by(|a, b| {
            b.batch
                .created_at
                .cmp(&a.batch.created_at)
                .then(b.batch.batch_id.cmp(&a.batch.batch_id))
        });
        Ok(stats)
    }

    async fn list_codes(&self, query: &CodeQuery) -> ActivationResult<Vec<CodeRecord>> {
        let state = self.lock()?;
        let needle = query.search.as_ref().map(|s| s.to_uppercase());

        let mut codes: Vec<CodeRecord> = state
            .codes
            .values()
            .filter(|r| query.batch_id.is_none_or(|id| r.batch_id == id))
            .filter(|r| query.status.is_none_or(|status| r.status == status))
            .filter(|r| needle.as_ref().is_none_or(|n| r.code.contains(n.as_str())))
            .cloned()
            .collect();

        codes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.code.cmp(&b.code)));

        Ok(codes
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn list_activations(&self, query: &ActivationQuery) -> ActivationResult<Vec<ActivationView>> {
        let state = self.lock()?;

        // Later inserts first so equal timestamps still list newest first
        let mut views: Vec<ActivationView> = state
            .activations
            .iter()
            .rev()
            .filter(|a| query.device_id.as_ref().is_none_or(|d| &a.device_id == d))
            .filter(|a| query.code.as_ref().is_none_or(|c| &a.code == c))
            .filter_map(|a| {
                // Inner join, as in the SQL adapter
                let record = state.codes.get(&a.code)?;
                Some(ActivationView {
                    id: a.id,
                    code: a.code.clone(),
                    device_id: a.device_id.clone(),
                    activated_at: a.activated_at,
                    expiry_date: a.expiry_date,
                    entry_timestamp: a.entry_timestamp,
                    duration_days: record.duration_days,
                    batch_id: record.batch_id,
                })
            })
            .collect();

        views.sort_by(|a, b| b.activated_at.cmp(&a.activated_at));

        Ok(views
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn tier_stats(&self) -> ActivationResult<Vec<TierStats>> {
        let state = self.lock()?;

        let mut tiers: BTreeMap<u32, TierStats> = BTreeMap::new();
        for record in state.codes.values() {
            let entry = tiers
                .entry(record.duration_days)
                .or_insert_with(|| TierStats::empty(record.duration_days));
            entry.total += 1;
            match record.status {
                CodeStatus::Used => entry.used += 1,
                CodeStatus::Revoked => entry.revoked += 1,
                CodeStatus::Available => {}
            }
        }
        Ok(tiers.into_values().collect())
    }

    async fn daily_activations(&self, since: DateTime<Utc>) -> ActivationResult<Vec<DailyActivations>> {
        let state = self.lock()?;

        let mut days: BTreeMap<(NaiveDate, u32), u64> = BTreeMap::new();
        for activation in state.activations.iter().filter(|a| a.activated_at >= since) {
            let Some(record) = state.codes.get(&activation.code) else {
                continue;
            };
            *days
                .entry((activation.activated_at.date_naive(), record.duration_days))
                .or_insert(0) += 1;
        }

        Ok(days
            .into_iter()
            .map(|((day, duration_days), count)| DailyActivations {
                day,
                duration_days,
                count,
            })
            .collect())
    }
}

impl FraudRepository for InMemoryActivationRepository {
    async fn find_banned_device(&self, device_id: &str) -> ActivationResult<Option<BannedDevice>> {
        Ok(self.lock()?.banned.get(device_id).cloned())
    }

    async fn insert_failed_attempt(&self, attempt: &FailedAttempt) -> ActivationResult<()> {
        self.lock()?.failed_attempts.push(attempt.clone());
        Ok(())
    }

    async fn count_recent_failed_attempts(
        &self,
        device_id: &str,
        reason: FailureReason,
        since: DateTime<Utc>,
    ) -> ActivationResult<u32> {
        let count = self
            .lock()?
            .failed_attempts
            .iter()
            .filter(|a| a.device_id == device_id && a.reason == reason && a.attempted_at >= since)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn insert_banned_device(&self, device: &BannedDevice) -> ActivationResult<()> {
        self.lock()?
            .banned
            .entry(device.device_id.clone())
            .or_insert_with(|| device.clone());
        Ok(())
    }

    async fn delete_banned_device(&self, device_id: &str) -> ActivationResult<bool> {
        Ok(self.lock()?.banned.remove(device_id).is_some())
    }

    async fn list_banned_devices(&self) -> ActivationResult<Vec<BannedDevice>> {
        let mut devices: Vec<BannedDevice> = self.lock()?.banned.values().cloned().collect();
        devices.sort_by(|a, b| b.banned_at.cmp(&a.banned_at));
        Ok(devices)
    }

    async fn recent_failed_attempts(&self, limit: u32) -> ActivationResult<Vec<FailedAttempt>> {
        let mut attempts = self.lock()?.failed_attempts.clone();
        attempts.sort_by(|a, b| b.attempted_at.cmp(&a.attempted_at));
        attempts.truncate(limit as usize);
        Ok(attempts)
    }

    async fn failed_attempt_totals(&self) -> ActivationResult<AttemptTotals> {
        let state = self.lock()?;
        let mut totals = AttemptTotals::default();
        for attempt in &state.failed_attempts {
            totals.total += 1;
            *totals.by_reason.entry(attempt.reason).or_insert(0) += 1;
        }
        Ok(totals)
    }
}

impl AttemptLogRepository for InMemoryActivationRepository {
    async fn record_attempt(&self, attempt: &ActivationAttempt) -> ActivationResult<()> {
        if self.attempt_log_down.load(Ordering::SeqCst) {
            return Err(ActivationError::Internal("attempt log unavailable".into()));
        }
        self.lock()?.attempts.push(attempt.clone());
        Ok(())
    }
}
