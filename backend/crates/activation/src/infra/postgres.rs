//! PostgreSQL Repository Implementations

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
use kernel::id::ActivationId;
use sqlx::PgPool;
use sqlx::types::Uuid;

/// PostgreSQL-backed repository
#[derive(Clone)]
pub struct PgActivationRepository {
    pool: PgPool,
}

impl PgActivationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl CodeRepository for PgActivationRepository {
    async fn find_code(&self, code: &str) -> ActivationResult<Option<CodeRecord>> {
        let row = sqlx::query_as::<_, CodeRow>(
            r#"
            SELECT
                code,
                duration_days,
                batch_id,
                status,
                device_id,
                used_at,
                revoked_reason,
                created_at
            FROM activation_codes
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CodeRow::into_record).transpose()
    }

    async fn try_activate(&self, activation: &Activation) -> ActivationResult<bool> {
        let mut tx = self.pool.begin().await?;

        // Conditional update: only one caller can win the available -> used transition
        let updated = sqlx::query(
            r#"
            UPDATE activation_codes
            SET status = 'used', device_id = $2, used_at = $3
            WHERE code = $1 AND status = 'available'
            "#,
        )
        .bind(&activation.code)
        .bind(&activation.device_id)
        .bind(activation.activated_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO activations (
                activation_id,
                code,
                device_id,
                activated_at,
                expiry_date,
                permanent_token,
                entry_timestamp
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(activation.id.into_uuid())
        .bind(&activation.code)
        .bind(&activation.device_id)
        .bind(activation.activated_at)
        .bind(activation.expiry_date)
        .bind(&activation.token)
        .bind(activation.entry_timestamp)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(true)
    }

    async fn mark_revoked(&self, code: &str, reason: &str) -> ActivationResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE activation_codes
            SET status = 'revoked', revoked_reason = $2, revoked_at = NOW()
            WHERE code = $1 AND status = 'available'
            "#,
        )
        .bind(code)
        .bind(reason)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    async fn find_batch(&self, batch_id: u32) -> ActivationResult<Option<Batch>> {
        let row = sqlx::query_as::<_, BatchRow>(
            "SELECT batch_id, duration_days, code_count, created_at FROM batches WHERE batch_id = $1",
        )
        .bind(batch_id as i32)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(BatchRow::into_batch))
    }

    async fn find_existing_codes(&self, codes: &[String]) -> ActivationResult<Vec<String>> {
        let existing = sqlx::query_scalar::<_, String>(
            "SELECT code FROM activation_codes WHERE code = ANY($1)",
        )
        .bind(codes)
        .fetch_all(&self.pool)
        .await?;

        Ok(existing)
    }

    async fn create_batch(&self, batch: &Batch, codes: &[CodeRecord]) -> ActivationResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO batches (batch_id, duration_days, code_count, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(batch.batch_id as i32)
        .bind(batch.duration_days as i32)
        .bind(batch.count as i32)
        .bind(batch.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ActivationError::BatchExists(batch.batch_id)
            }
            _ => ActivationError::Database(e),
        })?;

        let code_texts: Vec<String> = codes.iter().map(|r| r.code.clone()).collect();

        sqlx::query(
            r#"
            INSERT INTO activation_codes (code, duration_days, batch_id, status, created_at)
            SELECT code, $2, $3, 'available', $4
            FROM UNNEST($1::TEXT[]) AS t(code)
            "#,
        )
        .bind(&code_texts)
        .bind(batch.duration_days as i32)
        .bind(batch.batch_id as i32)
        .bind(batch.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(batch_id = batch.batch_id, codes = codes.len(), "Batch stored");

        Ok(())
    }

    async fn batch_stats(&self) -> ActivationResult<Vec<BatchStats>> {
        let rows = sqlx::query_as::<_, BatchStatsRow>(
            r#"
            SELECT
                b.batch_id,
                b.duration_days,
                b.code_count,
                b.created_at,
                COUNT(c.code) AS total,
                COUNT(c.code) FILTER (WHERE c.status = 'used') AS used,
                COUNT(c.code) FILTER (WHERE c.status = 'revoked') AS revoked
            FROM batches b
            LEFT JOIN activation_codes c ON c.batch_id = b.batch_id
            GROUP BY b.batch_id
            ORDER BY b.created_at DESC, b.batch_id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(BatchStatsRow::into_stats).collect())
    }

    async fn list_codes(&self, query: &CodeQuery) -> ActivationResult<Vec<CodeRecord>> {
        let rows = sqlx::query_as::<_, CodeRow>(
            r#"
            SELECT
                code,
                duration_days,
                batch_id,
                status,
                device_id,
                used_at,
                revoked_reason,
                created_at
            FROM activation_codes
            WHERE ($1::INTEGER IS NULL OR batch_id = $1)
              AND ($2::TEXT IS NULL OR status = $2)
              AND ($3::TEXT IS NULL OR STRPOS(code, UPPER($3)) > 0)
            ORDER BY created_at DESC, code
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(query.batch_id.map(|id| id as i32))
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.search.as_deref())
        .bind(i64::from(query.limit))
        .bind(i64::from(query.offset))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CodeRow::into_record).collect()
    }

    async fn list_activations(&self, query: &ActivationQuery) -> ActivationResult<Vec<ActivationView>> {
        let rows = sqlx::query_as::<_, ActivationViewRow>(
            r#"
            SELECT
                a.activation_id,
                a.code,
                a.device_id,
                a.activated_at,
                a.expiry_date,
                a.entry_timestamp,
                c.duration_days,
                c.batch_id
            FROM activations a
            JOIN activation_codes c ON c.code = a.code
            WHERE ($1::TEXT IS NULL OR a.device_id = $1)
              AND ($2::TEXT IS NULL OR a.code = $2)
            ORDER BY a.activated_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(query.device_id.as_deref())
        .bind(query.code.as_deref())
        .bind(i64::from(query.limit))
        .bind(i64::from(query.offset))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ActivationViewRow::into_view).collect())
    }

    async fn tier_stats(&self) -> ActivationResult<Vec<TierStats>> {
        let rows = sqlx::query_as::<_, (i32, i64, i64, i64)>(
            r#"
            SELECT
                duration_days,
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'used') AS used,
                COUNT(*) FILTER (WHERE status = 'revoked') AS revoked
            FROM activation_codes
            GROUP BY duration_days
            ORDER BY duration_days
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(duration_days, total, used, revoked)| TierStats {
                duration_days: duration_days as u32,
                total: total as u64,
                used: used as u64,
                revoked: revoked as u64,
            })
            .collect())
    }

    async fn daily_activations(&self, since: DateTime<Utc>) -> ActivationResult<Vec<DailyActivations>> {
        let rows = sqlx::query_as::<_, (NaiveDate, i32, i64)>(
            r#"
            SELECT
                (a.activated_at AT TIME ZONE 'UTC')::DATE AS day,
                c.duration_days,
                COUNT(*) AS activations
            FROM activations a
            JOIN activation_codes c ON c.code = a.code
            WHERE a.activated_at >= $1
            GROUP BY day, c.duration_days
            ORDER BY day, c.duration_days
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(day, duration_days, count)| DailyActivations {
                day,
                duration_days: duration_days as u32,
                count: count as u64,
            })
            .collect())
    }
}

impl FraudRepository for PgActivationRepository {
    async fn find_banned_device(&self, device_id: &str) -> ActivationResult<Option<BannedDevice>> {
        let row = sqlx::query_as::<_, BannedDeviceRow>(
            r#"
            SELECT device_id, reason, attempt_count, banned_at
            FROM banned_devices
            WHERE device_id = $1
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(BannedDeviceRow::into_banned_device))
    }

    async fn insert_failed_attempt(&self, attempt: &FailedAttempt) -> ActivationResult<()> {
        sqlx::query(
            r#"
            INSERT INTO failed_attempts (device_id, code, reason, attempted_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&attempt.device_id)
        .bind(&attempt.code)
        .bind(attempt.reason.as_str())
        .bind(attempt.attempted_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count_recent_failed_attempts(
        &self,
        device_id: &str,
        reason: FailureReason,
        since: DateTime<Utc>,
    ) -> ActivationResult<u32> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM failed_attempts
            WHERE device_id = $1 AND reason = $2 AND attempted_at >= $3
            "#,
        )
        .bind(device_id)
        .bind(reason.as_str())
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn insert_banned_device(&self, device: &BannedDevice) -> ActivationResult<()> {
        sqlx::query(
            r#"
            INSERT INTO banned_devices (device_id, reason, attempt_count, banned_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (device_id) DO NOTHING
            "#,
        )
        .bind(&device.device_id)
        .bind(&device.reason)
        .bind(device.attempt_count as i32)
        .bind(device.banned_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_banned_device(&self, device_id: &str) -> ActivationResult<bool> {
        let deleted = sqlx::query("DELETE FROM banned_devices WHERE device_id = $1")
            .bind(device_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn list_banned_devices(&self) -> ActivationResult<Vec<BannedDevice>> {
        let rows = sqlx::query_as::<_, BannedDeviceRow>(
            r#"
            SELECT device_id, reason, attempt_count, banned_at
            FROM banned_devices
            ORDER BY banned_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(BannedDeviceRow::into_banned_device)
            .collect())
    }

    async fn recent_failed_attempts(&self, limit: u32) -> ActivationResult<Vec<FailedAttempt>> {
        let rows = sqlx::query_as::<_, FailedAttemptRow>(
            r#"
            SELECT device_id, code, reason, attempted_at
            FROM failed_attempts
            ORDER BY attempted_at DESC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FailedAttemptRow::into_failed_attempt).collect()
    }

    async fn failed_attempt_totals(&self) -> ActivationResult<AttemptTotals> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT reason, COUNT(*) FROM failed_attempts GROUP BY reason",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut totals = AttemptTotals::default();
        for (reason, count) in rows {
            let reason = reason.parse::<FailureReason>().map_err(ActivationError::Internal)?;
            let count = count.max(0) as u64;
            totals.total += count;
            totals.by_reason.insert(reason, count);
        }
        Ok(totals)
    }
}

impl AttemptLogRepository for PgActivationRepository {
    async fn record_attempt(&self, attempt: &ActivationAttempt) -> ActivationResult<()> {
        sqlx::query(
            r#"
            INSERT INTO activation_attempts (
                activation_attempt_id,
                device_id,
                code,
                entry_timestamp,
                validated_at,
                success,
                error_message,
                client_ip
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8::inet)
            "#,
        )
        .bind(attempt.id.into_uuid())
        .bind(&attempt.device_id)
        .bind(&attempt.code)
        .bind(attempt.entry_timestamp)
        .bind(attempt.validated_at)
        .bind(attempt.success)
        .bind(attempt.error_message.as_deref())
        .bind(attempt.client_ip.as_ref().map(|ip| ip.to_string()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// Internal row types for sqlx mapping
#[derive(sqlx::FromRow)]
struct CodeRow {
    code: String,
    duration_days: i32,
    batch_id: i32,
    status: String,
    device_id: Option<String>,
    used_at: Option<DateTime<Utc>>,
    revoked_reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl CodeRow {
    fn into_record(self) -> ActivationResult<CodeRecord> {
        Ok(CodeRecord {
            status: self.status.parse::<CodeStatus>().map_err(ActivationError::Internal)?,
            code: self.code,
            duration_days: self.duration_days as u32,
            batch_id: self.batch_id as u32,
            device_id: self.device_id,
            used_at: self.used_at,
            revoked_reason: self.revoked_reason,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ActivationViewRow {
    activation_id: Uuid,
    code: String,
    device_id: String,
    activated_at: DateTime<Utc>,
    expiry_date: DateTime<Utc>,
    entry_timestamp: i64,
    duration_days: i32,
    batch_id: i32,
}

impl ActivationViewRow {
    fn into_view(self) -> ActivationView {
        ActivationView {
            id: ActivationId::from_uuid(self.activation_id),
            code: self.code,
            device_id: self.device_id,
            activated_at: self.activated_at,
            expiry_date: self.expiry_date,
            entry_timestamp: self.entry_timestamp,
            duration_days: self.duration_days as u32,
            batch_id: self.batch_id as u32,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BatchRow {
    batch_id: i32,
    duration_days: i32,
    code_count: i32,
    created_at: DateTime<Utc>,
}

impl BatchRow {
    fn into_batch(self) -> Batch {
        Batch {
            batch_id: self.batch_id as u32,
            duration_days: self.duration_days as u32,
            count: self.code_count as u32,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BatchStatsRow {
    batch_id: i32,
    duration_days: i32,
    code_count: i32,
    created_at: DateTime<Utc>,
    total: i64,
    used: i64,
    revoked: i64,
}

impl BatchStatsRow {
    fn into_stats(self) -> BatchStats {
        BatchStats {
            batch: Batch {
                batch_id: self.batch_id as u32,
                duration_days: self.duration_days as u32,
                count: self.code_count as u32,
                created_at: self.created_at,
            },
            total: self.total as u64,
            used: self.used as u64,
            revoked: self.revoked as u64,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BannedDeviceRow {
    device_id: String,
    reason: String,
    attempt_count: i32,
    banned_at: DateTime<Utc>,
}

impl BannedDeviceRow {
    fn into_banned_device(self) -> BannedDevice {
        BannedDevice {
            device_id: self.device_id,
            reason: self.reason,
            attempt_count: self.attempt_count as u32,
            banned_at: self.banned_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FailedAttemptRow {
    device_id: String,
    code: String,
    reason: String,
    attempted_at: DateTime<Utc>,
}

impl FailedAttemptRow {
    fn into_failed_attempt(self) -> ActivationResult<FailedAttempt> {
        Ok(FailedAttempt {
            reason: self.reason.parse::<FailureReason>().map_err(ActivationError::Internal)?,
            device_id: self.device_id,
            code: self.code,
            attempted_at: self.attempted_at,
        })
    }
}
