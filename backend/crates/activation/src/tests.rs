//! Unit tests for the activation crate
//! Workflow, admin and HTTP behavior against the in-memory repository

#[cfg(test)]
mod support {
    use crate::application::activate::{ActivateInput, ActivateUseCase};
    use crate::application::config::ActivationConfig;
    use crate::domain::codec::CodeCodec;
    use crate::domain::entities::CodeRecord;
    use crate::infra::memory::InMemoryActivationRepository;
    use std::sync::Arc;

    pub const SECRET: &str = "unit-test-secret";

    pub type Repo = InMemoryActivationRepository;
    pub type Activate = ActivateUseCase<Repo, Repo, Repo>;

    pub fn config() -> ActivationConfig {
        ActivationConfig {
            code_secret: SECRET.to_string(),
            admin_api_key: Some("test-admin-key".to_string()),
            ..Default::default()
        }
    }

    pub fn codec() -> CodeCodec {
        CodeCodec::new(SECRET)
    }

    pub fn activate_use_case(repo: &Repo, config: ActivationConfig) -> Activate {
        let repo = Arc::new(repo.clone());
        ActivateUseCase::new(repo.clone(), repo.clone(), repo, Arc::new(config))
    }

    /// Store a fresh available code and return its text
    pub fn seed_code(repo: &Repo, duration_days: u32, batch_id: u32) -> String {
        let code = codec().encode(duration_days, batch_id).unwrap().to_string();
        repo.put_code(CodeRecord::available(code.clone(), duration_days, batch_id))
            .unwrap();
        code
    }

    pub fn input(code: &str, device_id: &str) -> ActivateInput {
        ActivateInput {
            code: code.to_string(),
            entry_timestamp: 1_700_000_000_000,
            device_id: device_id.to_string(),
            client_ip: None,
        }
    }
}

#[cfg(test)]
mod workflow_tests {
    use super::support::*;
    use crate::application::config::TokenFormat;
    use crate::application::manage_fraud::UnbanDeviceUseCase;
    use crate::domain::codec::CodecError;
    use crate::domain::entities::{CodeRecord, FailedAttempt};
    use crate::domain::repository::CodeRepository;
    use crate::domain::value_objects::{CodeStatus, FailureReason};
    use crate::error::ActivationError;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_successful_activation() {
        let repo = Repo::new();
        let code = seed_code(&repo, 30, 1);
        let use_case = activate_use_case(&repo, config());

        let before = Utc::now();
        let output = use_case.execute(input(&code, "device-1")).await.unwrap();

        assert_eq!(output.duration_days, 30);
        assert!(output.expiry_date >= before + Duration::days(30));
        assert!(output.expiry_date <= Utc::now() + Duration::days(30));
        assert!(!output.token.is_empty());

        let record = repo.find_code(&code).await.unwrap().unwrap();
        assert_eq!(record.status, CodeStatus::Used);
        assert_eq!(record.device_id.as_deref(), Some("device-1"));
        assert_eq!(record.expiry_date(), Some(output.expiry_date));

        let activations = repo.activations().unwrap();
        assert_eq!(activations.len(), 1);
        assert_eq!(activations[0].token, output.token);
        assert_eq!(activations[0].entry_timestamp, 1_700_000_000_000);

        let attempts = repo.attempts().unwrap();
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].success);
    }

    #[tokio::test]
    async fn test_unknown_code_is_not_found() {
        let repo = Repo::new();
        let code = codec().encode(30, 1).unwrap().to_string();
        let use_case = activate_use_case(&repo, config());

        let err = use_case.execute(input(&code, "device-1")).await.unwrap_err();
        assert!(matches!(err, ActivationError::CodeNotFound));

        let failed = repo.failed_attempts().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].reason, FailureReason::NotFound);
        assert!(!repo.attempts().unwrap()[0].success);
    }

    #[tokio::test]
    async fn test_not_found_attempts_never_ban() {
        let repo = Repo::new();
        let use_case = activate_use_case(&repo, config());

        for _ in 0..5 {
            let code = codec().encode(30, 1).unwrap().to_string();
            let err = use_case.execute(input(&code, "guesser")).await.unwrap_err();
            assert!(matches!(err, ActivationError::CodeNotFound));
        }
    }

    #[tokio::test]
    async fn test_revoked_code_does_not_count_toward_ban() {
        let repo = Repo::new();
        let code = seed_code(&repo, 30, 1);
        repo.mark_revoked(&code, "refund").await.unwrap();
        let use_case = activate_use_case(&repo, config());

        for _ in 0..4 {
            let err = use_case.execute(input(&code, "device-1")).await.unwrap_err();
            assert!(matches!(err, ActivationError::CodeRevoked));
        }

        let failed = repo.failed_attempts().unwrap();
        assert_eq!(failed.len(), 4);
        assert!(failed.iter().all(|a| a.reason == FailureReason::Revoked));
    }

    #[tokio::test]
    async fn test_ban_escalation() {
        let repo = Repo::new();
        let used = seed_code(&repo, 30, 1);
        let other = seed_code(&repo, 90, 1);
        let use_case = activate_use_case(&repo, config());

        use_case.execute(input(&used, "owner")).await.unwrap();

        let first = use_case.execute(input(&used, "D1")).await.unwrap_err();
        assert!(matches!(first, ActivationError::AlreadyUsed));

        let second = use_case.execute(input(&used, "D1")).await.unwrap_err();
        assert!(matches!(second, ActivationError::DeviceBanned));

        let failed_before = repo.failed_attempts().unwrap().len();

        // Banned for unrelated codes too, without touching the attempt log
        let third = use_case.execute(input(&other, "D1")).await.unwrap_err();
        assert!(matches!(third, ActivationError::DeviceBanned));
        assert_eq!(repo.failed_attempts().unwrap().len(), failed_before);

        let record = repo.find_code(&other).await.unwrap().unwrap();
        assert_eq!(record.status, CodeStatus::Available);
    }

    #[tokio::test]
    async fn test_banned_device_checked_before_format() {
        let repo = Repo::new();
        let used = seed_code(&repo, 30, 1);
        let use_case = activate_use_case(&repo, config());

        use_case.execute(input(&used, "owner")).await.unwrap();
        let _ = use_case.execute(input(&used, "D1")).await;
        let _ = use_case.execute(input(&used, "D1")).await;

        let err = use_case
            .execute(input("not-a-code", "D1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ActivationError::DeviceBanned));
    }

    #[tokio::test]
    async fn test_attempts_outside_window_are_ignored() {
        let repo = Repo::new();
        let used = seed_code(&repo, 30, 1);
        let use_case = activate_use_case(&repo, config());
        use_case.execute(input(&used, "owner")).await.unwrap();

        let mut stale = FailedAttempt::new("D1", &used, FailureReason::AlreadyUsed);
        stale.attempted_at = Utc::now() - Duration::hours(25);
        repo.put_failed_attempt(stale).unwrap();

        let err = use_case.execute(input(&used, "D1")).await.unwrap_err();
        assert!(matches!(err, ActivationError::AlreadyUsed));
    }

    #[tokio::test]
    async fn test_unban_keeps_history() {
        let repo = Repo::new();
        let used = seed_code(&repo, 30, 1);
        let fresh = seed_code(&repo, 10, 2);
        let use_case = activate_use_case(&repo, config());

        use_case.execute(input(&used, "owner")).await.unwrap();
        let _ = use_case.execute(input(&used, "D1")).await;
        let _ = use_case.execute(input(&used, "D1")).await;

        let unban = UnbanDeviceUseCase::new(Arc::new(repo.clone()));
        assert!(unban.execute("D1").await.unwrap());

        // Clean again: a valid code activates
        let output = use_case.execute(input(&fresh, "D1")).await.unwrap();
        assert_eq!(output.duration_days, 10);

        // History was not reset, so the next already-used attempt bans at once
        let err = use_case.execute(input(&used, "D1")).await.unwrap_err();
        assert!(matches!(err, ActivationError::DeviceBanned));
    }

    #[tokio::test]
    async fn test_single_use_under_concurrency() {
        let repo = Repo::new();
        let code = seed_code(&repo, 30, 1);
        let use_case = Arc::new(activate_use_case(&repo, config()));

        let mut handles = Vec::new();
        for i in 0..16 {
            let use_case = use_case.clone();
            let code = code.clone();
            handles.push(tokio::spawn(async move {
                use_case.execute(input(&code, &format!("device-{}", i))).await
            }));
        }

        let mut successes = 0;
        let mut already_used = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(ActivationError::AlreadyUsed) => already_used += 1,
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(already_used, 15);
        assert_eq!(repo.activations().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_format_errors_touch_nothing() {
        let repo = Repo::new();
        let use_case = activate_use_case(&repo, config());

        let err = use_case
            .execute(input("abcd-1234-5678-90AB", "device-1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ActivationError::InvalidFormat(CodecError::MalformedFormat)
        ));

        let code = seed_code(&repo, 30, 1);
        let mut tampered = code[..15].to_string();
        tampered.push_str(if &code[15..] == "0000" { "1111" } else { "0000" });
        let err = use_case.execute(input(&tampered, "device-1")).await.unwrap_err();
        assert!(matches!(
            err,
            ActivationError::InvalidFormat(CodecError::ChecksumMismatch)
        ));

        assert!(repo.failed_attempts().unwrap().is_empty());
        assert!(repo.attempts().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_code_from_other_secret_is_rejected() {
        let repo = Repo::new();
        let foreign = crate::domain::codec::CodeCodec::new("someone-else")
            .encode(30, 1)
            .unwrap()
            .to_string();
        let groups: Vec<&str> = foreign.split('-').collect();
        let use_case = activate_use_case(&repo, config());

        if codec().checksum(groups[0], groups[1], groups[2]) != groups[3] {
            let err = use_case.execute(input(&foreign, "device-1")).await.unwrap_err();
            assert!(matches!(err, ActivationError::InvalidFormat(_)));
        }
    }

    #[tokio::test]
    async fn test_missing_device_id() {
        let repo = Repo::new();
        let code = seed_code(&repo, 30, 1);
        let use_case = activate_use_case(&repo, config());

        let err = use_case.execute(input(&code, "   ")).await.unwrap_err();
        assert!(matches!(err, ActivationError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_attempt_log_failure_does_not_fail_activation() {
        let repo = Repo::new();
        let code = seed_code(&repo, 30, 1);
        repo.set_attempt_log_down(true);
        let use_case = activate_use_case(&repo, config());

        let output = use_case.execute(input(&code, "device-1")).await.unwrap();
        assert_eq!(output.duration_days, 30);
        assert!(repo.attempts().unwrap().is_empty());
        assert_eq!(repo.activations().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_expiry_overflow_is_internal_and_keeps_code() {
        let repo = Repo::new();
        let code = codec().encode(30, 1).unwrap().to_string();
        repo.put_code(CodeRecord::available(code.clone(), u32::MAX, 1)).unwrap();
        let use_case = activate_use_case(&repo, config());

        let err = use_case.execute(input(&code, "device-1")).await.unwrap_err();
        assert!(matches!(err, ActivationError::Internal(_)));

        let record = repo.find_code(&code).await.unwrap().unwrap();
        assert_eq!(record.status, CodeStatus::Available);
        assert!(repo.activations().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persisted_duration_wins() {
        let repo = Repo::new();
        let code = codec().encode(30, 1).unwrap().to_string();
        repo.put_code(CodeRecord::available(code.clone(), 90, 1)).unwrap();
        let use_case = activate_use_case(&repo, config());

        let output = use_case.execute(input(&code, "device-1")).await.unwrap();
        assert_eq!(output.duration_days, 90);
    }

    #[tokio::test]
    async fn test_signed_tokens() {
        let repo = Repo::new();
        let code = seed_code(&repo, 30, 1);
        let config = crate::application::config::ActivationConfig {
            token_format: TokenFormat::Signed,
            token_secret: [9u8; 32],
            ..config()
        };
        let use_case = activate_use_case(&repo, config);

        let output = use_case.execute(input(&code, "device-1")).await.unwrap();
        let (payload, tag) = output.token.split_once('.').unwrap();
        let payload = platform::crypto::from_base64(payload).unwrap();
        assert!(String::from_utf8(payload.clone()).unwrap().starts_with(&code));
        assert_eq!(
            platform::crypto::from_base64(tag).unwrap(),
            platform::crypto::hmac_sha256(&[9u8; 32], &payload)
        );
    }
}

#[cfg(test)]
mod batch_tests {
    use super::support::*;
    use crate::application::generate_batch::{GenerateBatchInput, GenerateBatchUseCase};
    use crate::application::manage_codes::BatchReportUseCase;
    use crate::domain::repository::CodeRepository;
    use crate::domain::value_objects::CodeStatus;
    use crate::error::ActivationError;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn generate(repo: &Repo) -> GenerateBatchUseCase<Repo> {
        GenerateBatchUseCase::new(Arc::new(repo.clone()), Arc::new(config()))
    }

    #[tokio::test]
    async fn test_generate_batch() {
        let repo = Repo::new();
        let output = generate(&repo)
            .execute(GenerateBatchInput {
                batch_id: 7,
                duration_days: 90,
                count: 200,
            })
            .await
            .unwrap();

        assert_eq!(output.codes.len(), 200);
        let unique: HashSet<&String> = output.codes.iter().collect();
        assert_eq!(unique.len(), 200);

        let codec = codec();
        for code in &output.codes {
            let decoded = codec.decode(code).unwrap();
            assert_eq!(decoded.duration_days, 90);
            assert_eq!(decoded.batch_low_byte, 7);

            let record = repo.find_code(code).await.unwrap().unwrap();
            assert_eq!(record.status, CodeStatus::Available);
            assert_eq!(record.batch_id, 7);
        }

        assert!(repo.find_batch(7).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_batch_rejected() {
        let repo = Repo::new();
        let input = GenerateBatchInput {
            batch_id: 1,
            duration_days: 10,
            count: 5,
        };
        generate(&repo).execute(input.clone()).await.unwrap();

        let err = generate(&repo).execute(input).await.unwrap_err();
        assert!(matches!(err, ActivationError::BatchExists(1)));
    }

    #[tokio::test]
    async fn test_batch_validation() {
        let repo = Repo::new();
        let cases = [(1, 30, 0), (1, 30, 10_001), (1, 45, 10), (256, 30, 10)];

        for (batch_id, duration_days, count) in cases {
            let err = generate(&repo)
                .execute(GenerateBatchInput {
                    batch_id,
                    duration_days,
                    count,
                })
                .await
                .unwrap_err();
            assert!(
                matches!(err, ActivationError::InvalidBatch(_)),
                "({}, {}, {})",
                batch_id,
                duration_days,
                count
            );
        }
    }

    #[tokio::test]
    async fn test_batch_report_revenue() {
        let repo = Repo::new();
        let output = generate(&repo)
            .execute(GenerateBatchInput {
                batch_id: 3,
                duration_days: 30,
                count: 10,
            })
            .await
            .unwrap();

        let use_case = activate_use_case(&repo, config());
        for (i, code) in output.codes.iter().take(4).enumerate() {
            use_case
                .execute(input(code, &format!("device-{}", i)))
                .await
                .unwrap();
        }
        repo.mark_revoked(&output.codes[9], "lost").await.unwrap();

        let report = BatchReportUseCase::new(Arc::new(repo.clone()))
            .execute()
            .await
            .unwrap();

        assert_eq!(report.batches.len(), 1);
        let stats = &report.batches[0];
        assert_eq!(stats.total, 10);
        assert_eq!(stats.used, 4);
        assert_eq!(stats.revoked, 1);
        assert_eq!(stats.available(), 5);

        assert_eq!(report.summary.total_value, 150);
        assert_eq!(report.summary.earned, 60);
        assert_eq!(report.summary.potential, 75);
    }
}

#[cfg(test)]
mod admin_tests {
    use super::support::*;
    use crate::application::analytics::{
        AnalyticsUseCase, ListActivationsInput, ListActivationsUseCase, TimelinePoint,
    };
    use crate::application::generate_batch::{GenerateBatchInput, GenerateBatchUseCase};
    use crate::application::manage_codes::{ListCodesInput, ListCodesUseCase, RevokeCodeUseCase};
    use crate::application::manage_fraud::{FraudReportUseCase, UnbanDeviceUseCase};
    use crate::domain::entities::Activation;
    use crate::domain::repository::CodeRepository;
    use crate::domain::services::compute_expiry;
    use crate::domain::value_objects::{CodeStatus, FailureReason};
    use crate::error::ActivationError;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use kernel::id::ActivationId;
    use std::sync::Arc;

    /// Activate a stored code at a fixed instant
    async fn activate_at(repo: &Repo, code: &str, device_id: &str, at: DateTime<Utc>) {
        let record = repo.find_code(code).await.unwrap().unwrap();
        let activation = Activation {
            id: ActivationId::new(),
            code: code.to_string(),
            device_id: device_id.to_string(),
            activated_at: at,
            expiry_date: compute_expiry(at, record.duration_days).unwrap(),
            token: format!("{}-token", device_id),
            entry_timestamp: at.timestamp_millis(),
        };
        assert!(repo.try_activate(&activation).await.unwrap());
    }

    async fn generate(repo: &Repo, batch_id: u32, duration_days: u32, count: u32) -> Vec<String> {
        GenerateBatchUseCase::new(Arc::new(repo.clone()), Arc::new(config()))
            .execute(GenerateBatchInput {
                batch_id,
                duration_days,
                count,
            })
            .await
            .unwrap()
            .codes
    }

    #[tokio::test]
    async fn test_revoke_only_from_available() {
        let repo = Repo::new();
        let available = seed_code(&repo, 30, 1);
        let used = seed_code(&repo, 30, 1);
        activate_use_case(&repo, config())
            .execute(input(&used, "device-1"))
            .await
            .unwrap();

        let revoke = RevokeCodeUseCase::new(Arc::new(repo.clone()));

        revoke.execute(&available, "refund").await.unwrap();
        let record = repo.find_code(&available).await.unwrap().unwrap();
        assert_eq!(record.status, CodeStatus::Revoked);
        assert_eq!(record.revoked_reason.as_deref(), Some("refund"));

        let err = revoke.execute(&available, "again").await.unwrap_err();
        assert!(matches!(err, ActivationError::NotRevocable(CodeStatus::Revoked)));

        let err = revoke.execute(&used, "refund").await.unwrap_err();
        assert!(matches!(err, ActivationError::NotRevocable(CodeStatus::Used)));

        let err = revoke.execute("AAAA-1E01-BBBB-CCCC", "x").await.unwrap_err();
        assert!(matches!(err, ActivationError::CodeNotFound));
    }

    #[tokio::test]
    async fn test_list_codes_filters() {
        let repo = Repo::new();
        let a = seed_code(&repo, 30, 1);
        let _b = seed_code(&repo, 30, 1);
        let c = seed_code(&repo, 90, 2);
        repo.mark_revoked(&c, "x").await.unwrap();

        let list = ListCodesUseCase::new(Arc::new(repo.clone()));

        let (query, codes) = list.execute(ListCodesInput::default()).await.unwrap();
        assert_eq!(query.limit, 50);
        assert_eq!(codes.len(), 3);

        let (_, codes) = list
            .execute(ListCodesInput {
                batch_id: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(codes.len(), 2);

        let (_, codes) = list
            .execute(ListCodesInput {
                status: Some(CodeStatus::Revoked),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].code, c);

        let (_, codes) = list
            .execute(ListCodesInput {
                search: Some(a[..9].to_lowercase()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(codes.iter().any(|r| r.code == a));

        let (_, codes) = list
            .execute(ListCodesInput {
                limit: Some(1),
                offset: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(codes.len(), 1);
    }

    #[tokio::test]
    async fn test_activation_history() {
        let repo = Repo::new();
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let a = seed_code(&repo, 30, 1);
        let b = seed_code(&repo, 90, 2);
        let c = seed_code(&repo, 10, 1);
        activate_at(&repo, &a, "device-1", now - Duration::days(2)).await;
        activate_at(&repo, &b, "device-2", now - Duration::days(1)).await;
        activate_at(&repo, &c, "device-1", now).await;

        let list = ListActivationsUseCase::new(Arc::new(repo.clone()));

        let (query, activations) = list.execute(ListActivationsInput::default()).await.unwrap();
        assert_eq!(query.limit, 100);
        let codes: Vec<&str> = activations.iter().map(|v| v.code.as_str()).collect();
        assert_eq!(codes, vec![c.as_str(), b.as_str(), a.as_str()]);
        assert_eq!(activations[1].duration_days, 90);
        assert_eq!(activations[1].batch_id, 2);
        assert_eq!(activations[1].device_id, "device-2");

        let (_, activations) = list
            .execute(ListActivationsInput {
                device_id: Some("device-1".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let codes: Vec<&str> = activations.iter().map(|v| v.code.as_str()).collect();
        assert_eq!(codes, vec![c.as_str(), a.as_str()]);

        let (_, activations) = list
            .execute(ListActivationsInput {
                code: Some(b.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(activations.len(), 1);
        assert_eq!(activations[0].code, b);

        let (_, activations) = list
            .execute(ListActivationsInput {
                limit: Some(1),
                offset: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(activations.len(), 1);
        assert_eq!(activations[0].code, b);
    }

    #[tokio::test]
    async fn test_analytics_report() {
        let repo = Repo::new();
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let monthly = generate(&repo, 1, 30, 4).await;
        let yearly = generate(&repo, 2, 365, 2).await;

        activate_at(&repo, &monthly[0], "old", now - Duration::days(40)).await;
        activate_at(&repo, &monthly[1], "d1", now - Duration::days(2)).await;
        activate_at(&repo, &yearly[0], "d2", now - Duration::days(2)).await;
        activate_at(&repo, &monthly[2], "d3", now).await;
        repo.mark_revoked(&monthly[3], "lost").await.unwrap();

        let report = AnalyticsUseCase::new(Arc::new(repo.clone()))
            .execute_at(now)
            .await
            .unwrap();

        assert_eq!(report.total_batches, 2);
        assert_eq!(report.summary.total_codes, 6);
        assert_eq!(report.summary.used, 4);
        assert_eq!(report.summary.revoked, 1);
        assert_eq!(report.summary.available, 1);
        assert_eq!(report.summary.total_value, 360);
        assert_eq!(report.summary.earned, 195);
        assert_eq!(report.summary.potential, 150);
        assert_eq!(report.conversion_rate, 66.7);

        let tiers: Vec<(u32, u64, u64, u64)> = report
            .tiers
            .iter()
            .map(|t| (t.duration_days, t.codes, t.used, t.revenue))
            .collect();
        assert_eq!(
            tiers,
            vec![(10, 0, 0, 0), (30, 4, 3, 45), (90, 0, 0, 0), (365, 2, 1, 150)]
        );

        assert_eq!(report.recent_activations.len(), 4);
        assert_eq!(report.recent_activations[0].code, monthly[2]);
        assert_eq!(report.recent_activations[3].device_id, "old");

        // The 40 day old activation is outside the timeline
        assert_eq!(
            report.timeline,
            vec![
                TimelinePoint {
                    day: (now - Duration::days(2)).date_naive(),
                    activations: 2,
                    revenue: 165,
                },
                TimelinePoint {
                    day: now.date_naive(),
                    activations: 1,
                    revenue: 15,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_analytics_recent_activations_capped() {
        let repo = Repo::new();
        let codes = generate(&repo, 1, 10, 12).await;
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        for (i, code) in codes.iter().enumerate() {
            activate_at(&repo, code, &format!("device-{}", i), start + Duration::hours(i as i64)).await;
        }

        let report = AnalyticsUseCase::new(Arc::new(repo.clone()))
            .execute_at(start + Duration::days(1))
            .await
            .unwrap();

        assert_eq!(report.recent_activations.len(), 10);
        assert_eq!(report.recent_activations[0].device_id, "device-11");
        assert_eq!(report.conversion_rate, 100.0);
        assert_eq!(report.timeline.len(), 1);
        assert_eq!(report.timeline[0].activations, 12);
        assert_eq!(report.timeline[0].revenue, 60);
    }

    #[tokio::test]
    async fn test_analytics_empty_store() {
        let report = AnalyticsUseCase::new(Arc::new(Repo::new()))
            .execute()
            .await
            .unwrap();

        assert_eq!(report.total_batches, 0);
        assert_eq!(report.conversion_rate, 0.0);
        assert_eq!(report.tiers.len(), 4);
        assert!(report.tiers.iter().all(|t| t.codes == 0));
        assert!(report.recent_activations.is_empty());
        assert!(report.timeline.is_empty());
    }

    #[tokio::test]
    async fn test_unban_is_idempotent() {
        let repo = Repo::new();
        let unban = UnbanDeviceUseCase::new(Arc::new(repo.clone()));

        assert!(!unban.execute("never-banned").await.unwrap());
        assert!(!unban.execute("never-banned").await.unwrap());

        let err = unban.execute("").await.unwrap_err();
        assert!(matches!(err, ActivationError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_fraud_report() {
        let repo = Repo::new();
        let used = seed_code(&repo, 30, 1);
        let use_case = activate_use_case(&repo, config());

        use_case.execute(input(&used, "owner")).await.unwrap();
        let _ = use_case.execute(input(&used, "D1")).await;
        let _ = use_case.execute(input(&used, "D1")).await;
        let missing = codec().encode(10, 1).unwrap().to_string();
        let _ = use_case.execute(input(&missing, "D2")).await;

        let report = FraudReportUseCase::new(Arc::new(repo.clone()))
            .execute()
            .await
            .unwrap();

        assert_eq!(report.total_banned(), 1);
        assert_eq!(report.banned_devices[0].device_id, "D1");
        assert_eq!(report.banned_devices[0].attempt_count, 2);
        assert_eq!(report.recent_attempts.len(), 3);
        assert_eq!(report.totals.total, 3);
        assert_eq!(report.totals.by_reason.get(&FailureReason::AlreadyUsed), Some(&2));
        assert_eq!(report.totals.by_reason.get(&FailureReason::NotFound), Some(&1));
    }
}

#[cfg(test)]
mod http_tests {
    use super::support::*;
    use crate::presentation::router::{activation_router_generic, unavailable_router};
    use axum::Router;
    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use std::net::SocketAddr;
    use tower::ServiceExt;

    fn app(repo: &Repo) -> Router {
        activation_router_generic(repo.clone(), config())
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))))
    }

    fn post(uri: &str, body: Value, admin_key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = admin_key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", key));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str, admin_key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(key) = admin_key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", key));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn test_activate_success() {
        let repo = Repo::new();
        let code = seed_code(&repo, 365, 1);

        let (status, body) = send(
            app(&repo),
            post(
                "/activate",
                json!({"code": code, "entryTimestamp": 1_700_000_000_000i64, "deviceId": "phone-1"}),
                None,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["durationDays"], 365);
        assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
        assert!(body["expiryDate"].as_i64().is_some());

        let attempts = repo.attempts().unwrap();
        assert_eq!(
            attempts[0].client_ip,
            Some("127.0.0.1".parse().unwrap())
        );
    }

    #[tokio::test]
    async fn test_activate_error_codes() {
        let repo = Repo::new();
        let code = seed_code(&repo, 30, 1);

        let (status, body) = send(
            app(&repo),
            post(
                "/activate",
                json!({"code": "abcd-1234-5678-90AB", "entryTimestamp": 1, "deviceId": "d"}),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "InvalidFormat");

        let (status, body) = send(
            app(&repo),
            post("/activate", json!({"code": code, "deviceId": "d"}), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "InvalidRequest");

        let (status, _) = send(
            app(&repo),
            post(
                "/activate",
                json!({"code": code, "entryTimestamp": 1, "deviceId": "owner"}),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            app(&repo),
            post(
                "/activate",
                json!({"code": code, "entryTimestamp": 2, "deviceId": "other"}),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "AlreadyUsed");

        let (status, body) = send(
            app(&repo),
            post(
                "/activate",
                json!({"code": code, "entryTimestamp": 3, "deviceId": "other"}),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "DeviceBanned");
    }

    #[tokio::test]
    async fn test_admin_requires_key() {
        let repo = Repo::new();

        let (status, body) = send(app(&repo), get("/admin/batches", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "Unauthorized");

        let (status, _) = send(app(&repo), get("/admin/fraud", Some("wrong-key"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let locked = activation_router_generic(
            repo.clone(),
            crate::application::config::ActivationConfig {
                admin_api_key: None,
                ..config()
            },
        );
        let (status, _) = send(locked, get("/admin/fraud", Some("test-admin-key"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_batch_flow() {
        let repo = Repo::new();
        let key = Some("test-admin-key");

        let (status, body) = send(
            app(&repo),
            post(
                "/admin/batches",
                json!({"batchId": 4, "durationDays": 10, "count": 3}),
                key,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["codes"].as_array().map(Vec::len), Some(3));
        let first = body["codes"][0].as_str().unwrap().to_string();

        let (status, body) = send(
            app(&repo),
            post(
                "/admin/batches",
                json!({"batchId": 4, "durationDays": 10, "count": 3}),
                key,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "BatchExists");

        let (status, body) = send(
            app(&repo),
            post("/admin/codes/revoke", json!({"code": first}), key),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, body) = send(app(&repo), get("/admin/codes?batchId=4&status=revoked", key)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["codes"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["codes"][0]["status"], "revoked");

        let (status, body) = send(app(&repo), get("/admin/batches", key)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["batches"][0]["batchId"], 4);
        assert_eq!(body["batches"][0]["revoked"], 1);
        assert_eq!(body["batches"][0]["revenue"]["potential"], 10);
        assert_eq!(body["totals"]["totalCodes"], 3);

        let (status, body) = send(app(&repo), get("/admin/codes?status=bogus", key)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "InvalidRequest");
    }

    #[tokio::test]
    async fn test_admin_fraud_and_unban() {
        let repo = Repo::new();
        let code = seed_code(&repo, 30, 1);
        let key = Some("test-admin-key");

        for (device, ts) in [("owner", 1), ("D1", 2), ("D1", 3)] {
            let _ = send(
                app(&repo),
                post(
                    "/activate",
                    json!({"code": code, "entryTimestamp": ts, "deviceId": device}),
                    None,
                ),
            )
            .await;
        }

        let (status, body) = send(app(&repo), get("/admin/fraud", key)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stats"]["totalBanned"], 1);
        assert_eq!(body["stats"]["attemptsByReason"]["already_used"], 2);
        assert_eq!(body["bannedDevices"][0]["deviceId"], "D1");

        let (status, body) = send(
            app(&repo),
            post("/admin/fraud/unban", json!({"deviceId": "D1", "action": "unban"}), key),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], true);

        let (status, body) = send(
            app(&repo),
            post("/admin/fraud/unban", json!({"deviceId": "D1"}), key),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], false);

        let (status, _) = send(
            app(&repo),
            post("/admin/fraud/unban", json!({"deviceId": "D1", "action": "ban"}), key),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_activations_and_analytics() {
        let repo = Repo::new();
        let key = Some("test-admin-key");
        let first = seed_code(&repo, 30, 1);
        let second = seed_code(&repo, 365, 2);
        let _spare = seed_code(&repo, 30, 1);

        for (code, device) in [(&first, "phone-1"), (&second, "phone-2")] {
            let (status, _) = send(
                app(&repo),
                post(
                    "/activate",
                    json!({"code": code, "entryTimestamp": 1_700_000_000_000i64, "deviceId": device}),
                    None,
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, _) = send(app(&repo), get("/admin/activations", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(app(&repo), get("/admin/activations", key)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["limit"], 100);
        assert_eq!(body["activations"][0]["deviceId"], "phone-2");
        assert_eq!(body["activations"][0]["durationDays"], 365);
        assert_eq!(body["activations"][0]["batchId"], 2);

        let (status, body) = send(
            app(&repo),
            get("/admin/activations?deviceId=phone-1&limit=9999", key),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["limit"], 500);
        assert_eq!(body["activations"][0]["code"], first.as_str());

        let (status, body) = send(app(&repo), get("/admin/activations?limit=-1", key)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "InvalidRequest");

        let (status, body) = send(app(&repo), get("/admin/analytics", key)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totals"]["totalCodes"], 3);
        assert_eq!(body["totals"]["used"], 2);
        assert_eq!(body["totals"]["revenue"]["earned"], 165);
        assert_eq!(body["totals"]["revenue"]["potential"], 15);
        assert_eq!(body["conversionRate"], 66.7);
        assert_eq!(body["tiers"][3]["durationDays"], 365);
        assert_eq!(body["tiers"][3]["revenue"], 150);
        assert_eq!(body["recentActivations"].as_array().unwrap().len(), 2);
        assert_eq!(body["timeline"][0]["activations"], 2);
    }

    #[tokio::test]
    async fn test_fraud_stats_list_every_reason() {
        let repo = Repo::new();
        let (status, body) = send(app(&repo), get("/admin/fraud", Some("test-admin-key"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stats"]["attemptsByReason"]["not_found"], 0);
        assert_eq!(body["stats"]["attemptsByReason"]["already_used"], 0);
        assert_eq!(body["stats"]["attemptsByReason"]["revoked"], 0);
    }

    #[tokio::test]
    async fn test_unavailable_router() {
        let (status, body) = send(
            unavailable_router(),
            post("/activate", json!({"code": "x"}), None),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "InternalError");

        let (status, _) = send(unavailable_router(), get("/admin/fraud", None)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = send(unavailable_router(), get("/admin", None)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "InternalError");
    }
}
