//! Domain Services
//!
//! Pure decision logic for activation: fraud policy, expiry, tokens.

use chrono::{DateTime, Duration, Utc};
use platform::crypto::{hmac_sha256, to_base64};

/// Outcome of the fraud policy for one rejected attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FraudDecision {
    Allow,
    Ban,
}

/// Ban once the count of recent already-used attempts, the current one
/// included, reaches `threshold`.
pub fn evaluate_fraud(recent_already_used: u32, threshold: u32) -> FraudDecision {
    if recent_already_used >= threshold {
        FraudDecision::Ban
    } else {
        FraudDecision::Allow
    }
}

/// Expiry of an activation starting at `now`.
///
/// `None` when the result falls outside the representable date range.
pub fn compute_expiry(now: DateTime<Utc>, duration_days: u32) -> Option<DateTime<Utc>> {
    now.checked_add_signed(Duration::try_days(i64::from(duration_days))?)
}

/// How activation tokens are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenFormat {
    /// `base64("{code}:{device_id}:{millis}")`. Opaque to clients but
    /// trivially forgeable: a capability hint, not a credential.
    #[default]
    Plain,
    /// Plain payload followed by `.` and `base64(HMAC-SHA256(secret, payload))`
    Signed,
}

/// Build the activation token handed back to the client app.
pub fn generate_token(
    format: TokenFormat,
    secret: &[u8; 32],
    code: &str,
    device_id: &str,
    issued_at: DateTime<Utc>,
) -> String {
    let payload = format!("{}:{}:{}", code, device_id, issued_at.timestamp_millis());
    let encoded = to_base64(payload.as_bytes());

    match format {
        TokenFormat::Plain => encoded,
        TokenFormat::Signed => {
            let tag = hmac_sha256(secret, payload.as_bytes());
            format!("{}.{}", encoded, to_base64(&tag))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use platform::crypto::from_base64;

    #[test]
    fn test_fraud_threshold_is_inclusive() {
        assert_eq!(evaluate_fraud(0, 2), FraudDecision::Allow);
        assert_eq!(evaluate_fraud(1, 2), FraudDecision::Allow);
        assert_eq!(evaluate_fraud(2, 2), FraudDecision::Ban);
        assert_eq!(evaluate_fraud(7, 2), FraudDecision::Ban);
    }

    #[test]
    fn test_compute_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 2, 20, 12, 0, 0).unwrap();
        assert_eq!(
            compute_expiry(now, 10),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single()
        );
        assert_eq!(
            compute_expiry(now, 365),
            Utc.with_ymd_and_hms(2025, 2, 19, 12, 0, 0).single()
        );
    }

    #[test]
    fn test_compute_expiry_out_of_range() {
        assert_eq!(compute_expiry(Utc::now(), u32::MAX), None);
        assert_eq!(compute_expiry(DateTime::<Utc>::MAX_UTC, 1), None);
    }

    #[test]
    fn test_plain_token_layout() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let token = generate_token(TokenFormat::Plain, &[0u8; 32], "AB12-1E01-CD34-EF56", "dev-1", at);

        let decoded = String::from_utf8(from_base64(&token).unwrap()).unwrap();
        assert_eq!(decoded, "AB12-1E01-CD34-EF56:dev-1:1700000000123");
    }

    #[test]
    fn test_signed_token_carries_hmac() {
        let secret = [7u8; 32];
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let token = generate_token(TokenFormat::Signed, &secret, "CODE", "dev", at);

        let (payload_b64, tag_b64) = token.split_once('.').unwrap();
        let payload = from_base64(payload_b64).unwrap();
        assert_eq!(payload, b"CODE:dev:1700000000000");
        assert_eq!(from_base64(tag_b64).unwrap(), hmac_sha256(&secret, &payload));

        let other = generate_token(TokenFormat::Signed, &[8u8; 32], "CODE", "dev", at);
        assert_ne!(token, other);
    }
}
