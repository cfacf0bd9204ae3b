//! Application Configuration
//!
//! Configuration for the activation application layer.

use std::time::Duration;

pub use crate::domain::services::TokenFormat;

/// Checksum secret baked into codes issued before the secret was configurable.
/// Insecure; real deployments must override it.
pub const LEGACY_CODE_SECRET: &str = "zii-chat-secret-2024";

/// Activation application configuration
#[derive(Clone)]
pub struct ActivationConfig {
    /// Secret mixed into every code checksum
    pub code_secret: String,
    /// Recent already-used attempts that ban a device
    pub ban_threshold: u32,
    /// Trailing window for counting already-used attempts
    pub fraud_window: Duration,
    /// Durations batch generation accepts
    pub allowed_durations: Vec<u32>,
    /// Upper bound on codes per batch
    pub max_batch_size: u32,
    pub token_format: TokenFormat,
    /// HMAC key for signed tokens (32 bytes)
    pub token_secret: [u8; 32],
    /// Bearer key for the admin routes. `None` locks them.
    pub admin_api_key: Option<String>,
}

impl std::fmt::Debug for ActivationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationConfig")
            .field("ban_threshold", &self.ban_threshold)
            .field("fraud_window", &self.fraud_window)
            .field("allowed_durations", &self.allowed_durations)
            .field("max_batch_size", &self.max_batch_size)
            .field("token_format", &self.token_format)
            .field("admin_api_key", &self.admin_api_key.as_ref().map(|_| "<set>"))
            .finish_non_exhaustive()
    }
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            code_secret: LEGACY_CODE_SECRET.to_string(),
            ban_threshold: 2,
            fraud_window: Duration::from_secs(24 * 60 * 60),
            allowed_durations: vec![10, 30, 90, 365],
            max_batch_size: 10_000,
            token_format: TokenFormat::Plain,
            token_secret: [0u8; 32],
            admin_api_key: None,
        }
    }
}

impl ActivationConfig {
    /// Config for development: legacy secret, fixed admin key
    pub fn development() -> Self {
        Self {
            admin_api_key: Some("dev-admin-key".to_string()),
            ..Default::default()
        }
    }

    pub fn uses_legacy_secret(&self) -> bool {
        self.code_secret == LEGACY_CODE_SECRET
    }

    pub fn fraud_window_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.fraud_window).unwrap_or(chrono::Duration::hours(24))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ActivationConfig::default();
        assert!(config.uses_legacy_secret());
        assert_eq!(config.ban_threshold, 2);
        assert_eq!(config.fraud_window_chrono(), chrono::Duration::hours(24));
        assert_eq!(config.allowed_durations, vec![10, 30, 90, 365]);
        assert_eq!(config.token_format, TokenFormat::Plain);
        assert!(config.admin_api_key.is_none());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = ActivationConfig {
            admin_api_key: Some("hunter2".into()),
            ..ActivationConfig::development()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains(LEGACY_CODE_SECRET));
    }
}
