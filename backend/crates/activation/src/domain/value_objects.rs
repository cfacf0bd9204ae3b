//! Domain Value Objects
//!
//! Immutable value types for the activation domain.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Device identifier supplied by the client app
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    pub const MAX_LEN: usize = 255;

    /// Trimmed, non-empty, at most [`Self::MAX_LEN`] bytes, no control characters.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.len() > Self::MAX_LEN
            || trimmed.chars().any(char::is_control)
        {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a code. `Used` and `Revoked` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeStatus {
    Available,
    Used,
    Revoked,
}

impl CodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeStatus::Available => "available",
            CodeStatus::Used => "used",
            CodeStatus::Revoked => "revoked",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, CodeStatus::Available)
    }
}

impl fmt::Display for CodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(CodeStatus::Available),
            "used" => Ok(CodeStatus::Used),
            "revoked" => Ok(CodeStatus::Revoked),
            other => Err(format!("unknown code status: {}", other)),
        }
    }
}

/// Why an activation attempt was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    NotFound,
    AlreadyUsed,
    Revoked,
}

impl FailureReason {
    pub const ALL: [FailureReason; 3] = [
        FailureReason::NotFound,
        FailureReason::AlreadyUsed,
        FailureReason::Revoked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::NotFound => "not_found",
            FailureReason::AlreadyUsed => "already_used",
            FailureReason::Revoked => "revoked",
        }
    }

    /// Whether this rejection runs the fraud policy.
    ///
    /// Revoked-code attempts are not a fraud signal.
    pub fn triggers_fraud_check(&self) -> bool {
        matches!(self, FailureReason::NotFound | FailureReason::AlreadyUsed)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_found" => Ok(FailureReason::NotFound),
            "already_used" => Ok(FailureReason::AlreadyUsed),
            "revoked" => Ok(FailureReason::Revoked),
            other => Err(format!("unknown failure reason: {}", other)),
        }
    }
}

/// Sold duration tiers and their unit price
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingTier {
    TenDays,
    ThirtyDays,
    NinetyDays,
    OneYear,
}

impl PricingTier {
    pub const ALL: [PricingTier; 4] = [
        PricingTier::TenDays,
        PricingTier::ThirtyDays,
        PricingTier::NinetyDays,
        PricingTier::OneYear,
    ];

    pub fn from_days(duration_days: u32) -> Option<Self> {
        match duration_days {
            10 => Some(PricingTier::TenDays),
            30 => Some(PricingTier::ThirtyDays),
            90 => Some(PricingTier::NinetyDays),
            365 => Some(PricingTier::OneYear),
            _ => None,
        }
    }

    pub fn days(&self) -> u32 {
        match self {
            PricingTier::TenDays => 10,
            PricingTier::ThirtyDays => 30,
            PricingTier::NinetyDays => 90,
            PricingTier::OneYear => 365,
        }
    }

    pub fn unit_price(&self) -> u64 {
        match self {
            PricingTier::TenDays => 5,
            PricingTier::ThirtyDays => 15,
            PricingTier::NinetyDays => 50,
            PricingTier::OneYear => 150,
        }
    }
}

/// Unit price for a duration; durations outside the price list are free.
pub fn unit_price_for(duration_days: u32) -> u64 {
    PricingTier::from_days(duration_days)
        .map(|tier| tier.unit_price())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_parse() {
        assert_eq!(DeviceId::parse("  dev-1 ").unwrap().as_str(), "dev-1");
        assert!(DeviceId::parse("").is_none());
        assert!(DeviceId::parse("   ").is_none());
        assert!(DeviceId::parse("dev\n1").is_none());
        assert!(DeviceId::parse(&"x".repeat(DeviceId::MAX_LEN + 1)).is_none());
        assert!(DeviceId::parse(&"x".repeat(DeviceId::MAX_LEN)).is_some());
    }

    #[test]
    fn test_status_round_trip_text() {
        for status in [CodeStatus::Available, CodeStatus::Used, CodeStatus::Revoked] {
            assert_eq!(status.as_str().parse::<CodeStatus>().unwrap(), status);
        }
        assert!("deleted".parse::<CodeStatus>().is_err());
        assert!(CodeStatus::Used.is_terminal());
        assert!(!CodeStatus::Available.is_terminal());
    }

    #[test]
    fn test_failure_reason_fraud_classes() {
        assert!(FailureReason::NotFound.triggers_fraud_check());
        assert!(FailureReason::AlreadyUsed.triggers_fraud_check());
        assert!(!FailureReason::Revoked.triggers_fraud_check());
        assert_eq!(
            serde_json::to_string(&FailureReason::AlreadyUsed).unwrap(),
            "\"already_used\""
        );
    }

    #[test]
    fn test_pricing() {
        assert_eq!(unit_price_for(10), 5);
        assert_eq!(unit_price_for(30), 15);
        assert_eq!(unit_price_for(90), 50);
        assert_eq!(unit_price_for(365), 150);
        assert_eq!(unit_price_for(7), 0);
        assert_eq!(PricingTier::from_days(90).map(|t| t.days()), Some(90));
    }
}
