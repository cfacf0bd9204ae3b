//! Activation History and Analytics Use Cases

use crate::application::manage_codes::RevenueSummary;
use crate::domain::entities::{ActivationView, DailyActivations, TierStats};
use crate::domain::repository::{ActivationQuery, CodeRepository};
use crate::domain::value_objects::{PricingTier, unit_price_for};
use crate::error::ActivationResult;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DEFAULT_ACTIVATION_LIMIT: u32 = 100;
pub const MAX_ACTIVATION_LIMIT: u32 = 500;
pub const RECENT_ACTIVATIONS: u32 = 10;
pub const TIMELINE_DAYS: i64 = 30;

/// History filters as received from the admin API
#[derive(Debug, Clone, Default)]
pub struct ListActivationsInput {
    pub device_id: Option<String>,
    pub code: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListActivationsInput {
    fn into_query(self) -> ActivationQuery {
        let non_empty = |value: Option<String>| {
            value
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        ActivationQuery {
            device_id: non_empty(self.device_id),
            code: non_empty(self.code),
            limit: self
                .limit
                .unwrap_or(DEFAULT_ACTIVATION_LIMIT)
                .clamp(1, MAX_ACTIVATION_LIMIT),
            offset: self.offset.unwrap_or(0),
        }
    }
}

/// List Activations Use Case
pub struct ListActivationsUseCase<C>
where
    C: CodeRepository,
{
    code_repo: Arc<C>,
}

impl<C> ListActivationsUseCase<C>
where
    C: CodeRepository,
{
    pub fn new(code_repo: Arc<C>) -> Self {
        Self { code_repo }
    }

    pub async fn execute(
        &self,
        input: ListActivationsInput,
    ) -> ActivationResult<(ActivationQuery, Vec<ActivationView>)> {
        let query = input.into_query();
        let activations = self.code_repo.list_activations(&query).await?;
        Ok((query, activations))
    }
}

/// Sales of one priced tier
#[derive(Debug, Clone, PartialEq)]
pub struct TierBreakdown {
    pub duration_days: u32,
    pub unit_price: u64,
    pub codes: u64,
    pub used: u64,
    /// Earned revenue
    pub revenue: u64,
}

/// Activations on one UTC day
#[derive(Debug, Clone, PartialEq)]
pub struct TimelinePoint {
    pub day: NaiveDate,
    pub activations: u64,
    pub revenue: u64,
}

#[derive(Debug, Clone)]
pub struct AnalyticsReport {
    pub total_batches: usize,
    pub summary: RevenueSummary,
    /// Used codes over all codes, in percent with one decimal
    pub conversion_rate: f64,
    pub tiers: Vec<TierBreakdown>,
    pub recent_activations: Vec<ActivationView>,
    /// Oldest day first, days without activations omitted
    pub timeline: Vec<TimelinePoint>,
}

/// Analytics Use Case
pub struct AnalyticsUseCase<C>
where
    C: CodeRepository,
{
    code_repo: Arc<C>,
}

impl<C> AnalyticsUseCase<C>
where
    C: CodeRepository,
{
    pub fn new(code_repo: Arc<C>) -> Self {
        Self { code_repo }
    }

    pub async fn execute(&self) -> ActivationResult<AnalyticsReport> {
        self.execute_at(Utc::now()).await
    }

    pub async fn execute_at(&self, now: DateTime<Utc>) -> ActivationResult<AnalyticsReport> {
        let stats = self.code_repo.tier_stats().await?;
        let total_batches = self.code_repo.batch_stats().await?.len();

        let recent_activations = self
            .code_repo
            .list_activations(&ActivationQuery {
                limit: RECENT_ACTIVATIONS,
                ..Default::default()
            })
            .await?;

        let daily = self
            .code_repo
            .daily_activations(now - Duration::days(TIMELINE_DAYS))
            .await?;

        let summary = summarize(&stats);
        Ok(AnalyticsReport {
            total_batches,
            conversion_rate: conversion_rate(summary.used, summary.total_codes),
            summary,
            tiers: tier_breakdown(&stats),
            recent_activations,
            timeline: timeline(&daily),
        })
    }
}

fn summarize(stats: &[TierStats]) -> RevenueSummary {
    stats.iter().fold(RevenueSummary::default(), |mut sum, tier| {
        let price = tier.unit_price();
        sum.total_codes += tier.total;
        sum.used += tier.used;
        sum.revoked += tier.revoked;
        sum.available += tier.available();
        sum.total_value += tier.total * price;
        sum.earned += tier.used * price;
        sum.potential += tier.available() * price;
        sum
    })
}

/// Every priced tier appears, even without codes
fn tier_breakdown(stats: &[TierStats]) -> Vec<TierBreakdown> {
    PricingTier::ALL
        .iter()
        .map(|tier| {
            let days = tier.days();
            let counts = stats
                .iter()
                .find(|s| s.duration_days == days)
                .cloned()
                .unwrap_or_else(|| TierStats::empty(days));
            TierBreakdown {
                duration_days: days,
                unit_price: tier.unit_price(),
                codes: counts.total,
                used: counts.used,
                revenue: counts.used * tier.unit_price(),
            }
        })
        .collect()
}

fn conversion_rate(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (used as f64 * 1000.0 / total as f64).round() / 10.0
}

fn timeline(daily: &[DailyActivations]) -> Vec<TimelinePoint> {
    let mut by_day: BTreeMap<NaiveDate, (u64, u64)> = BTreeMap::new();
    for entry in daily {
        let point = by_day.entry(entry.day).or_default();
        point.0 += entry.count;
        point.1 += entry.count * unit_price_for(entry.duration_days);
    }

    by_day
        .into_iter()
        .map(|(day, (activations, revenue))| TimelinePoint {
            day,
            activations,
            revenue,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_limit_defaults_and_caps() {
        let query = ListActivationsInput::default().into_query();
        assert_eq!(query.limit, DEFAULT_ACTIVATION_LIMIT);
        assert_eq!(query.offset, 0);

        let query = ListActivationsInput {
            limit: Some(5_000),
            device_id: Some("  ".into()),
            code: Some(" ABCD ".into()),
            ..Default::default()
        }
        .into_query();
        assert_eq!(query.limit, MAX_ACTIVATION_LIMIT);
        assert!(query.device_id.is_none());
        assert_eq!(query.code.as_deref(), Some("ABCD"));
    }

    #[test]
    fn test_conversion_rate_rounds_to_one_decimal() {
        assert_eq!(conversion_rate(0, 0), 0.0);
        assert_eq!(conversion_rate(1, 3), 33.3);
        assert_eq!(conversion_rate(2, 3), 66.7);
        assert_eq!(conversion_rate(4, 4), 100.0);
    }

    #[test]
    fn test_tier_breakdown_covers_every_priced_tier() {
        let stats = vec![
            TierStats {
                duration_days: 7,
                total: 4,
                used: 4,
                revoked: 0,
            },
            TierStats {
                duration_days: 30,
                total: 3,
                used: 2,
                revoked: 1,
            },
        ];

        let tiers = tier_breakdown(&stats);
        assert_eq!(
            tiers.iter().map(|t| t.duration_days).collect::<Vec<_>>(),
            vec![10, 30, 90, 365]
        );
        assert_eq!(tiers[0].codes, 0);
        assert_eq!(tiers[1].used, 2);
        assert_eq!(tiers[1].revenue, 30);

        // Unpriced durations count toward totals but earn nothing
        let summary = summarize(&stats);
        assert_eq!(summary.total_codes, 7);
        assert_eq!(summary.used, 6);
        assert_eq!(summary.earned, 30);
        assert_eq!(summary.potential, 0);
    }

    #[test]
    fn test_timeline_folds_tiers_per_day() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let next = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let daily = vec![
            DailyActivations {
                day,
                duration_days: 10,
                count: 2,
            },
            DailyActivations {
                day,
                duration_days: 365,
                count: 1,
            },
            DailyActivations {
                day: next,
                duration_days: 30,
                count: 1,
            },
        ];

        assert_eq!(
            timeline(&daily),
            vec![
                TimelinePoint {
                    day,
                    activations: 3,
                    revenue: 160,
                },
                TimelinePoint {
                    day: next,
                    activations: 1,
                    revenue: 15,
                },
            ]
        );
    }
}
