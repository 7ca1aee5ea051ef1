//! Subscription snapshot returned by `GET /subscription/status`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Plan name used for the free tier.
pub const FREE_PLAN: &str = "free";

/// Per-plan numeric limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanLimits {
    pub daily_backtests: u32,
    pub saved_strategies: u32,
    pub historical_data_years: u32,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            daily_backtests: 3,
            saved_strategies: 3,
            historical_data_years: 1,
        }
    }
}

/// Usage counters for the current billing day
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageCounters {
    pub backtests_today: u32,
    pub saved_strategies: u32,
}

/// Subscription state for the signed-in user.
///
/// Missing fields deserialize to the free-tier values, so a partial backend
/// payload still yields a usable snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscriptionSnapshot {
    pub plan: String,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub limits: PlanLimits,
    pub usage: UsageCounters,
    pub can_run_backtest: bool,
    pub backtests_remaining: u32,
}

impl SubscriptionSnapshot {
    /// The safe default served whenever no fetched snapshot is available.
    pub fn free_tier() -> Self {
        Self {
            plan: FREE_PLAN.to_string(),
            is_active: true,
            expires_at: None,
            limits: PlanLimits::default(),
            usage: UsageCounters::default(),
            can_run_backtest: true,
            backtests_remaining: 3,
        }
    }

    pub fn is_free(&self) -> bool {
        self.plan == FREE_PLAN
    }

    /// True when the plan has lapsed relative to `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

impl Default for SubscriptionSnapshot {
    fn default() -> Self {
        Self::free_tier()
    }
}
