//! # Usage Quota
//!
//! Daily send quotas per plan tier. The admission check itself is a pure
//! comparison; reading and writing the per-user counter goes through the
//! [`QuotaStore`] seam so the engine never touches ambient global state.
//! Daily reset is driven by comparing the stored last-used date against the
//! current date — the guard only ever compares numbers.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CertiflowError;

/// Subscription tiers and their daily document limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanTier {
    Free,
    #[serde(rename = "PAID_15")]
    Pro15,
    #[serde(rename = "PAID_MONTHLY")]
    ProMonthly,
}

impl PlanTier {
    /// Default daily limit for this tier.
    pub fn daily_limit(self) -> u32 {
        match self {
            PlanTier::Free => 50,
            PlanTier::Pro15 => 2000,
            PlanTier::ProMonthly => 5000,
        }
    }
}

/// Plan tier → daily limit mapping, passed in explicitly so deployments can
/// override pricing without code changes.
#[derive(Debug, Clone)]
pub struct UsagePolicy {
    limits: HashMap<PlanTier, u32>,
}

impl Default for UsagePolicy {
    fn default() -> Self {
        let mut limits = HashMap::new();
        for tier in [PlanTier::Free, PlanTier::Pro15, PlanTier::ProMonthly] {
            limits.insert(tier, tier.daily_limit());
        }
        Self { limits }
    }
}

impl UsagePolicy {
    pub fn with_limit(mut self, tier: PlanTier, limit: u32) -> Self {
        self.limits.insert(tier, limit);
        self
    }

    pub fn limit_for(&self, tier: PlanTier) -> u32 {
        self.limits
            .get(&tier)
            .copied()
            .unwrap_or_else(|| tier.daily_limit())
    }
}

/// All-or-nothing batch admission: a batch is admitted only if every send in
/// it fits under the daily limit. Pure function, no side effects.
pub fn can_admit(plan_limit: u32, current_usage: u32, batch_size: u32) -> bool {
    current_usage.saturating_add(batch_size) <= plan_limit
}

/// A user's daily counter with its reset bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyUsage {
    pub used: u32,
    pub last_used: NaiveDate,
}

impl DailyUsage {
    /// Reset the counter when the stored date differs from today.
    pub fn rollover(&mut self, today: NaiveDate) {
        if self.last_used != today {
            self.used = 0;
            self.last_used = today;
        }
    }
}

/// Quota state the runner reads at batch-admission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaState {
    pub plan_limit: u32,
    pub current_usage: u32,
}

/// External storage of per-user usage counters.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn quota_state(&self, user_id: &str) -> Result<QuotaState, CertiflowError>;

    async fn set_usage(&self, user_id: &str, new_usage: u32) -> Result<(), CertiflowError>;
}

/// In-memory quota store for tests, the CLI and the demo server. Stale
/// counters roll over on read, like the persisted per-user usage records.
#[derive(Debug)]
pub struct MemoryQuotaStore {
    plan_limit: u32,
    usage: Mutex<HashMap<String, DailyUsage>>,
}

impl MemoryQuotaStore {
    pub fn new(plan_limit: u32) -> Self {
        Self {
            plan_limit,
            usage: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_usage(self, user_id: &str, used: u32) -> Self {
        self.with_usage_on(user_id, used, Utc::now().date_naive())
    }

    /// Seed a counter with an explicit last-used date.
    pub fn with_usage_on(self, user_id: &str, used: u32, last_used: NaiveDate) -> Self {
        self.usage
            .lock()
            .unwrap()
            .insert(user_id.to_string(), DailyUsage { used, last_used });
        self
    }

    pub fn usage_of(&self, user_id: &str) -> u32 {
        self.usage
            .lock()
            .unwrap()
            .get(user_id)
            .map(|usage| usage.used)
            .unwrap_or(0)
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn quota_state(&self, user_id: &str) -> Result<QuotaState, CertiflowError> {
        let today = Utc::now().date_naive();
        let mut usage = self
            .usage
            .lock()
            .map_err(|e| CertiflowError::QuotaStore(e.to_string()))?;
        let current_usage = usage
            .get_mut(user_id)
            .map(|usage| {
                usage.rollover(today);
                usage.used
            })
            .unwrap_or(0);
        Ok(QuotaState {
            plan_limit: self.plan_limit,
            current_usage,
        })
    }

    async fn set_usage(&self, user_id: &str, new_usage: u32) -> Result<(), CertiflowError> {
        self.usage
            .lock()
            .map_err(|e| CertiflowError::QuotaStore(e.to_string()))?
            .insert(
                user_id.to_string(),
                DailyUsage {
                    used: new_usage,
                    last_used: Utc::now().date_naive(),
                },
            );
        Ok(())
    }
}
