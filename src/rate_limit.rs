//! Tiered Rate Limiting
//!
//! Sliding-window limiter keyed by (user, tier).
//!
//! Features:
//! - Independent budgets per tier (standard / thinking / generation)
//! - Trailing window: expired calls are pruned on every check
//! - Rejections never record a call
//! - Per-key locking through `DashMap` shards, no global lock

use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::UserId;

/// Named rate-limit budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Plain chat, code, translation, menus
    Standard,
    /// Deep thinking / analysis
    Thinking,
    /// Image and video generation
    Generation,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Standard, Tier::Thinking, Tier::Generation];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Thinking => "thinking",
            Self::Generation => "generation",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calls allowed per trailing period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierBudget {
    pub calls: u32,
    pub period: Duration,
}

impl TierBudget {
    pub const fn new(calls: u32, period_secs: u64) -> Self {
        Self {
            calls,
            period: Duration::from_secs(period_secs),
        }
    }

    /// Parse a `calls/seconds` pair such as `20/60`
    pub fn parse(s: &str) -> Option<Self> {
        let (calls, secs) = s.trim().split_once('/')?;
        let calls = calls.trim().parse().ok()?;
        let secs: u64 = secs.trim().parse().ok()?;
        if calls == 0 || secs == 0 {
            return None;
        }
        Some(Self::new(calls, secs))
    }
}

impl fmt::Display for TierBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}s", self.calls, self.period.as_secs())
    }
}

/// Budgets for every tier. Total by construction: an unconfigured tier
/// cannot be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierBudgets {
    pub standard: TierBudget,
    pub thinking: TierBudget,
    pub generation: TierBudget,
}

impl Default for TierBudgets {
    fn default() -> Self {
        Self {
            standard: TierBudget::new(20, 60),
            thinking: TierBudget::new(5, 120),
            generation: TierBudget::new(3, 300),
        }
    }
}

impl TierBudgets {
    pub fn get(&self, tier: Tier) -> TierBudget {
        match tier {
            Tier::Standard => self.standard,
            Tier::Thinking => self.thinking,
            Tier::Generation => self.generation,
        }
    }
}

/// Multi-tier sliding window rate limiter
pub struct RateLimiter {
    budgets: TierBudgets,
    /// (user, tier) -> admitted call instants, oldest first
    records: DashMap<(UserId, Tier), VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(budgets: TierBudgets) -> Self {
        Self {
            budgets,
            records: DashMap::new(),
        }
    }

    /// Check and record a call for `user` on `tier`. Returns true if admitted.
    pub fn is_allowed(&self, user: UserId, tier: Tier) -> bool {
        self.is_allowed_at(user, tier, Instant::now())
    }

    /// Same as [`is_allowed`](Self::is_allowed) with an explicit clock reading.
    pub fn is_allowed_at(&self, user: UserId, tier: Tier, now: Instant) -> bool {
        let budget = self.budgets.get(tier);
        let mut calls = self.records.entry((user, tier)).or_default();

        prune(&mut calls, budget.period, now);

        if calls.len() < budget.calls as usize {
            calls.push_back(now);
            debug!(
                "User {} admitted on {} tier ({}/{})",
                user,
                tier,
                calls.len(),
                budget.calls
            );
            true
        } else {
            warn!(
                "User {} rate limited on {} tier ({} calls in {}s)",
                user,
                tier,
                calls.len(),
                budget.period.as_secs()
            );
            false
        }
    }

    /// Calls still available to `user` on `tier` right now
    pub fn remaining(&self, user: UserId, tier: Tier) -> u32 {
        let budget = self.budgets.get(tier);
        let now = Instant::now();
        match self.records.get(&(user, tier)) {
            Some(calls) => {
                let live = calls.iter().filter(|&&t| is_live(t, budget.period, now)).count();
                budget.calls.saturating_sub(live as u32)
            }
            None => budget.calls,
        }
    }

    /// Seconds until the oldest live call leaves the window (0 if a call is admissible)
    pub fn retry_after(&self, user: UserId, tier: Tier) -> u64 {
        self.retry_after_at(user, tier, Instant::now())
    }

    pub fn retry_after_at(&self, user: UserId, tier: Tier, now: Instant) -> u64 {
        let budget = self.budgets.get(tier);
        let Some(calls) = self.records.get(&(user, tier)) else {
            return 0;
        };
        let live: Vec<Instant> = calls
            .iter()
            .copied()
            .filter(|&t| is_live(t, budget.period, now))
            .collect();
        if live.len() < budget.calls as usize {
            return 0;
        }
        live.first()
            .map(|&oldest| {
                let wait = budget.period.saturating_sub(now.saturating_duration_since(oldest));
                // round up so "retry in 0s" is never shown while still blocked
                wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
            })
            .unwrap_or(0)
    }

    /// Forget every tier for a user (admin action)
    pub fn reset_user(&self, user: UserId) -> bool {
        let mut removed = false;
        for tier in Tier::ALL {
            removed |= self.records.remove(&(user, tier)).is_some();
        }
        removed
    }

    pub fn stats(&self) -> RateLimitStats {
        let now = Instant::now();
        let mut users = std::collections::HashSet::new();
        let mut live_calls = 0;
        for record in self.records.iter() {
            let (user, tier) = *record.key();
            let period = self.budgets.get(tier).period;
            users.insert(user);
            live_calls += record.value().iter().filter(|&&t| is_live(t, period, now)).count();
        }
        RateLimitStats {
            tracked_users: users.len(),
            live_calls,
            budgets: self.budgets,
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(TierBudgets::default())
    }
}

fn is_live(t: Instant, period: Duration, now: Instant) -> bool {
    now.saturating_duration_since(t) < period
}

/// Drop calls at least `period` old. Entries are chronological, so pop from the front.
fn prune(calls: &mut VecDeque<Instant>, period: Duration, now: Instant) {
    while let Some(&oldest) = calls.front() {
        if is_live(oldest, period, now) {
            break;
        }
        calls.pop_front();
    }
}

/// Rate limiter statistics
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStats {
    pub tracked_users: usize,
    pub live_calls: usize,
    pub budgets: TierBudgets,
}
