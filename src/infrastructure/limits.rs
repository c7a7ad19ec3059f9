//! Tenant-keyed request rate limiting and daily token quotas. Counters live
//! in fixed windows (per-minute, per-day) and expire with the window; they
//! are advisory throttles, not billing records.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::value_objects::TenantId;

const MINUTE: u64 = 60;
const DAY: u64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitDecision {
    Allowed,
    RateLimited,
    QuotaExhausted,
}

pub struct TenantLimiter {
    requests_per_minute: u32,
    daily_token_quota: i64,
    state: Mutex<LimiterState>,
}

#[derive(Default)]
struct LimiterState {
    minute_window: u64,
    requests: HashMap<String, u32>,
    day_window: u64,
    tokens: HashMap<String, i64>,
}

impl TenantLimiter {
    pub fn new(requests_per_minute: u32, daily_token_quota: i64) -> Self {
        Self {
            requests_per_minute,
            daily_token_quota,
            state: Mutex::new(LimiterState::default()),
        }
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    fn roll_windows(state: &mut LimiterState, now: u64) {
        let minute = now / MINUTE;
        if state.minute_window != minute {
            state.minute_window = minute;
            state.requests.clear();
        }
        let day = now / DAY;
        if state.day_window != day {
            state.day_window = day;
            state.tokens.clear();
        }
    }

    /// Count one request against the tenant's per-minute budget.
    pub fn check_request(&self, tenant: &TenantId) -> LimitDecision {
        self.check_request_at(tenant, Self::now())
    }

    fn check_request_at(&self, tenant: &TenantId, now: u64) -> LimitDecision {
        let mut state = self.state.lock().expect("limiter poisoned");
        Self::roll_windows(&mut state, now);
        let count = state
            .requests
            .entry(tenant.as_str().to_string())
            .or_insert(0);
        if *count >= self.requests_per_minute {
            return LimitDecision::RateLimited;
        }
        *count += 1;
        LimitDecision::Allowed
    }

    /// Reserve `tokens` against today's quota; callers ask before invoking
    /// the LLM with an estimate and settle with actual usage.
    pub fn check_tokens(&self, tenant: &TenantId, tokens: i64) -> LimitDecision {
        self.check_tokens_at(tenant, tokens, Self::now())
    }

    fn check_tokens_at(&self, tenant: &TenantId, tokens: i64, now: u64) -> LimitDecision {
        let mut state = self.state.lock().expect("limiter poisoned");
        Self::roll_windows(&mut state, now);
        let used = state.tokens.entry(tenant.as_str().to_string()).or_insert(0);
        if *used + tokens > self.daily_token_quota {
            return LimitDecision::QuotaExhausted;
        }
        *used += tokens;
        LimitDecision::Allowed
    }

    pub fn remaining_quota(&self, tenant: &TenantId) -> i64 {
        let mut state = self.state.lock().expect("limiter poisoned");
        Self::roll_windows(&mut state, Self::now());
        let used = state.tokens.get(tenant.as_str()).copied().unwrap_or(0);
        (self.daily_token_quota - used).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(name: &str) -> TenantId {
        TenantId::new(name).unwrap()
    }

    #[test]
    fn requests_above_limit_are_rejected() {
        let limiter = TenantLimiter::new(3, 1000);
        let t = tenant("acme");
        for _ in 0..3 {
            assert_eq!(limiter.check_request_at(&t, 100), LimitDecision::Allowed);
        }
        assert_eq!(limiter.check_request_at(&t, 100), LimitDecision::RateLimited);
    }

    #[test]
    fn minute_window_resets_the_counter() {
        let limiter = TenantLimiter::new(1, 1000);
        let t = tenant("acme");
        assert_eq!(limiter.check_request_at(&t, 100), LimitDecision::Allowed);
        assert_eq!(limiter.check_request_at(&t, 110), LimitDecision::RateLimited);
        assert_eq!(limiter.check_request_at(&t, 161), LimitDecision::Allowed);
    }

    #[test]
    fn tenants_do_not_share_budgets() {
        let limiter = TenantLimiter::new(1, 1000);
        assert_eq!(
            limiter.check_request_at(&tenant("a"), 100),
            LimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_request_at(&tenant("b"), 100),
            LimitDecision::Allowed
        );
    }

    #[test]
    fn token_quota_exhausts_and_rolls_daily() {
        let limiter = TenantLimiter::new(100, 500);
        let t = tenant("acme");
        assert_eq!(
            limiter.check_tokens_at(&t, 400, 1000),
            LimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_tokens_at(&t, 200, 1000),
            LimitDecision::QuotaExhausted
        );
        assert_eq!(
            limiter.check_tokens_at(&t, 200, 1000 + DAY),
            LimitDecision::Allowed
        );
    }

    #[test]
    fn rejected_reservation_leaves_quota_untouched() {
        let limiter = TenantLimiter::new(100, 500);
        let t = tenant("acme");
        assert_eq!(
            limiter.check_tokens_at(&t, 600, 1000),
            LimitDecision::QuotaExhausted
        );
        assert_eq!(
            limiter.check_tokens_at(&t, 500, 1000),
            LimitDecision::Allowed
        );
    }
}
