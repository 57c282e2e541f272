//! In-process fixed window rate limiter.
//!
//! Windows are keyed by `{preset}:{identifier}` and live in a shared map, so
//! clones handed to every server worker count against the same quota.
//! Expired windows are swept while checking once the map grows past
//! [`SWEEP_THRESHOLD`]. The map never holds more than `max_windows` keys;
//! unseen callers are refused while it is full.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use derive_more::Display;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

const SWEEP_THRESHOLD: usize = 1024;
const MAX_TRACKED_WINDOWS: usize = 50_000;

/// Named quotas shared by the application endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum RateLimitPreset {
    #[display("strict")]
    Strict,
    #[display("moderate")]
    Moderate,
    #[display("generous")]
    Generous,
    #[display("webhook")]
    Webhook,
    #[display("account_operations")]
    AccountOperations,
    #[display("payment")]
    Payment,
    #[display("notifications")]
    Notifications,
}

impl RateLimitPreset {
    /// Requests allowed per window
    pub fn limit(&self) -> u32 {
        match self {
            Self::Strict => 5,
            Self::Moderate => 20,
            Self::Generous => 100,
            Self::Webhook => 10,
            Self::AccountOperations => 3,
            Self::Payment => 10,
            Self::Notifications => 30,
        }
    }

    pub fn window(&self) -> TimeDelta {
        match self {
            Self::Strict | Self::Moderate | Self::Generous | Self::Webhook => {
                TimeDelta::seconds(60)
            }
            Self::AccountOperations | Self::Notifications => TimeDelta::hours(1),
            Self::Payment => TimeDelta::minutes(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, never negative
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.reset_at - now).num_seconds().max(0)
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct InMemoryRateLimiter {
    windows: Arc<Mutex<HashMap<String, Window>>>,
    max_windows: usize,
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::with_capacity(MAX_TRACKED_WINDOWS)
    }
}

impl InMemoryRateLimiter {
    pub fn with_capacity(max_windows: usize) -> Self {
        Self {
            windows: Arc::default(),
            max_windows,
        }
    }

    pub fn check_at(
        &self,
        identifier: &str,
        preset: RateLimitPreset,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let key = format!("{preset}:{identifier}");
        let limit = preset.limit();

        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        if windows.len() > SWEEP_THRESHOLD || windows.len() >= self.max_windows {
            windows.retain(|_, window| window.reset_at > now);
        }

        if windows.len() >= self.max_windows && !windows.contains_key(&key) {
            logfire::warn!(
                "Rate limiter is tracking {count} windows, refusing {preset} caller",
                count = windows.len().to_string(),
                preset = preset.to_string()
            );
            return RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_at: now + preset.window(),
            };
        }

        match windows.get_mut(&key) {
            Some(window) if window.reset_at > now => {
                if window.count >= limit {
                    return RateLimitDecision {
                        allowed: false,
                        limit,
                        remaining: 0,
                        reset_at: window.reset_at,
                    };
                }

                window.count += 1;
                RateLimitDecision {
                    allowed: true,
                    limit,
                    remaining: limit - window.count,
                    reset_at: window.reset_at,
                }
            }
            _ => {
                let reset_at = now + preset.window();
                windows.insert(
                    key,
                    Window {
                        count: 1,
                        reset_at,
                    },
                );

                RateLimitDecision {
                    allowed: true,
                    limit,
                    remaining: limit.saturating_sub(1),
                    reset_at,
                }
            }
        }
    }

    #[cfg(test)]
    fn tracked_windows(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl crate::services::RateLimitService for InMemoryRateLimiter {
    async fn check(&self, identifier: &str, preset: RateLimitPreset) -> RateLimitDecision {
        self.check_at(identifier, preset, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::RateLimitService;

    #[test]
    fn test_allows_until_quota_is_spent() {
        let limiter = InMemoryRateLimiter::default();
        let now = Utc::now();

        for expected_remaining in (0..10).rev() {
            let decision = limiter.check_at("ip:10.0.0.1", RateLimitPreset::Webhook, now);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
            assert_eq!(decision.limit, 10);
        }

        let decision = limiter.check_at("ip:10.0.0.1", RateLimitPreset::Webhook, now);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.reset_at, now + TimeDelta::seconds(60));
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let limiter = InMemoryRateLimiter::default();
        let now = Utc::now();

        for _ in 0..5 {
            limiter.check_at("ip:10.0.0.2", RateLimitPreset::Strict, now);
        }
        assert!(
            !limiter
                .check_at("ip:10.0.0.2", RateLimitPreset::Strict, now)
                .allowed
        );

        let later = now + TimeDelta::seconds(61);
        let decision = limiter.check_at("ip:10.0.0.2", RateLimitPreset::Strict, later);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 4);
    }

    #[test]
    fn test_identifiers_and_presets_are_isolated() {
        let limiter = InMemoryRateLimiter::default();
        let now = Utc::now();

        for _ in 0..3 {
            limiter.check_at("ip:10.0.0.3", RateLimitPreset::AccountOperations, now);
        }

        assert!(
            !limiter
                .check_at("ip:10.0.0.3", RateLimitPreset::AccountOperations, now)
                .allowed
        );
        assert!(
            limiter
                .check_at("ip:10.0.0.4", RateLimitPreset::AccountOperations, now)
                .allowed
        );
        assert!(
            limiter
                .check_at("ip:10.0.0.3", RateLimitPreset::Generous, now)
                .allowed
        );
    }

    #[test]
    fn test_clones_share_quota() {
        let limiter = InMemoryRateLimiter::default();
        let worker_copy = limiter.clone();
        let now = Utc::now();

        for _ in 0..5 {
            limiter.check_at("ip:10.0.0.5", RateLimitPreset::Strict, now);
        }

        assert!(
            !worker_copy
                .check_at("ip:10.0.0.5", RateLimitPreset::Strict, now)
                .allowed
        );
    }

    #[test]
    fn test_expired_windows_are_swept() {
        let limiter = InMemoryRateLimiter::default();
        let now = Utc::now();

        for i in 0..=SWEEP_THRESHOLD {
            limiter.check_at(&format!("ip:{i}"), RateLimitPreset::Webhook, now);
        }
        assert_eq!(limiter.tracked_windows(), SWEEP_THRESHOLD + 1);

        let later = now + TimeDelta::minutes(2);
        limiter.check_at("ip:fresh", RateLimitPreset::Webhook, later);
        assert_eq!(limiter.tracked_windows(), 1);
    }

    #[test]
    fn test_full_limiter_refuses_unseen_callers() {
        let limiter = InMemoryRateLimiter::with_capacity(2);
        let now = Utc::now();

        assert!(limiter.check_at("ip:10.0.1.1", RateLimitPreset::Webhook, now).allowed);
        assert!(limiter.check_at("ip:10.0.1.2", RateLimitPreset::Webhook, now).allowed);

        let rotated = limiter.check_at("ip:10.0.1.3", RateLimitPreset::Webhook, now);
        assert!(!rotated.allowed);
        assert_eq!(rotated.remaining, 0);
        assert_eq!(limiter.tracked_windows(), 2);

        assert!(limiter.check_at("ip:10.0.1.1", RateLimitPreset::Webhook, now).allowed);

        let later = now + TimeDelta::minutes(2);
        assert!(limiter.check_at("ip:10.0.1.3", RateLimitPreset::Webhook, later).allowed);
        assert_eq!(limiter.tracked_windows(), 1);
    }

    #[test]
    fn test_retry_after_is_never_negative() {
        let now = Utc::now();
        let decision = RateLimitDecision {
            allowed: false,
            limit: 10,
            remaining: 0,
            reset_at: now - TimeDelta::seconds(5),
        };

        assert_eq!(decision.retry_after_secs(now), 0);
    }

    #[ntex::test]
    async fn test_service_trait_uses_current_time() {
        let limiter = InMemoryRateLimiter::default();
        let decision = limiter.check("ip:10.0.0.6", RateLimitPreset::Payment).await;

        assert!(decision.allowed);
        assert_eq!(decision.remaining, 9);
        assert!(decision.reset_at > Utc::now());
    }
}
