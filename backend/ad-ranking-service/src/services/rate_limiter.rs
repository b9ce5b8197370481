use crate::utils::seconds_until_ceil;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum number of events per window
    pub max_events: u32,
    /// Window length in seconds
    pub window_seconds: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_events: 100,
            window_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited { retry_after_seconds: u64 },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed)
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Fixed-window per-session event counter.
///
/// Entries are replaced lazily once their window has passed and removed in
/// bulk by [`RateLimiter::sweep_expired`].
pub struct RateLimiter {
    windows: DashMap<String, WindowEntry>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config,
        }
    }

    pub fn check(&self, session_id: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let window = Duration::seconds(self.config.window_seconds);
        let mut entry = self
            .windows
            .entry(session_id.to_string())
            .or_insert(WindowEntry {
                count: 0,
                reset_at: now + window,
            });

        if entry.count == 0 || now >= entry.reset_at {
            *entry = WindowEntry {
                count: 1,
                reset_at: now + window,
            };
            return RateLimitDecision::Allowed;
        }

        if entry.count >= self.config.max_events {
            let retry_after_seconds = seconds_until_ceil(now, entry.reset_at);
            debug!(
                session_id = session_id,
                retry_after_seconds = retry_after_seconds,
                "Rate limit exceeded"
            );
            return RateLimitDecision::Limited {
                retry_after_seconds,
            };
        }

        entry.count += 1;
        RateLimitDecision::Allowed
    }

    /// Drop entries whose window has already reset
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, entry| now < entry.reset_at);
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_sessions(&self) -> usize {
        self.windows.len()
    }
}
