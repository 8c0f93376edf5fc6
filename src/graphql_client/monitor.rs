use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use reqwest::header::HeaderMap;

pub const DEFAULT_HEADER_PREFIX: &str = "X-";

const STALE_RESET_ASSUMPTION: Duration = Duration::from_secs(60 * 60);
const RESET_SLACK: Duration = Duration::from_secs(3 * 60);
const PACED_WAIT: Duration = Duration::from_millis(200);

/// Last rate-limit state the server reported for one (endpoint, credential).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub known: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: SystemTime,
    pub retry_after: Option<SystemTime>,
}

impl Default for RateLimitSnapshot {
    fn default() -> Self {
        Self {
            known: false,
            limit: 0,
            remaining: 0,
            reset_at: UNIX_EPOCH,
            retry_after: None,
        }
    }
}

/// Tracks server-reported capacity and derives cooperative pacing from it.
///
/// Independent of [`crate::graphql_client::budget::RateBudget`]; neither is
/// derived from the other.
#[derive(Debug)]
pub struct RateLimitMonitor {
    header_prefix: String,
    state: Mutex<RateLimitSnapshot>,
}

impl Default for RateLimitMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_HEADER_PREFIX)
    }
}

impl RateLimitMonitor {
    pub fn new(header_prefix: impl Into<String>) -> Self {
        Self {
            header_prefix: header_prefix.into(),
            state: Mutex::new(RateLimitSnapshot::default()),
        }
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        *self.lock()
    }

    pub fn update(&self, headers: &HeaderMap) {
        self.update_at(headers, SystemTime::now());
    }

    /// Applies rate-limit headers. Missing or malformed limit headers mark the
    /// state unknown; `Retry-After` is kept independently.
    pub fn update_at(&self, headers: &HeaderMap, now: SystemTime) {
        let mut state = self.lock();

        if let Some(seconds) = header_u64(headers, "Retry-After").filter(|seconds| *seconds > 0) {
            state.retry_after = Some(now + Duration::from_secs(seconds));
        }

        let limit = header_u64(headers, &format!("{}RateLimit-Limit", self.header_prefix));
        let remaining = header_u64(headers, &format!("{}RateLimit-Remaining", self.header_prefix));
        let reset = header_u64(headers, &format!("{}RateLimit-Reset", self.header_prefix));

        match (limit, remaining, reset) {
            (Some(limit), Some(remaining), Some(reset)) => {
                state.known = true;
                state.limit = limit;
                state.remaining = remaining;
                state.reset_at = UNIX_EPOCH + Duration::from_secs(reset);
            }
            _ => {
                state.known = false;
            }
        }
    }

    pub fn recommended_wait_for_background_op(&self, cost: u64) -> Duration {
        recommended_wait(&self.snapshot(), cost, SystemTime::now())
    }

    fn lock(&self) -> MutexGuard<'_, RateLimitSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// How long a background operation of `cost` should wait so that it spreads
/// the remaining allowance over the time left until reset.
pub fn recommended_wait(snapshot: &RateLimitSnapshot, cost: u64, now: SystemTime) -> Duration {
    if let Some(retry_after) = snapshot.retry_after {
        if let Ok(remaining) = retry_after.duration_since(now) {
            if !remaining.is_zero() {
                return remaining;
            }
        }
    }

    if !snapshot.known {
        return Duration::ZERO;
    }

    // Out-of-date info: assume the window was reset.
    let (remaining, reset_at) = if now > snapshot.reset_at {
        (snapshot.limit, now + STALE_RESET_ASSUMPTION)
    } else {
        (snapshot.remaining, snapshot.reset_at)
    };

    let usable = remaining as f64 * 0.8 - 100.0;
    let window = reset_at.duration_since(now).unwrap_or_default() + RESET_SLACK;
    let cost = cost.max(1) as f64;
    let runs_left = usable / cost;

    if runs_left < 1.0 {
        return window;
    }
    if runs_left > 500.0 {
        return Duration::ZERO;
    }
    if runs_left > 250.0 {
        return PACED_WAIT;
    }
    Duration::from_secs_f64(window.as_secs_f64() * cost / usable)
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}
