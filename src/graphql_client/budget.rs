use std::time::Duration;

use tokio::{
    sync::Mutex,
    time::{Instant, sleep},
};

use crate::graphql_client::{
    context::RequestContext,
    error::{ClientError, ClientErrorKind},
    types::RateBudgetConfig,
};

/// Self-imposed token bucket spent in units of estimated query cost.
///
/// Waiters queue on `turn`, a fair mutex, so acquisitions complete in arrival
/// order and a large request cannot be starved by a stream of small ones.
#[derive(Debug)]
pub struct RateBudget {
    capacity: u64,
    refill_per_second: f64,
    turn: Mutex<()>,
    bucket: Mutex<TokenBucket>,
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateBudget {
    pub fn new(config: &RateBudgetConfig) -> Self {
        let capacity = u64::from(config.burst.max(1));
        Self {
            capacity,
            refill_per_second: f64::from(config.limit_per_hour) / 3600.0,
            turn: Mutex::new(()),
            bucket: Mutex::new(TokenBucket {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(&RateBudgetConfig {
            limit_per_hour: 0,
            burst: 1,
        })
    }

    pub fn is_unlimited(&self) -> bool {
        self.refill_per_second <= 0.0
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub async fn available(&self) -> u64 {
        if self.is_unlimited() {
            return u64::MAX;
        }
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);
        bucket.tokens.floor() as u64
    }

    /// Waits until `cost` tokens are available and takes them.
    ///
    /// Nothing is consumed if the context is cancelled while waiting.
    pub async fn acquire(&self, cost: u64, ctx: &RequestContext) -> Result<(), ClientError> {
        if self.is_unlimited() {
            return Ok(());
        }

        if cost > self.capacity {
            return Err(ClientError::new(
                ClientErrorKind::BudgetExceeded,
                format!(
                    "query cost {} exceeds rate budget burst capacity {}",
                    cost, self.capacity
                ),
            ));
        }

        let _turn = ctx.run(self.turn.lock()).await?;
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                self.refill(&mut bucket);
                let needed = cost as f64;
                if bucket.tokens >= needed {
                    bucket.tokens -= needed;
                    None
                } else {
                    let deficit = needed - bucket.tokens;
                    Some(Duration::from_secs_f64(
                        (deficit / self.refill_per_second).max(0.005),
                    ))
                }
            };

            match wait {
                None => return Ok(()),
                Some(duration) => {
                    tracing::trace!(
                        target: "graphql_client",
                        cost = cost,
                        wait_ms = duration.as_millis() as u64,
                        "rate_budget_waiting"
                    );
                    ctx.run(sleep(duration)).await?;
                }
            }
        }
    }

    fn refill(&self, bucket: &mut TokenBucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            bucket.tokens =
                (bucket.tokens + elapsed * self.refill_per_second).min(self.capacity as f64);
            bucket.last_refill = now;
        }
    }
}
