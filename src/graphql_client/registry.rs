use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::graphql_client::{
    budget::RateBudget, monitor::RateLimitMonitor, types::RateBudgetConfig,
};

/// (endpoint, credential identity) pair that owns one set of rate resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub endpoint: String,
    pub credential_hash: String,
}

impl RateLimitKey {
    pub fn new(endpoint: impl Into<String>, credential_hash: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            credential_hash: credential_hash.into(),
        }
    }
}

/// Hands out shared [`RateBudget`]s and [`RateLimitMonitor`]s.
///
/// The two maps are locked separately so budget bookkeeping never waits on
/// status bookkeeping.
#[derive(Debug, Default)]
pub struct RateLimitRegistry {
    budget_config: RateBudgetConfig,
    budgets: Mutex<HashMap<RateLimitKey, Arc<RateBudget>>>,
    monitors: Mutex<HashMap<RateLimitKey, Arc<RateLimitMonitor>>>,
}

impl RateLimitRegistry {
    pub fn new(budget_config: RateBudgetConfig) -> Self {
        Self {
            budget_config,
            budgets: Mutex::new(HashMap::new()),
            monitors: Mutex::new(HashMap::new()),
        }
    }

    pub fn budget(&self, key: &RateLimitKey) -> Arc<RateBudget> {
        let mut guard = lock(&self.budgets);
        guard
            .entry(key.clone())
            .or_insert_with(|| Arc::new(RateBudget::new(&self.budget_config)))
            .clone()
    }

    pub fn monitor(&self, key: &RateLimitKey) -> Arc<RateLimitMonitor> {
        let mut guard = lock(&self.monitors);
        guard
            .entry(key.clone())
            .or_insert_with(|| Arc::new(RateLimitMonitor::default()))
            .clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
