use std::time::Duration;

use serde::{Deserialize, Serialize};

pub type RequestId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateBudgetConfig {
    /// Sustained allowance in cost units; 0 disables the local budget.
    #[serde(default = "default_limit_per_hour")]
    pub limit_per_hour: u32,
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for RateBudgetConfig {
    fn default() -> Self {
        Self {
            limit_per_hour: default_limit_per_hour(),
            burst: default_burst(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionCacheConfig {
    #[serde(default = "default_version_cache_reset_secs")]
    pub reset_interval_secs: u64,
}

impl VersionCacheConfig {
    pub fn reset_interval(&self) -> Duration {
        Duration::from_secs(self.reset_interval_secs)
    }
}

impl Default for VersionCacheConfig {
    fn default() -> Self {
        Self {
            reset_interval_secs: default_version_cache_reset_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// REST base URL, e.g. `https://api.github.com` or `https://ghe.example.com/api/v3`.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Environment variable holding the API token; unauthenticated when absent.
    #[serde(default)]
    pub token_env: Option<String>,
    #[serde(default = "default_public_hosts")]
    pub public_hosts: Vec<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub budget: RateBudgetConfig,
    #[serde(default)]
    pub version_cache: VersionCacheConfig,
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            token_env: None,
            public_hosts: default_public_hosts(),
            request_timeout_ms: default_request_timeout_ms(),
            budget: RateBudgetConfig::default(),
            version_cache: VersionCacheConfig::default(),
        }
    }
}

fn default_limit_per_hour() -> u32 {
    5_000
}

fn default_burst() -> u32 {
    500
}

fn default_version_cache_reset_secs() -> u64 {
    6 * 60
}

fn default_endpoint() -> String {
    "https://api.github.com".to_string()
}

pub fn default_public_hosts() -> Vec<String> {
    vec!["api.github.com".to_string(), "github.com".to_string()]
}

fn default_request_timeout_ms() -> u64 {
    30_000
}
