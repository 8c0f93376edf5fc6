use std::{collections::HashMap, future::Future, time::Duration};

use semver::{Version, VersionReq};
use tokio::{sync::Mutex, time::Instant};

use crate::graphql_client::{
    endpoint::ApiEndpoint,
    error::{ClientError, ClientErrorKind, invalid_request, parse_error},
};

/// Version that satisfies every feature requirement.
pub const ALL_MATCHING_VERSION: Version = Version::new(999_999, 0, 0);

/// Server versions per endpoint, dropped wholesale once `reset_interval`
/// has passed since the last reset.
///
/// One lock guards the whole cache and stays held while a miss is fetched, so
/// concurrent lookups for any endpoint queue behind an in-flight fetch.
#[derive(Debug)]
pub struct VersionCache {
    reset_interval: Duration,
    state: Mutex<VersionCacheState>,
}

#[derive(Debug, Default)]
struct VersionCacheState {
    last_reset: Option<Instant>,
    versions: HashMap<String, Version>,
}

impl VersionCache {
    pub fn new(reset_interval: Duration) -> Self {
        Self {
            reset_interval,
            state: Mutex::new(VersionCacheState::default()),
        }
    }

    pub async fn cached_entries(&self) -> usize {
        self.state.lock().await.versions.len()
    }

    /// Returns the cached version for `endpoint`, calling `fetch` on a miss.
    ///
    /// Never fails: fetch errors degrade to [`ALL_MATCHING_VERSION`].
    pub async fn get_or_fetch<F, Fut>(&self, endpoint: &ApiEndpoint, fetch: F) -> Version
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Version, ClientError>>,
    {
        if endpoint.is_public() {
            return ALL_MATCHING_VERSION;
        }

        let key = endpoint.cache_key();
        let mut state = self.state.lock().await;

        let now = Instant::now();
        let expired = state
            .last_reset
            .is_none_or(|last_reset| now.duration_since(last_reset) > self.reset_interval);
        if expired {
            if !state.versions.is_empty() {
                tracing::debug!(
                    target: "graphql_client",
                    entries = state.versions.len(),
                    "version_cache_reset"
                );
            }
            state.versions.clear();
            state.last_reset = Some(now);
        }

        if let Some(version) = state.versions.get(&key) {
            return version.clone();
        }

        let version = match fetch().await {
            Ok(version) => version,
            // Not cached: the next caller gets to try again.
            Err(err) if err.kind == ClientErrorKind::Cancelled => {
                tracing::debug!(
                    target: "graphql_client",
                    endpoint = %endpoint,
                    "server_version_detection_cancelled"
                );
                return ALL_MATCHING_VERSION;
            }
            Err(err) => {
                tracing::warn!(
                    target: "graphql_client",
                    endpoint = %endpoint,
                    kind = ?err.kind,
                    error = %err,
                    "server_version_detection_failed"
                );
                ALL_MATCHING_VERSION
            }
        };

        tracing::debug!(
            target: "graphql_client",
            endpoint = %endpoint,
            version = %version,
            "server_version_cached"
        );
        state.versions.insert(key, version.clone());
        version
    }
}

/// Parses an `installed_version` string, padding missing minor/patch parts
/// (`"3.1"` becomes `3.1.0`).
pub fn parse_server_version(raw: &str) -> Result<Version, ClientError> {
    let trimmed = raw.trim().trim_start_matches('v');
    if let Ok(version) = Version::parse(trimmed) {
        return Ok(version);
    }

    let (core, suffix) = match trimmed.find(['-', '+']) {
        Some(idx) => trimmed.split_at(idx),
        None => (trimmed, ""),
    };
    let mut parts = core.split('.').collect::<Vec<_>>();
    if parts.is_empty() || parts.len() > 3 {
        return Err(parse_error(format!("invalid server version '{}'", raw)));
    }
    while parts.len() < 3 {
        parts.push("0");
    }

    Version::parse(&format!("{}{}", parts.join("."), suffix))
        .map_err(|err| parse_error(format!("invalid server version '{}': {}", raw, err)))
}

/// Whether `version` satisfies a requirement such as `">= 3.0.0"`.
pub fn supports(version: &Version, requirement: &str) -> Result<bool, ClientError> {
    let requirement = VersionReq::parse(requirement).map_err(|err| {
        invalid_request(format!(
            "invalid version requirement '{}': {}",
            requirement, err
        ))
    })?;
    Ok(requirement.matches(version))
}
