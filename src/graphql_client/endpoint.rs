use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::graphql_client::error::{ClientError, invalid_request};

pub const PUBLIC_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Deployment {
    /// The continuously-updated multi-tenant service.
    Public,
    /// An installation whose REST API lives under `/api/v3`.
    SelfHosted,
}

/// Base URL of a remote API plus the deployment it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoint {
    base: Url,
    deployment: Deployment,
}

impl ApiEndpoint {
    pub fn parse(raw: &str, public_hosts: &[String]) -> Result<Self, ClientError> {
        let base = Url::parse(raw.trim())
            .map_err(|err| invalid_request(format!("invalid API URL '{}': {}", raw, err)))?;

        let is_public = base.host_str().is_some_and(|host| {
            public_hosts
                .iter()
                .any(|public| public.eq_ignore_ascii_case(host))
        });
        if is_public {
            return Ok(Self::public());
        }

        Ok(Self {
            base,
            deployment: Deployment::SelfHosted,
        })
    }

    pub fn public() -> Self {
        Self {
            base: Url::parse(PUBLIC_API_URL).expect("public API URL must parse"),
            deployment: Deployment::Public,
        }
    }

    pub fn deployment(&self) -> Deployment {
        self.deployment
    }

    pub fn is_public(&self) -> bool {
        self.deployment == Deployment::Public
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Public: `<base>/graphql`. Self-hosted: sibling of the REST base,
    /// so `/api/v3` becomes `/api/graphql`.
    pub fn graphql_url(&self) -> Url {
        match self.deployment {
            Deployment::Public => join_path(&self.base, "graphql"),
            Deployment::SelfHosted => join_path(&self.base, "../graphql"),
        }
    }

    pub fn meta_url(&self) -> Url {
        join_path(&self.base, "meta")
    }

    /// Identity used by caches and rate-resource registries. Scheme and host
    /// are already lowercase after parsing; the path keeps its case.
    pub fn cache_key(&self) -> String {
        self.base.as_str().trim_end_matches('/').to_string()
    }
}

impl fmt::Display for ApiEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base.as_str().trim_end_matches('/'))
    }
}

/// Joins path segments the way a filesystem path join would, resolving `..`.
fn join_path(base: &Url, relative: &str) -> Url {
    let mut segments = base
        .path()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();

    for segment in relative.split('/').filter(|segment| !segment.is_empty()) {
        match segment {
            "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other.to_string()),
        }
    }

    let mut url = base.clone();
    url.set_path(&format!("/{}", segments.join("/")));
    url.set_query(None);
    url
}
