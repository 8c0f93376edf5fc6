use std::env;

use sha2::{Digest, Sha256};

use crate::graphql_client::error::{ClientError, invalid_request};

#[derive(Debug, Clone, Default)]
pub struct ResolvedCredential {
    pub auth_header: Option<String>,
}

impl ResolvedCredential {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Supplies request credentials and the identity that partitions shared rate
/// resources. Two authenticators with the same hash share one budget.
pub trait Authenticator: Send + Sync {
    fn resolve(&self) -> Result<ResolvedCredential, ClientError>;

    fn identity_hash(&self) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AnonymousAuthenticator;

impl Authenticator for AnonymousAuthenticator {
    fn resolve(&self) -> Result<ResolvedCredential, ClientError> {
        Ok(ResolvedCredential::none())
    }

    fn identity_hash(&self) -> String {
        String::new()
    }
}

#[derive(Clone)]
pub struct StaticTokenAuthenticator {
    token: String,
}

impl StaticTokenAuthenticator {
    pub fn new(token: impl Into<String>) -> Result<Self, ClientError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(invalid_request("API token cannot be empty"));
        }
        Ok(Self { token })
    }

    pub fn from_env(var: &str) -> Result<Self, ClientError> {
        let token = env::var(var).map_err(|_| {
            invalid_request(format!("missing API token environment variable {}", var))
        })?;
        Self::new(token)
    }
}

impl std::fmt::Debug for StaticTokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenAuthenticator")
            .field("identity_hash", &self.identity_hash())
            .finish()
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn resolve(&self) -> Result<ResolvedCredential, ClientError> {
        Ok(ResolvedCredential {
            auth_header: Some(format!("Bearer {}", self.token)),
        })
    }

    fn identity_hash(&self) -> String {
        Sha256::digest(self.token.as_bytes())
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect()
    }
}
