use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// GraphQL error `type` the server uses for a per-item miss.
pub const NOT_FOUND_ERROR_TYPE: &str = "NOT_FOUND";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientErrorKind {
    Parse,
    Transport,
    Decode,
    Cancelled,
    BudgetExceeded,
    InvalidRequest,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientError {
    pub kind: ClientErrorKind,
    pub message: String,
    pub endpoint: Option<String>,
    pub http_status: Option<u16>,
}

impl ClientError {
    pub fn new(kind: ClientErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            endpoint: None,
            http_status: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    /// Whether a caller-side retry policy may reasonably try again.
    pub fn retryable(&self) -> bool {
        match self.kind {
            ClientErrorKind::Transport => match self.http_status {
                Some(status) => status == 408 || status == 429 || status >= 500,
                None => true,
            },
            _ => false,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.endpoint, self.http_status) {
            (Some(endpoint), Some(status)) => {
                write!(
                    f,
                    "{} (endpoint={}, status={})",
                    self.message, endpoint, status
                )
            }
            (Some(endpoint), None) => write!(f, "{} (endpoint={})", self.message, endpoint),
            (None, Some(status)) => write!(f, "{} (status={})", self.message, status),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ClientError {}

pub fn parse_error(message: impl Into<String>) -> ClientError {
    ClientError::new(ClientErrorKind::Parse, message)
}

pub fn transport_error(message: impl Into<String>) -> ClientError {
    ClientError::new(ClientErrorKind::Transport, message)
}

pub fn decode_error(message: impl Into<String>) -> ClientError {
    ClientError::new(ClientErrorKind::Decode, message)
}

pub fn cancelled(message: impl Into<String>) -> ClientError {
    ClientError::new(ClientErrorKind::Cancelled, message)
}

pub fn invalid_request(message: impl Into<String>) -> ClientError {
    ClientError::new(ClientErrorKind::InvalidRequest, message)
}

pub fn internal_error(message: impl Into<String>) -> ClientError {
    ClientError::new(ClientErrorKind::Internal, message)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLocation {
    pub line: u32,
    pub column: u32,
}

/// One entry of the `errors` array of a GraphQL response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub path: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub locations: Vec<ErrorLocation>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl GraphQLError {
    pub fn is_not_found(&self) -> bool {
        self.kind.as_deref() == Some(NOT_FOUND_ERROR_TYPE)
    }
}

/// Server-reported errors of one exchange, in response order.
///
/// Never empty when produced by the dispatcher. It travels next to any data the
/// server returned, so callers decide which entries they can live with.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("error in GraphQL response: {}", first_message(.errors))]
pub struct OperationError {
    pub errors: Vec<GraphQLError>,
}

impl OperationError {
    pub fn from_errors(errors: Vec<GraphQLError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    pub fn first_message(&self) -> &str {
        first_message(&self.errors)
    }

    pub fn not_found(&self) -> impl Iterator<Item = &GraphQLError> {
        self.errors.iter().filter(|error| error.is_not_found())
    }

    pub fn is_all_not_found(&self) -> bool {
        self.errors.iter().all(GraphQLError::is_not_found)
    }
}

fn first_message(errors: &[GraphQLError]) -> &str {
    errors
        .first()
        .map(|error| error.message.as_str())
        .unwrap_or("")
}
