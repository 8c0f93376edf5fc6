use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, value::RawValue};

use crate::graphql_client::{
    error::{GraphQLError, OperationError},
    types::RequestId,
};

#[derive(Debug, Serialize)]
pub(crate) struct RequestBody<'a> {
    pub query: &'a str,
    pub variables: &'a Map<String, Value>,
}

/// Wire shape of a GraphQL response; `data` is kept raw until the caller's
/// shape is known.
#[derive(Debug, Deserialize)]
pub(crate) struct ResponseEnvelope {
    #[serde(default)]
    pub data: Option<Box<RawValue>>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQLError>>,
}

impl ResponseEnvelope {
    pub fn carries_payload(&self) -> bool {
        self.data.is_some() || self.errors.as_ref().is_some_and(|errors| !errors.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MetaResponse {
    #[serde(default)]
    pub installed_version: String,
}

/// Outcome of one exchange. `data` and `errors` are independent: a response
/// can carry both, either, or neither.
#[derive(Debug, Clone)]
pub struct GraphQLResponse<T> {
    pub request_id: RequestId,
    pub cost: u64,
    pub data: Option<T>,
    pub errors: Option<OperationError>,
}

impl<T> GraphQLResponse<T> {
    pub fn is_partial(&self) -> bool {
        self.data.is_some() && self.errors.is_some()
    }

    /// Data only when the server reported no errors at all.
    pub fn into_data(self) -> Result<Option<T>, OperationError> {
        match self.errors {
            Some(errors) => Err(errors),
            None => Ok(self.data),
        }
    }

    /// Batch-lookup policy: per-item `NOT_FOUND` misses are logged and dropped,
    /// any other server error fails the whole response.
    pub fn into_data_tolerating_not_found(self) -> Result<Option<T>, OperationError> {
        let Some(errors) = self.errors else {
            return Ok(self.data);
        };
        if !errors.is_all_not_found() {
            return Err(errors);
        }

        for missing in errors.not_found() {
            tracing::warn!(
                target: "graphql_client",
                request_id = %self.request_id,
                message = %missing.message,
                path = ?missing.path,
                "graphql_resource_not_found"
            );
        }
        Ok(self.data)
    }
}
