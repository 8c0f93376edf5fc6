use std::{sync::Arc, time::Duration};

use reqwest::{
    Method,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue},
};
use semver::Version;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::time::sleep;
use tracing::Instrument;
use uuid::Uuid;

use crate::graphql_client::{
    budget::RateBudget,
    context::RequestContext,
    cost::estimate_cost,
    credentials::{AnonymousAuthenticator, Authenticator, StaticTokenAuthenticator},
    decode::decode,
    endpoint::ApiEndpoint,
    error::{ClientError, OperationError, internal_error, invalid_request, transport_error},
    metrics::{CountingTransport, request_counter},
    monitor::RateLimitMonitor,
    registry::{RateLimitKey, RateLimitRegistry},
    response::{GraphQLResponse, MetaResponse, RequestBody, ResponseEnvelope},
    transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse},
    types::ClientConfig,
    version::{VersionCache, parse_server_version},
};

/// Opt-in preview dataset required for some fields (checks API).
pub const PREVIEW_ACCEPT: &str = "application/vnd.github.antiope-preview+json";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends GraphQL operations for one endpoint and credential.
///
/// Cloning is cheap; clones share the transport, the rate resources and the
/// version cache.
#[derive(Clone)]
pub struct GraphQLDispatcher {
    endpoint: ApiEndpoint,
    authenticator: Arc<dyn Authenticator>,
    transport: Arc<dyn Transport>,
    registry: Arc<RateLimitRegistry>,
    budget: Arc<RateBudget>,
    monitor: Arc<RateLimitMonitor>,
    versions: Arc<VersionCache>,
    request_timeout: Duration,
}

impl GraphQLDispatcher {
    pub fn new(
        endpoint: ApiEndpoint,
        authenticator: Arc<dyn Authenticator>,
        transport: Arc<dyn Transport>,
        registry: Arc<RateLimitRegistry>,
        versions: Arc<VersionCache>,
    ) -> Self {
        let key = RateLimitKey::new(endpoint.cache_key(), authenticator.identity_hash());
        Self {
            budget: registry.budget(&key),
            monitor: registry.monitor(&key),
            endpoint,
            authenticator,
            transport,
            registry,
            versions,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Builds a dispatcher with the default reqwest transport, counted by the
    /// process-wide request counter.
    pub fn from_config(
        config: &ClientConfig,
        registry: Arc<RateLimitRegistry>,
        versions: Arc<VersionCache>,
    ) -> Result<Self, ClientError> {
        let endpoint = ApiEndpoint::parse(&config.endpoint, &config.public_hosts)?;
        let authenticator: Arc<dyn Authenticator> = match &config.token_env {
            Some(var) => Arc::new(StaticTokenAuthenticator::from_env(var)?),
            None => Arc::new(AnonymousAuthenticator),
        };

        Ok(Self::new(
            endpoint,
            authenticator,
            Arc::new(CountingTransport::new(
                Arc::new(ReqwestTransport::default()),
                request_counter(),
            )),
            registry,
            versions,
        )
        .with_request_timeout(config.request_timeout()))
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    /// Same endpoint, transport and version cache, authenticated as someone
    /// else. Rate resources follow the new identity.
    pub fn with_authenticator(&self, authenticator: Arc<dyn Authenticator>) -> Self {
        Self::new(
            self.endpoint.clone(),
            authenticator,
            self.transport.clone(),
            self.registry.clone(),
            self.versions.clone(),
        )
        .with_request_timeout(self.request_timeout)
    }

    pub fn endpoint(&self) -> &ApiEndpoint {
        &self.endpoint
    }

    pub fn rate_limit_monitor(&self) -> &Arc<RateLimitMonitor> {
        &self.monitor
    }

    pub fn rate_budget(&self) -> &Arc<RateBudget> {
        &self.budget
    }

    /// Runs one operation and decodes its `data` into `T`.
    ///
    /// Server-reported errors come back in [`GraphQLResponse::errors`] next to
    /// whatever data could be decoded; `Err` is reserved for failures that
    /// produced no usable response.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        query: &str,
        variables: Map<String, Value>,
    ) -> Result<GraphQLResponse<T>, ClientError> {
        let request_id = Uuid::now_v7().to_string();
        let body = serde_json::to_vec(&RequestBody {
            query,
            variables: &variables,
        })
        .map_err(|err| internal_error(format!("failed to encode request body: {}", err)))?;

        let cost = estimate_cost(query)?;

        let request_span = tracing::info_span!(
            target: "graphql_client",
            "graphql_request",
            request_id = %request_id,
            endpoint = %self.endpoint,
            cost = cost,
            priority = ?ctx.priority()
        );

        self.dispatch(ctx, request_id, cost, body)
            .instrument(request_span)
            .await
    }

    pub async fn execute_raw(
        &self,
        ctx: &RequestContext,
        query: &str,
        variables: Map<String, Value>,
    ) -> Result<GraphQLResponse<Value>, ClientError> {
        self.execute(ctx, query, variables).await
    }

    /// Server version for this dispatcher's endpoint; never fails.
    pub async fn server_version(&self, ctx: &RequestContext) -> Version {
        self.versions
            .get_or_fetch(&self.endpoint, || self.fetch_server_version(ctx))
            .await
    }

    async fn dispatch<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        request_id: String,
        cost: u64,
        body: Vec<u8>,
    ) -> Result<GraphQLResponse<T>, ClientError> {
        self.budget.acquire(cost, ctx).await?;

        if ctx.is_background() {
            let wait = self.monitor.recommended_wait_for_background_op(cost);
            if !wait.is_zero() {
                tracing::debug!(
                    target: "graphql_client",
                    request_id = %request_id,
                    wait_ms = wait.as_millis() as u64,
                    "background_pacing"
                );
                ctx.run(sleep(wait)).await?;
            }
        }

        let mut headers = self.request_headers()?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static(PREVIEW_ACCEPT));

        let request = TransportRequest {
            method: Method::POST,
            url: self.endpoint.graphql_url(),
            headers,
            body: Some(body),
            timeout: self.request_timeout,
        };
        let response = self.send(ctx, request).await?;

        let envelope = if response.is_success() {
            decode::<ResponseEnvelope>(&response.body)?
        } else {
            match serde_json::from_slice::<ResponseEnvelope>(&response.body) {
                Ok(envelope) if envelope.carries_payload() => envelope,
                _ => {
                    return Err(transport_error(format!(
                        "graphql request returned status {}: {}",
                        response.status,
                        response.body_excerpt()
                    ))
                    .with_endpoint(self.endpoint.to_string())
                    .with_http_status(response.status));
                }
            }
        };

        let errors = OperationError::from_errors(envelope.errors.unwrap_or_default());
        let data = match envelope.data {
            None => None,
            Some(raw) => match decode::<T>(raw.get().as_bytes()) {
                Ok(data) => Some(data),
                Err(err) if errors.is_some() => {
                    tracing::warn!(
                        target: "graphql_client",
                        request_id = %request_id,
                        error = %err,
                        "partial_data_decode_failed"
                    );
                    None
                }
                Err(err) => return Err(err),
            },
        };

        tracing::debug!(
            target: "graphql_client",
            request_id = %request_id,
            status = response.status,
            has_data = data.is_some(),
            error_count = errors.as_ref().map_or(0, |errors| errors.errors.len()),
            "graphql_request_completed"
        );

        Ok(GraphQLResponse {
            request_id,
            cost,
            data,
            errors,
        })
    }

    async fn fetch_server_version(&self, ctx: &RequestContext) -> Result<Version, ClientError> {
        let mut headers = self.request_headers()?;
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let request = TransportRequest {
            method: Method::GET,
            url: self.endpoint.meta_url(),
            headers,
            body: None,
            timeout: self.request_timeout,
        };

        let response = self.send(ctx, request).await?;
        if !response.is_success() {
            return Err(transport_error(format!(
                "metadata request returned status {}: {}",
                response.status,
                response.body_excerpt()
            ))
            .with_endpoint(self.endpoint.to_string())
            .with_http_status(response.status));
        }

        let meta = decode::<MetaResponse>(&response.body)?;
        parse_server_version(&meta.installed_version)
    }

    /// One exchange through the transport; the monitor sees the headers of
    /// every response, including one whose body was lost.
    async fn send(
        &self,
        ctx: &RequestContext,
        request: TransportRequest,
    ) -> Result<TransportResponse, ClientError> {
        let mut response = ctx
            .run(self.transport.execute(request))
            .await?
            .map_err(|err| err.with_endpoint(self.endpoint.to_string()))?;
        self.monitor.update(&response.headers);
        if let Some(err) = response.body_error.take() {
            return Err(err.with_endpoint(self.endpoint.to_string()));
        }
        Ok(response)
    }

    fn request_headers(&self) -> Result<HeaderMap, ClientError> {
        let credential = self.authenticator.resolve()?;
        let mut headers = HeaderMap::new();

        if let Some(auth_header) = credential.auth_header {
            let value = HeaderValue::from_str(&auth_header)
                .map_err(|_| invalid_request("authorization header is not a valid header value"))?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }
}
