use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, OnceLock, PoisonError},
};

use async_trait::async_trait;
use opentelemetry::{KeyValue, global, metrics::Counter};
use reqwest::Url;

use crate::graphql_client::{
    error::ClientError,
    transport::{Transport, TransportRequest, TransportResponse},
};

const METER_NAME: &str = "graphql_client";
const REQUESTS_COUNTER: &str = "graphql_client.requests";

/// API category of a request: the first segment of its URL path, so
/// `/graphql` is `graphql` and `/api/graphql` is `api`.
pub fn request_category(url: &Url) -> String {
    url.path()
        .trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Counts outgoing requests per API category.
///
/// Every count goes to the OpenTelemetry meter and to an in-process tally
/// that can be read back with [`RequestCounter::counts`].
pub struct RequestCounter {
    counter: Counter<u64>,
    tally: Mutex<BTreeMap<String, u64>>,
}

impl RequestCounter {
    pub fn new() -> Self {
        let counter = global::meter(METER_NAME)
            .u64_counter(REQUESTS_COUNTER)
            .with_description("Requests sent to the remote API, by category")
            .build();
        Self {
            counter,
            tally: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn record(&self, url: &Url) {
        let category = request_category(url);
        self.counter
            .add(1, &[KeyValue::new("category", category.clone())]);
        *self
            .tally
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(category)
            .or_default() += 1;
    }

    pub fn counts(&self) -> BTreeMap<String, u64> {
        self.tally
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for RequestCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide counter used by dispatchers built from config.
pub fn request_counter() -> Arc<RequestCounter> {
    static COUNTER: OnceLock<Arc<RequestCounter>> = OnceLock::new();
    COUNTER
        .get_or_init(|| Arc::new(RequestCounter::new()))
        .clone()
}

/// Counts each request before handing it to the wrapped transport.
pub struct CountingTransport {
    inner: Arc<dyn Transport>,
    counter: Arc<RequestCounter>,
}

impl CountingTransport {
    pub fn new(inner: Arc<dyn Transport>, counter: Arc<RequestCounter>) -> Self {
        Self { inner, counter }
    }
}

#[async_trait]
impl Transport for CountingTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, ClientError> {
        self.counter.record(&request.url);
        self.inner.execute(request).await
    }
}
