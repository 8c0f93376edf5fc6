use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Url, header::HeaderMap};

use crate::graphql_client::error::{ClientError, transport_error};

#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Set when the headers arrived but the body could not be read; `body` is
    /// empty then.
    pub body_error: Option<ClientError>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Short, lossy excerpt of the body for error messages.
    pub fn body_excerpt(&self) -> String {
        String::from_utf8_lossy(&self.body)
            .chars()
            .take(240)
            .collect()
    }
}

/// Executes one HTTP exchange. Any response that arrives, whatever its status,
/// is `Ok`; `Err` means no response was received.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, ClientError>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self {
            client: Client::builder()
                .pool_idle_timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client must build"),
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, ClientError> {
        let url = request.url.to_string();
        let mut builder = self
            .client
            .request(request.method, request.url)
            .timeout(request.timeout)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|err| {
            transport_error(format!("request to {} failed: {}", url, err)).with_endpoint(url.clone())
        })?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let (body, body_error) = match response.bytes().await {
            Ok(body) => (body.to_vec(), None),
            Err(err) => (
                Vec::new(),
                Some(
                    transport_error(format!(
                        "reading response body from {} failed: {}",
                        url, err
                    ))
                    .with_endpoint(url.clone())
                    .with_http_status(status),
                ),
            ),
        };

        Ok(TransportResponse {
            status,
            headers,
            body,
            body_error,
        })
    }
}
