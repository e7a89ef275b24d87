use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use shared::protocol::{GraphQlRequest, GraphQlResponse};
use tracing::{debug, warn};
use url::Url;

/// Executes one GraphQL document. Transport failures are errors; GraphQL
/// errors travel inside the response.
#[async_trait]
pub trait GraphQlTransport: Send + Sync {
    async fn execute(&self, request: GraphQlRequest) -> Result<GraphQlResponse>;
}

pub struct MissingTransport;

#[async_trait]
impl GraphQlTransport for MissingTransport {
    async fn execute(&self, request: GraphQlRequest) -> Result<GraphQlResponse> {
        Err(anyhow!(
            "graphql transport is unavailable for operation {}",
            request.operation_name.as_deref().unwrap_or("<anonymous>")
        ))
    }
}

/// GraphQL over HTTP: JSON `POST` to a single endpoint.
pub struct HttpTransport {
    http: Client,
    endpoint: Url,
    bearer_token: Option<String>,
}

impl HttpTransport {
    pub fn new(endpoint: Url) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    pub fn with_timeout(endpoint: Url, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build graphql http client")?;
        Ok(Self::with_client(http, endpoint))
    }

    pub fn with_client(http: Client, endpoint: Url) -> Self {
        Self {
            http,
            endpoint,
            bearer_token: None,
        }
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl GraphQlTransport for HttpTransport {
    async fn execute(&self, request: GraphQlRequest) -> Result<GraphQlResponse> {
        let operation = request.operation_name.clone().unwrap_or_default();
        let mut builder = self
            .http
            .post(self.endpoint.clone())
            .header(header::ACCEPT, "application/json")
            .json(&request);
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("failed to reach graphql endpoint {}", self.endpoint))?;
        let status = response.status();
        debug!(operation = %operation, status = status.as_u16(), "transport: response received");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Servers commonly answer validation failures with 4xx and a regular error body.
            if let Ok(parsed) = serde_json::from_str::<GraphQlResponse>(&body) {
                if parsed.has_errors() {
                    return Ok(parsed);
                }
            }
            warn!(operation = %operation, status = status.as_u16(), "transport: request rejected");
            return Err(anyhow!("graphql endpoint returned {status}"));
        }

        response
            .json::<GraphQlResponse>()
            .await
            .context("invalid graphql response body")
    }
}
