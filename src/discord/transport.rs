use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::error::ApiError;

/// One outbound call: the endpoint path (relative to the API base) and the
/// value of the `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub endpoint: String,
    pub authorization: String,
}

impl ApiRequest {
    pub fn bearer(endpoint: impl Into<String>, access_token: &str) -> Self {
        Self {
            endpoint: endpoint.into(),
            authorization: format!("Bearer {}", access_token),
        }
    }
}

impl std::fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRequest")
            .field("endpoint", &self.endpoint)
            .field("authorization", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// The raw HTTP hop to Discord. Retries and pacing live above this.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn get(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
        }
    }
}

#[async_trait]
impl ApiTransport for ReqwestTransport {
    async fn get(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.url_for(&request.endpoint);
        debug!("Discord API: GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, &request.authorization)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        if !(200..300).contains(&status) {
            return Err(ApiError::Status { status, body });
        }

        Ok(ApiResponse { status, body })
    }
}
