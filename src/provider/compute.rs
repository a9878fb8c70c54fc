//! Compute Engine `sslCertificates` REST client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{ProviderError, SslCertificate, SslCertificateApi, TokenSource};

/// Public Compute Engine API endpoint
pub const DEFAULT_COMPUTE_ENDPOINT: &str = "https://compute.googleapis.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Google API error envelope
#[derive(Deserialize, Default)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ApiError,
}

#[derive(Deserialize, Default)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorItem>,
}

#[derive(Deserialize)]
struct ApiErrorItem {
    #[serde(default)]
    reason: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SslCertificateList {
    #[serde(default)]
    items: Vec<SslCertificate>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Map a failed response onto the provider error taxonomy
fn classify(status: StatusCode, body: &str) -> ProviderError {
    let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let message = if envelope.error.message.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", envelope.error.message)
    };

    if status == StatusCode::NOT_FOUND {
        return ProviderError::NotFound(message);
    }

    if envelope
        .error
        .errors
        .iter()
        .any(|e| e.reason == "quotaExceeded")
    {
        return ProviderError::QuotaExceeded(message);
    }

    ProviderError::Backend(message)
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    ProviderError::Backend(e.to_string())
}

/// Client for the global `sslCertificates` collection of one project
pub struct ComputeClient {
    http: Client,
    base_url: String,
    token: TokenSource,
}

impl ComputeClient {
    pub fn new(endpoint: &str, project: &str, token: TokenSource) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(transport_error)?;

        Ok(Self {
            http,
            base_url: format!(
                "{}/compute/v1/projects/{}/global/sslCertificates",
                endpoint.trim_end_matches('/'),
                project
            ),
            token,
        })
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ProviderError> {
        match self.token.token(&self.http).await? {
            Some(token) => Ok(request.bearer_auth(token)),
            None => Ok(request),
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ProviderError> {
        let response = self
            .authorized(request)
            .await?
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(classify(status, &body))
    }
}

#[async_trait]
impl SslCertificateApi for ComputeClient {
    #[instrument(skip(self, domains))]
    async fn create(&self, name: &str, domains: &[String]) -> Result<(), ProviderError> {
        let body = SslCertificate::managed(name, domains);
        self.send(self.http.post(&self.base_url).json(&body)).await?;
        debug!("Insert of SslCertificate {} accepted", name);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, name: &str) -> Result<(), ProviderError> {
        let url = format!("{}/{}", self.base_url, name);
        self.send(self.http.delete(url)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, name: &str) -> Result<SslCertificate, ProviderError> {
        let url = format!("{}/{}", self.base_url, name);
        let response = self.send(self.http.get(url)).await?;
        response.json().await.map_err(transport_error)
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<SslCertificate>, ProviderError> {
        let mut certificates = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http.get(&self.base_url);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page: SslCertificateList = self
                .send(request)
                .await?
                .json()
                .await
                .map_err(transport_error)?;
            certificates.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!("Listed {} SslCertificates", certificates.len());
        Ok(certificates)
    }
}
