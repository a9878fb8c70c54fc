//! OAuth2 access tokens for the Compute Engine API

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::ProviderError;

/// Default GCE metadata server token endpoint
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh tokens this long before they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Where bearer tokens come from
#[derive(Debug)]
pub enum TokenSource {
    /// No authentication (local emulators, tests)
    Anonymous,
    /// A fixed token supplied on the command line
    Static(String),
    /// Tokens fetched from the metadata server and cached until expiry
    Metadata {
        url: String,
        cached: Mutex<Option<(String, Instant)>>,
    },
}

impl TokenSource {
    pub fn metadata(url: impl Into<String>) -> Self {
        TokenSource::Metadata {
            url: url.into(),
            cached: Mutex::new(None),
        }
    }

    /// Current bearer token, if any
    pub async fn token(&self, http: &Client) -> Result<Option<String>, ProviderError> {
        match self {
            TokenSource::Anonymous => Ok(None),
            TokenSource::Static(token) => Ok(Some(token.clone())),
            TokenSource::Metadata { url, cached } => {
                let mut cached = cached.lock().await;
                if let Some((token, expires_at)) = cached.as_ref() {
                    if Instant::now() + EXPIRY_MARGIN < *expires_at {
                        return Ok(Some(token.clone()));
                    }
                }

                debug!("Fetching access token from metadata server");
                let response = http
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|e| ProviderError::Backend(format!("metadata server: {e}")))?;

                if !response.status().is_success() {
                    return Err(ProviderError::Backend(format!(
                        "metadata server returned {}",
                        response.status()
                    )));
                }

                let body: TokenResponse = response
                    .json()
                    .await
                    .map_err(|e| ProviderError::Backend(format!("metadata token: {e}")))?;

                let expires_at = Instant::now() + Duration::from_secs(body.expires_in);
                *cached = Some((body.access_token.clone(), expires_at));
                Ok(Some(body.access_token))
            }
        }
    }
}
