use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use crate::error::{AuthError, AuthResult};
use crate::keys::KeySet;

/// Fetches an issuer's published key set. Performs one GET per call, no retries.
#[derive(Clone)]
pub struct JwksFetcher {
    client: Client,
    url: String,
}

impl JwksFetcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> AuthResult<KeySet> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| AuthError::KeyFetchFailed(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::KeyFetchFailed(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let body: JwksDocument = response
            .json()
            .await
            .map_err(|err| AuthError::KeyFetchFailed(format!("failed to parse JWKS: {err}")))?;

        let keys = KeySet::from_document(body)?;
        info!(jwks_url = %self.url, count = keys.len(), "loaded signing keys");
        Ok(keys)
    }
}

/// JWKS response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksDocument {
    pub keys: Vec<JwkEntry>,
}

/// One published key. Unrecognised members are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct JwkEntry {
    pub kid: Option<String>,
    pub kty: Option<String>,
    pub alg: Option<String>,
    #[serde(rename = "use")]
    pub key_use: Option<String>,
    pub n: Option<String>,
    pub e: Option<String>,
}
