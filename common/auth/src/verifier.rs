use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Validation};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{IssuerIdentity, TrustDomainConfig};
use crate::error::{AuthError, AuthResult};
use crate::jwks::JwksFetcher;
use crate::keys::KeySet;
use crate::metrics::AuthMetrics;
use crate::resolver::{KeyResolver, ResolverState};
use crate::token::DecodedToken;

/// Verifies bearer tokens for one trust domain.
///
/// Cheap to share behind an `Arc`; `validate` takes `&self` and keeps no
/// per-call state.
pub struct TokenValidator {
    config: TrustDomainConfig,
    resolver: Arc<KeyResolver>,
    metrics: Option<AuthMetrics>,
}

impl TokenValidator {
    /// Start key discovery for `config` and return without waiting for it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: TrustDomainConfig) -> AuthResult<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: TrustDomainConfig) -> TokenValidatorBuilder {
        TokenValidatorBuilder::new(config)
    }

    /// Validator over keys that are already known. Ready immediately.
    pub fn with_key_set(config: TrustDomainConfig, keys: KeySet) -> Self {
        let resolver = KeyResolver::from_key_set(config.issuer().clone(), keys);
        Self {
            config,
            resolver: Arc::new(resolver),
            metrics: None,
        }
    }

    pub fn config(&self) -> &TrustDomainConfig {
        &self.config
    }

    pub fn issuer(&self) -> &IssuerIdentity {
        self.config.issuer()
    }

    pub fn resolver(&self) -> &Arc<KeyResolver> {
        &self.resolver
    }

    pub fn metrics(&self) -> Option<&AuthMetrics> {
        self.metrics.as_ref()
    }

    pub fn state(&self) -> ResolverState {
        self.resolver.state()
    }

    /// Wait for key discovery and return how many keys were loaded.
    pub async fn ready(&self) -> AuthResult<usize> {
        Ok(self.resolver.key_set().await?.len())
    }

    /// Verify `token` and return its claims unchanged.
    pub async fn validate(&self, token: &str) -> AuthResult<Value> {
        let outcome = self.validate_inner(token).await;
        match &outcome {
            Ok(_) => self.record("ok"),
            Err(err) => {
                warn!(kind = err.kind(), error = %err, "token rejected");
                self.record(err.kind());
            }
        }
        outcome
    }

    async fn validate_inner(&self, token: &str) -> AuthResult<Value> {
        let keys = self.resolver.key_set().await?;
        let decoded = DecodedToken::decode(token)?;

        let expected_issuer = self.issuer().as_str();
        match decoded.issuer() {
            Some(issuer) if issuer == expected_issuer => {}
            other => {
                return Err(AuthError::IssuerMismatch {
                    expected: expected_issuer.to_string(),
                    actual: other.unwrap_or_default().to_string(),
                })
            }
        }

        let expected_use = self.config.token_use().as_str();
        match decoded.token_use() {
            Some(token_use) if token_use == expected_use => {}
            other => {
                return Err(AuthError::WrongTokenUse {
                    expected: expected_use.to_string(),
                    actual: other.unwrap_or_default().to_string(),
                })
            }
        }

        // A header without `kid` selects no key, even one published under "".
        let kid = decoded.header.kid.as_deref();
        let key = kid
            .and_then(|kid| keys.lookup(kid))
            .ok_or_else(|| AuthError::UnknownKey(kid.unwrap_or_default().to_string()))?;
        let algorithm = key.algorithm_for(&decoded.header.alg)?;

        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[expected_issuer]);
        validation.set_required_spec_claims(&["iss"]);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        decode::<Value>(token, key.decoding_key(), &validation).map_err(|err| {
            match err.kind() {
                ErrorKind::InvalidIssuer => AuthError::IssuerMismatch {
                    expected: expected_issuer.to_string(),
                    actual: decoded.issuer().unwrap_or_default().to_string(),
                },
                _ => AuthError::from(err),
            }
        })?;

        check_freshness(
            decoded.expiration(),
            decoded.issued_at(),
            Utc::now().timestamp(),
            self.config.max_age_seconds(),
        )?;

        debug!(kid = key.kid(), sub = ?decoded.subject(), "verified token");
        Ok(decoded.into_claims())
    }

    fn record(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.validation(outcome);
        }
    }
}

/// `exp` must lie strictly in the future and within `max_age` of now; a present
/// `iat` must be no more than `max_age` seconds old.
fn check_freshness(
    expiration: Option<i64>,
    issued_at: Option<i64>,
    now: i64,
    max_age_seconds: u64,
) -> AuthResult<()> {
    let max_age = i64::try_from(max_age_seconds).unwrap_or(i64::MAX);
    let exp = expiration
        .ok_or_else(|| AuthError::TokenExpired("token carries no exp claim".into()))?;

    if exp <= now {
        return Err(AuthError::TokenExpired(format!("exp {exp} is not after {now}")));
    }
    if exp < now.saturating_sub(max_age) {
        return Err(AuthError::TokenExpired(format!(
            "exp {exp} is older than the {max_age}s max age"
        )));
    }
    // `iat` is optional in user pool tokens; without it `exp` alone bounds the age.
    if let Some(iat) = issued_at {
        if now.saturating_sub(iat) > max_age {
            return Err(AuthError::TokenExpired(format!(
                "issued at {iat}, more than {max_age}s ago"
            )));
        }
    }
    Ok(())
}

pub struct TokenValidatorBuilder {
    config: TrustDomainConfig,
    client: Option<Client>,
    metrics: Option<AuthMetrics>,
}

impl TokenValidatorBuilder {
    fn new(config: TrustDomainConfig) -> Self {
        Self {
            config,
            client: None,
            metrics: None,
        }
    }

    /// HTTP client used for discovery, e.g. one with a request timeout.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_metrics(mut self, metrics: AuthMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Spawn key discovery and return the validator without waiting for it.
    pub fn build(self) -> AuthResult<TokenValidator> {
        let issuer = self.config.issuer().clone();
        let url = issuer.jwks_url();
        let fetcher = match self.client {
            Some(client) => JwksFetcher::with_client(client, url),
            None => JwksFetcher::new(url),
        };
        let resolver = KeyResolver::initialize(issuer, fetcher, self.metrics.clone())?;

        Ok(TokenValidator {
            config: self.config,
            resolver: Arc::new(resolver),
            metrics: self.metrics,
        })
    }
}
