use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::IssuerIdentity;
use crate::error::{AuthError, AuthResult};
use crate::jwks::JwksFetcher;
use crate::keys::{KeyMaterial, KeySet};
use crate::metrics::AuthMetrics;

/// Initialization progress of a [`KeyResolver`].
#[derive(Debug, Clone)]
pub enum ResolverState {
    Initializing,
    Ready(Arc<KeySet>),
    Failed(String),
}

impl ResolverState {
    fn is_settled(&self) -> bool {
        !matches!(self, ResolverState::Initializing)
    }
}

/// Owns an issuer's [`KeySet`] and the gate that holds validations until it loads.
///
/// Discovery runs once, on a task spawned at construction. Every caller
/// waiting on [`KeyResolver::key_set`] observes that single outcome.
pub struct KeyResolver {
    issuer: IssuerIdentity,
    state: watch::Receiver<ResolverState>,
}

impl KeyResolver {
    /// Start discovery for `issuer` on the current Tokio runtime.
    pub fn initialize(
        issuer: IssuerIdentity,
        fetcher: JwksFetcher,
        metrics: Option<AuthMetrics>,
    ) -> AuthResult<Self> {
        let handle = Handle::try_current().map_err(|_| AuthError::RuntimeUnavailable)?;
        let (tx, rx) = watch::channel(ResolverState::Initializing);

        info!(%issuer, jwks_url = %fetcher.url(), "starting key discovery");
        let task_issuer = issuer.clone();
        handle.spawn(async move {
            let state = match fetcher.fetch().await {
                Ok(keys) => {
                    if keys.is_empty() {
                        warn!(issuer = %task_issuer, "issuer published no signing keys");
                    }
                    record(&metrics, "ok");
                    ResolverState::Ready(Arc::new(keys))
                }
                Err(err) => {
                    warn!(issuer = %task_issuer, error = %err, "key discovery failed");
                    record(&metrics, "error");
                    ResolverState::Failed(err.to_string())
                }
            };
            // Receivers keep the last value even once every handle is gone.
            let _ = tx.send(state);
        });

        Ok(Self { issuer, state: rx })
    }

    /// Resolver over a key set that is already loaded.
    pub fn from_key_set(issuer: IssuerIdentity, keys: KeySet) -> Self {
        let (_tx, rx) = watch::channel(ResolverState::Ready(Arc::new(keys)));
        Self { issuer, state: rx }
    }

    pub fn issuer(&self) -> &IssuerIdentity {
        &self.issuer
    }

    /// Current state, without waiting.
    pub fn state(&self) -> ResolverState {
        self.state.borrow().clone()
    }

    /// Wait for initialization to settle and return the loaded keys.
    pub async fn key_set(&self) -> AuthResult<Arc<KeySet>> {
        let mut rx = self.state.clone();
        let state = rx
            .wait_for(ResolverState::is_settled)
            .await
            .map_err(|_| {
                AuthError::KeysUnavailable("key discovery ended without reporting".into())
            })?
            .clone();

        match state {
            ResolverState::Ready(keys) => Ok(keys),
            ResolverState::Failed(reason) => Err(AuthError::KeysUnavailable(reason)),
            ResolverState::Initializing => Err(AuthError::KeysUnavailable(
                "key discovery still in progress".into(),
            )),
        }
    }

    /// Look up one key once initialization has settled. `Ok(None)` means the kid is not published.
    pub async fn lookup(&self, kid: &str) -> AuthResult<Option<KeyMaterial>> {
        let keys = self.key_set().await?;
        Ok(keys.lookup(kid).cloned())
    }
}

fn record(metrics: &Option<AuthMetrics>, outcome: &str) {
    if let Some(metrics) = metrics {
        metrics.jwks_fetch(outcome);
    }
}
