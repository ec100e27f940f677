use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters for key discovery and token validation outcomes.
#[derive(Clone)]
pub struct AuthMetrics {
    registry: Registry,
    validations: IntCounterVec,
    jwks_fetches: IntCounterVec,
}

impl AuthMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Register the counters on an existing registry.
    pub fn with_registry(registry: Registry) -> prometheus::Result<Self> {
        let validations = IntCounterVec::new(
            Opts::new(
                "idp_auth_token_validations_total",
                "Count of token validations grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(validations.clone()))?;

        let jwks_fetches = IntCounterVec::new(
            Opts::new(
                "idp_auth_jwks_fetches_total",
                "Count of key-discovery fetches grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(jwks_fetches.clone()))?;

        Ok(Self {
            registry,
            validations,
            jwks_fetches,
        })
    }

    pub fn validation(&self, outcome: &str) {
        self.validations.with_label_values(&[outcome]).inc();
    }

    pub fn jwks_fetch(&self, outcome: &str) {
        self.jwks_fetches.with_label_values(&[outcome]).inc();
    }

    pub fn validation_count(&self, outcome: &str) -> u64 {
        self.validations.with_label_values(&[outcome]).get()
    }

    pub fn jwks_fetch_count(&self, outcome: &str) -> u64 {
        self.jwks_fetches.with_label_values(&[outcome]).get()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition of every registered family.
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}
