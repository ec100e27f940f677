use std::env;
use std::fmt;
use std::str::FromStr;

use reqwest::Url;
use serde::Deserialize;

use crate::error::{AuthError, AuthResult};

/// Default accepted token age when none is configured.
pub const DEFAULT_MAX_AGE_SECONDS: u64 = 3600;

pub const ENV_REGION: &str = "IDP_REGION";
pub const ENV_POOL_ID: &str = "IDP_POOL_ID";
pub const ENV_TOKEN_USE: &str = "IDP_TOKEN_USE";
pub const ENV_MAX_AGE: &str = "IDP_TOKEN_MAX_AGE_SECONDS";
pub const ENV_ENDPOINT: &str = "IDP_ENDPOINT";

/// Value of the `token_use` claim a trust domain accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenUse {
    Access,
    Id,
}

impl TokenUse {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenUse::Access => "access",
            TokenUse::Id => "id",
        }
    }
}

impl fmt::Display for TokenUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenUse {
    type Err = AuthError;

    fn from_str(value: &str) -> AuthResult<Self> {
        match value {
            "access" => Ok(TokenUse::Access),
            "id" => Ok(TokenUse::Id),
            other => Err(AuthError::ConfigInvalid(format!(
                "token use '{other}' is not supported. Possible values 'access' | 'id'"
            ))),
        }
    }
}

/// Issuer URL of a user pool. Doubles as the required `iss` claim value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerIdentity(String);

impl IssuerIdentity {
    fn derive(region: &str, pool_id: &str, endpoint: Option<&str>) -> Self {
        match endpoint {
            Some(base) => Self(format!("{base}/{pool_id}")),
            None => Self(format!(
                "https://cognito-idp.{region}.amazonaws.com/{pool_id}"
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Location of the published key set.
    pub fn jwks_url(&self) -> String {
        format!("{}/.well-known/jwks.json", self.0)
    }
}

impl fmt::Display for IssuerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated, immutable settings for one trust domain (issuer + pool).
#[derive(Debug, Clone)]
pub struct TrustDomainConfig {
    region: String,
    pool_id: String,
    token_use: TokenUse,
    max_age_seconds: u64,
    endpoint: Option<String>,
    issuer: IssuerIdentity,
}

impl TrustDomainConfig {
    /// Validate the required fields and derive the issuer identity.
    pub fn new(
        region: impl Into<String>,
        pool_id: impl Into<String>,
        token_use: &str,
    ) -> AuthResult<Self> {
        TrustDomainSettings {
            region: Some(region.into()),
            pool_id: Some(pool_id.into()),
            token_use: Some(token_use.to_string()),
            max_age_seconds: None,
            endpoint: None,
        }
        .try_into()
    }

    /// Override the accepted token age. Zero is rejected.
    pub fn with_max_age(mut self, seconds: u64) -> AuthResult<Self> {
        self.max_age_seconds = validate_max_age(seconds)?;
        Ok(self)
    }

    /// Point discovery at a different host, e.g. a local emulator.
    pub fn with_endpoint(mut self, endpoint: &str) -> AuthResult<Self> {
        let endpoint = validate_endpoint(endpoint)?;
        self.issuer = IssuerIdentity::derive(&self.region, &self.pool_id, Some(&endpoint));
        self.endpoint = Some(endpoint);
        Ok(self)
    }

    /// Load from `IDP_*` environment variables.
    pub fn from_env() -> AuthResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load using an arbitrary key lookup, with the same keys as [`Self::from_env`].
    pub fn from_lookup<F>(lookup: F) -> AuthResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_age_seconds = lookup(ENV_MAX_AGE)
            .and_then(|value| normalize_optional(&value))
            .map(|value| {
                value.parse::<u64>().map_err(|err| {
                    AuthError::ConfigInvalid(format!("{ENV_MAX_AGE} '{value}' is invalid: {err}"))
                })
            })
            .transpose()?;

        TrustDomainSettings {
            region: lookup(ENV_REGION),
            pool_id: lookup(ENV_POOL_ID),
            token_use: lookup(ENV_TOKEN_USE),
            max_age_seconds,
            endpoint: lookup(ENV_ENDPOINT).and_then(|value| normalize_optional(&value)),
        }
        .try_into()
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn pool_id(&self) -> &str {
        &self.pool_id
    }

    pub fn token_use(&self) -> TokenUse {
        self.token_use
    }

    pub fn max_age_seconds(&self) -> u64 {
        self.max_age_seconds
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn issuer(&self) -> &IssuerIdentity {
        &self.issuer
    }
}

/// Unvalidated input, e.g. deserialized from a config file.
///
/// Unknown fields are rejected at parse time.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrustDomainSettings {
    pub region: Option<String>,
    pub pool_id: Option<String>,
    pub token_use: Option<String>,
    pub max_age_seconds: Option<u64>,
    pub endpoint: Option<String>,
}

impl TryFrom<TrustDomainSettings> for TrustDomainConfig {
    type Error = AuthError;

    fn try_from(value: TrustDomainSettings) -> AuthResult<Self> {
        let region = value
            .region
            .as_deref()
            .and_then(normalize_optional)
            .ok_or_else(|| AuthError::ConfigInvalid("region not specified".into()))?;
        let pool_id = value
            .pool_id
            .as_deref()
            .and_then(normalize_optional)
            .ok_or_else(|| AuthError::ConfigInvalid("user pool id not specified".into()))?;
        let token_use = value
            .token_use
            .as_deref()
            .and_then(normalize_optional)
            .ok_or_else(|| {
                AuthError::ConfigInvalid(
                    "token use not specified. Possible values 'access' | 'id'".into(),
                )
            })?
            .parse::<TokenUse>()?;
        let max_age_seconds = match value.max_age_seconds {
            Some(seconds) => validate_max_age(seconds)?,
            None => DEFAULT_MAX_AGE_SECONDS,
        };
        let endpoint = value
            .endpoint
            .as_deref()
            .map(validate_endpoint)
            .transpose()?;

        let issuer = IssuerIdentity::derive(&region, &pool_id, endpoint.as_deref());
        Ok(Self {
            region,
            pool_id,
            token_use,
            max_age_seconds,
            endpoint,
            issuer,
        })
    }
}

fn validate_max_age(seconds: u64) -> AuthResult<u64> {
    if seconds == 0 {
        return Err(AuthError::ConfigInvalid(
            "max age must be greater than zero seconds".into(),
        ));
    }
    Ok(seconds)
}

fn validate_endpoint(value: &str) -> AuthResult<String> {
    let trimmed = value.trim().trim_end_matches('/');
    let url = Url::parse(trimmed)
        .map_err(|err| AuthError::ConfigInvalid(format!("endpoint '{value}' is invalid: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(AuthError::ConfigInvalid(format!(
            "endpoint scheme '{other}' is not supported"
        ))),
    }
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
