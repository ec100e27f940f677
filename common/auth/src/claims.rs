use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::config::TokenUse;
use crate::error::{AuthError, AuthResult};

/// Application-focused view of verified user pool claims.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    pub subject: String,
    pub issuer: String,
    #[serde(serialize_with = "serialize_token_use")]
    pub token_use: TokenUse,
    pub expires_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
    pub username: Option<String>,
    pub client_id: Option<String>,
    pub audience: Vec<String>,
    pub groups: Vec<String>,
    pub scopes: Vec<String>,
    pub raw: serde_json::Value,
}

impl Claims {
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|value| value == group)
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|value| value == scope)
    }
}

fn serialize_token_use<S>(value: &TokenUse, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(value.as_str())
}

#[derive(Debug, Deserialize)]
struct ClaimsRepr {
    sub: String,
    iss: String,
    token_use: String,
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default, rename = "cognito:username")]
    pool_username: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    aud: Option<AudienceRepr>,
    #[serde(default, rename = "cognito:groups")]
    groups: Vec<String>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AudienceRepr {
    Single(String),
    Many(Vec<String>),
}

impl TryFrom<ClaimsRepr> for Claims {
    type Error = AuthError;

    fn try_from(value: ClaimsRepr) -> AuthResult<Self> {
        let token_use = value
            .token_use
            .parse::<TokenUse>()
            .map_err(|_| AuthError::InvalidClaim("token_use", value.token_use.clone()))?;

        let expires_at = Utc
            .timestamp_opt(value.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("exp", value.exp.to_string()))?;

        let issued_at = match value.iat {
            Some(iat) => Some(
                Utc.timestamp_opt(iat, 0)
                    .single()
                    .ok_or_else(|| AuthError::InvalidClaim("iat", iat.to_string()))?,
            ),
            None => None,
        };

        let audience = match value.aud {
            Some(AudienceRepr::Single(item)) => vec![item],
            Some(AudienceRepr::Many(items)) => items,
            None => Vec::new(),
        };

        let scopes = value
            .scope
            .map(|scope| scope.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default();

        Ok(Self {
            subject: value.sub,
            issuer: value.iss,
            token_use,
            expires_at,
            issued_at,
            username: value.username.or(value.pool_username),
            client_id: value.client_id,
            audience,
            groups: value.groups,
            scopes,
            raw: serde_json::Value::Null,
        })
    }
}

impl TryFrom<serde_json::Value> for Claims {
    type Error = AuthError;

    fn try_from(value: serde_json::Value) -> AuthResult<Self> {
        let repr: ClaimsRepr = serde_json::from_value(value.clone())
            .map_err(|err| AuthError::InvalidClaim("payload", err.to_string()))?;
        let mut claims = Claims::try_from(repr)?;
        claims.raw = value;
        Ok(claims)
    }
}
