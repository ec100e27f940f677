use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jsonwebtoken::errors::ErrorKind;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid trust domain configuration: {0}")]
    ConfigInvalid(String),
    #[error("validator must be constructed inside a Tokio runtime")]
    RuntimeUnavailable,
    #[error("failed to load signing keys: {0}")]
    KeyFetchFailed(String),
    #[error("signing keys unavailable: {0}")]
    KeysUnavailable(String),
    #[error("malformed token: {0}")]
    MalformedToken(String),
    #[error("token issuer '{actual}' does not match '{expected}'")]
    IssuerMismatch { expected: String, actual: String },
    #[error("expected an {expected} token, got '{actual}'")]
    WrongTokenUse { expected: String, actual: String },
    #[error("no signing key registered for kid '{0}'")]
    UnknownKey(String),
    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),
    #[error("token expired: {0}")]
    TokenExpired(String),
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header malformed")]
    InvalidAuthorization,
}

impl AuthError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::ConfigInvalid(_) => "config_invalid",
            AuthError::RuntimeUnavailable => "runtime_unavailable",
            AuthError::KeyFetchFailed(_) => "key_fetch_failed",
            AuthError::KeysUnavailable(_) => "keys_unavailable",
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::IssuerMismatch { .. } => "issuer_mismatch",
            AuthError::WrongTokenUse { .. } => "wrong_token_use",
            AuthError::UnknownKey(_) => "unknown_key",
            AuthError::SignatureInvalid(_) => "signature_invalid",
            AuthError::TokenExpired(_) => "token_expired",
            AuthError::InvalidClaim(_, _) => "invalid_claim",
            AuthError::MissingAuthorization => "missing_authorization",
            AuthError::InvalidAuthorization => "invalid_authorization",
        }
    }
}

/// Maps failures reported by `jsonwebtoken` during signature verification.
impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        match value.kind() {
            ErrorKind::ExpiredSignature => Self::TokenExpired(value.to_string()),
            _ => Self::SignatureInvalid(value.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::ConfigInvalid(_)
            | AuthError::RuntimeUnavailable
            | AuthError::KeyFetchFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::KeysUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::InvalidClaim(_, _) => StatusCode::BAD_REQUEST,
            AuthError::MalformedToken(_)
            | AuthError::IssuerMismatch { .. }
            | AuthError::WrongTokenUse { .. }
            | AuthError::UnknownKey(_)
            | AuthError::SignatureInvalid(_)
            | AuthError::TokenExpired(_)
            | AuthError::MissingAuthorization
            | AuthError::InvalidAuthorization => StatusCode::UNAUTHORIZED,
        };

        let body = ErrorBody {
            code: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinct_per_check() {
        let errors = [
            AuthError::IssuerMismatch {
                expected: "a".into(),
                actual: "b".into(),
            },
            AuthError::WrongTokenUse {
                expected: "access".into(),
                actual: "id".into(),
            },
            AuthError::UnknownKey("kid".into()),
            AuthError::SignatureInvalid("bad".into()),
            AuthError::TokenExpired("old".into()),
            AuthError::MalformedToken("junk".into()),
            AuthError::KeysUnavailable("down".into()),
        ];
        let mut kinds: Vec<_> = errors.iter().map(AuthError::kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn keys_unavailable_maps_to_service_unavailable() {
        let response = AuthError::KeysUnavailable("jwks down".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn token_failures_map_to_unauthorized() {
        let response = AuthError::SignatureInvalid("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
