use axum::http::StatusCode;

use crate::AuthContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    MissingGroup { required: Vec<String> },
    MissingScope { required: String },
}

impl GuardError {
    pub fn into_response(self) -> (StatusCode, String) {
        match self {
            GuardError::MissingGroup { required } => (
                StatusCode::FORBIDDEN,
                format!("Insufficient group membership. Required one of: {}", required.join(", ")),
            ),
            GuardError::MissingScope { required } => (
                StatusCode::FORBIDDEN,
                format!("Token lacks required scope '{required}'"),
            ),
        }
    }
}

impl From<GuardError> for (StatusCode, String) {
    fn from(value: GuardError) -> Self {
        value.into_response()
    }
}

/// Passes when the caller belongs to any of `allowed` (from `cognito:groups`).
pub fn ensure_group(auth: &AuthContext, allowed: &[&str]) -> Result<(), GuardError> {
    if allowed.is_empty() || allowed.iter().any(|group| auth.in_group(group)) {
        return Ok(());
    }
    Err(GuardError::MissingGroup {
        required: allowed.iter().map(|value| value.to_string()).collect(),
    })
}

pub fn ensure_scope(auth: &AuthContext, scope: &str) -> Result<(), GuardError> {
    if auth.claims.has_scope(scope) {
        Ok(())
    } else {
        Err(GuardError::MissingScope {
            required: scope.to_string(),
        })
    }
}
