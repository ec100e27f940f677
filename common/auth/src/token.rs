use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{AuthError, AuthResult};

/// Fields of the JOSE header the validator relies on.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenHeader {
    #[serde(default)]
    pub kid: Option<String>,
    pub alg: String,
}

/// A token split into its parts, signature not yet checked.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    pub header: TokenHeader,
    pub payload: Map<String, Value>,
    pub signature: Vec<u8>,
}

impl DecodedToken {
    /// Split `header.payload.signature` and decode each base64url segment.
    pub fn decode(token: &str) -> AuthResult<Self> {
        let mut segments = token.split('.');
        let (header, payload, signature) =
            match (segments.next(), segments.next(), segments.next(), segments.next()) {
                (Some(header), Some(payload), Some(signature), None) => {
                    (header, payload, signature)
                }
                _ => {
                    return Err(AuthError::MalformedToken(
                        "expected three dot-separated segments".into(),
                    ))
                }
            };

        let header_bytes = decode_segment("header", header)?;
        let header: TokenHeader = serde_json::from_slice(&header_bytes).map_err(|err| {
            AuthError::MalformedToken(format!("header is not a valid JOSE header: {err}"))
        })?;

        let payload_bytes = decode_segment("payload", payload)?;
        let payload = match serde_json::from_slice::<Value>(&payload_bytes) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return Err(AuthError::MalformedToken(
                    "payload is not a JSON object".into(),
                ))
            }
            Err(err) => {
                return Err(AuthError::MalformedToken(format!(
                    "payload is not JSON: {err}"
                )))
            }
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|err| AuthError::MalformedToken(format!("signature segment: {err}")))?;

        Ok(Self {
            header,
            payload,
            signature,
        })
    }

    pub fn issuer(&self) -> Option<&str> {
        self.payload.get("iss").and_then(Value::as_str)
    }

    pub fn token_use(&self) -> Option<&str> {
        self.payload.get("token_use").and_then(Value::as_str)
    }

    pub fn expiration(&self) -> Option<i64> {
        self.payload.get("exp").and_then(numeric_date)
    }

    pub fn issued_at(&self) -> Option<i64> {
        self.payload.get("iat").and_then(numeric_date)
    }

    pub fn subject(&self) -> Option<&str> {
        self.payload.get("sub").and_then(Value::as_str)
    }

    pub fn into_claims(self) -> Value {
        Value::Object(self.payload)
    }
}

fn decode_segment(name: &str, segment: &str) -> AuthResult<Vec<u8>> {
    if segment.is_empty() {
        return Err(AuthError::MalformedToken(format!("{name} segment is empty")));
    }
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|err| AuthError::MalformedToken(format!("{name} segment: {err}")))
}

fn numeric_date(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|seconds| seconds.floor() as i64))
}
