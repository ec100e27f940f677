#![allow(dead_code)]

use std::sync::OnceLock;

use anyhow::Result;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use idp_auth::TrustDomainConfig;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs8::EncodePublicKey;
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};

pub const REGION: &str = "us-east-1";
pub const POOL_ID: &str = "us-east-1_TestPool";
pub const KID: &str = "primary-key";

/// Route library logs to the test harness; set RUST_LOG to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct TestKey {
    pub encoding: EncodingKey,
    pub modulus: String,
    pub exponent: String,
    pub public_pem: String,
}

fn generate() -> TestKey {
    let private_key = RsaPrivateKey::new(&mut OsRng, 2048).expect("key generation");
    let public_key = private_key.to_public_key();
    let private_pem = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .expect("private pem");
    let public_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .expect("public pem");

    TestKey {
        encoding: EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("encoding key"),
        modulus: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
        exponent: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        public_pem,
    }
}

/// Key published by the issuer in every test JWKS.
pub fn signing_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(generate)
}

/// Key the issuer never publishes.
pub fn rogue_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(generate)
}

pub fn jwks_body(kid: &str, key: &TestKey) -> Value {
    json!({
        "keys": [
            {
                "kid": kid,
                "kty": "RSA",
                "alg": "RS256",
                "use": "sig",
                "n": key.modulus,
                "e": key.exponent
            }
        ]
    })
}

pub fn jwks_path() -> String {
    format!("/{POOL_ID}/.well-known/jwks.json")
}

pub fn config(endpoint: &str, token_use: &str) -> Result<TrustDomainConfig> {
    Ok(TrustDomainConfig::new(REGION, POOL_ID, token_use)?.with_endpoint(endpoint)?)
}

pub fn claims(issuer: &str, token_use: &str, exp_offset: i64) -> Value {
    let now = Utc::now().timestamp();
    json!({
        "sub": "6c1f7e52-8d43-4c4b-9a57-0f6ed2b4c1a9",
        "iss": issuer,
        "token_use": token_use,
        "client_id": "test-client",
        "username": "alice",
        "cognito:groups": ["staff"],
        "scope": "orders/read",
        "iat": now,
        "exp": now + exp_offset
    })
}

pub fn sign(key: &TestKey, kid: &str, claims: &Value) -> Result<String> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    Ok(encode(&header, claims, &key.encoding)?)
}

/// Flip one bit of the signature while keeping the segment valid base64url.
pub fn tamper_signature(token: &str) -> Result<String> {
    let (signed, signature) = token
        .rsplit_once('.')
        .ok_or_else(|| anyhow::anyhow!("token has no signature segment"))?;
    let mut bytes = URL_SAFE_NO_PAD.decode(signature)?;
    if let Some(first) = bytes.first_mut() {
        *first ^= 0x01;
    }
    Ok(format!("{signed}.{}", URL_SAFE_NO_PAD.encode(bytes)))
}

/// Replace the payload segment, keeping the original header and signature.
pub fn swap_payload(token: &str, claims: &Value) -> Result<String> {
    let mut segments = token.split('.');
    let header = segments.next().unwrap_or_default();
    let _ = segments.next();
    let signature = segments.next().unwrap_or_default();
    Ok(format!(
        "{header}.{}.{signature}",
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?)
    ))
}

pub fn unsigned_token(kid: &str, claims: &Value) -> Result<String> {
    let header = json!({ "alg": "none", "kid": kid, "typ": "JWT" });
    Ok(format!(
        "{}.{}.",
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?)
    ))
}
