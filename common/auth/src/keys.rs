use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey};
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use tracing::debug;

use crate::error::{AuthError, AuthResult};
use crate::jwks::{JwkEntry, JwksDocument};

/// Smallest RSA modulus the verifier will accept.
pub const MIN_RSA_BITS: usize = 2048;

const RSA_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

/// Verification-ready public key reconstructed from one JWK entry.
#[derive(Clone)]
pub struct KeyMaterial {
    kid: String,
    algorithm: Option<Algorithm>,
    public_key: RsaPublicKey,
    decoding: DecodingKey,
}

impl KeyMaterial {
    /// Rebuild an RSA key from the base64url modulus and exponent of a JWK.
    pub fn from_jwk(entry: &JwkEntry) -> AuthResult<Self> {
        let kid = entry
            .kid
            .clone()
            .ok_or_else(|| AuthError::KeyFetchFailed("JWKS entry missing key id (kid)".into()))?;
        let kty = entry.kty.as_deref().ok_or_else(|| {
            AuthError::KeyFetchFailed(format!("JWKS key '{kid}' missing key type (kty)"))
        })?;
        if kty != "RSA" {
            return Err(AuthError::KeyFetchFailed(format!(
                "JWKS key '{kid}' uses unsupported key type '{kty}'"
            )));
        }

        let algorithm = entry
            .alg
            .as_deref()
            .map(parse_rsa_algorithm)
            .transpose()
            .map_err(|reason| AuthError::KeyFetchFailed(format!("JWKS key '{kid}': {reason}")))?;

        let (modulus, exponent) = match (entry.n.as_deref(), entry.e.as_deref()) {
            (Some(n), Some(e)) => (n.trim_end_matches('='), e.trim_end_matches('=')),
            _ => {
                return Err(AuthError::KeyFetchFailed(format!(
                    "JWKS key '{kid}' missing required RSA components"
                )))
            }
        };

        let n = decode_component(&kid, "n", modulus)?;
        let e = decode_component(&kid, "e", exponent)?;
        let public_key = RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e))
            .map_err(|err| {
                AuthError::KeyFetchFailed(format!("JWKS key '{kid}' is not a valid RSA key: {err}"))
            })?;
        let bits = public_key.n().bits();
        if bits < MIN_RSA_BITS {
            return Err(AuthError::KeyFetchFailed(format!(
                "JWKS key '{kid}' modulus is {bits} bits, at least {MIN_RSA_BITS} required"
            )));
        }

        let decoding = DecodingKey::from_rsa_components(modulus, exponent).map_err(|err| {
            AuthError::KeyFetchFailed(format!("failed to parse decoding key for kid '{kid}': {err}"))
        })?;

        Ok(Self {
            kid,
            algorithm,
            public_key,
            decoding,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Algorithm pinned by the JWK `alg` member, if the issuer published one.
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }

    pub fn modulus_bits(&self) -> usize {
        self.public_key.n().bits()
    }

    /// SubjectPublicKeyInfo PEM of the reconstructed key.
    pub fn to_pem(&self) -> AuthResult<String> {
        self.public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|err| AuthError::KeyFetchFailed(format!("PEM encoding failed: {err}")))
    }

    /// Resolve the token header `alg` against this key.
    ///
    /// Only RSA signature algorithms are accepted, and only the one the key
    /// pins when it declares `alg`.
    pub fn algorithm_for(&self, header_alg: &str) -> AuthResult<Algorithm> {
        if header_alg.eq_ignore_ascii_case("none") {
            return Err(AuthError::SignatureInvalid(
                "unsigned tokens (alg 'none') are not accepted".into(),
            ));
        }
        let algorithm = parse_rsa_algorithm(header_alg).map_err(AuthError::SignatureInvalid)?;
        match self.algorithm {
            Some(pinned) if pinned != algorithm => Err(AuthError::SignatureInvalid(format!(
                "algorithm {algorithm:?} does not match {pinned:?} declared for kid '{}'",
                self.kid
            ))),
            _ => Ok(algorithm),
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("modulus_bits", &self.modulus_bits())
            .finish()
    }
}

fn parse_rsa_algorithm(alg: &str) -> Result<Algorithm, String> {
    let algorithm =
        Algorithm::from_str(alg).map_err(|_| format!("unsupported algorithm '{alg}'"))?;
    if RSA_ALGORITHMS.contains(&algorithm) {
        Ok(algorithm)
    } else {
        Err(format!("algorithm '{alg}' is not an RSA signature algorithm"))
    }
}

fn decode_component(kid: &str, name: &str, value: &str) -> AuthResult<Vec<u8>> {
    let bytes = URL_SAFE_NO_PAD.decode(value).map_err(|err| {
        AuthError::KeyFetchFailed(format!("JWKS key '{kid}' has invalid '{name}': {err}"))
    })?;
    if bytes.is_empty() {
        return Err(AuthError::KeyFetchFailed(format!(
            "JWKS key '{kid}' has empty '{name}'"
        )));
    }
    Ok(bytes)
}

/// Signing keys of one issuer, indexed by key id. Read-only once built.
#[derive(Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, KeyMaterial>,
}

impl KeySet {
    /// Convert every signing entry of a JWKS document. Any bad entry fails the whole set.
    pub fn from_document(document: JwksDocument) -> AuthResult<Self> {
        let mut keys = HashMap::with_capacity(document.keys.len());
        for entry in document.keys.iter() {
            if entry.key_use.as_deref().is_some_and(|value| value != "sig") {
                debug!(kid = ?entry.kid, key_use = ?entry.key_use, "skipping non-signing JWK");
                continue;
            }
            let material = KeyMaterial::from_jwk(entry)?;
            if keys.contains_key(material.kid()) {
                return Err(AuthError::KeyFetchFailed(format!(
                    "JWKS contains duplicate kid '{}'",
                    material.kid()
                )));
            }
            keys.insert(material.kid().to_string(), material);
        }
        Ok(Self { keys })
    }

    /// Parse and convert a raw JWKS JSON document.
    pub fn from_json(bytes: &[u8]) -> AuthResult<Self> {
        let document: JwksDocument = serde_json::from_slice(bytes)
            .map_err(|err| AuthError::KeyFetchFailed(format!("failed to parse JWKS: {err}")))?;
        Self::from_document(document)
    }

    pub fn lookup(&self, kid: &str) -> Option<&KeyMaterial> {
        self.keys.get(kid)
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

impl fmt::Debug for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::rand_core::OsRng;
    use rsa::RsaPrivateKey;
    use serde_json::json;
    use std::sync::OnceLock;

    fn components() -> &'static (String, String) {
        static COMPONENTS: OnceLock<(String, String)> = OnceLock::new();
        COMPONENTS.get_or_init(|| {
            let private_key = RsaPrivateKey::new(&mut OsRng, 2048).expect("key generation");
            let public_key = private_key.to_public_key();
            (
                URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
                URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
            )
        })
    }

    fn jwks(entries: serde_json::Value) -> Vec<u8> {
        json!({ "keys": entries }).to_string().into_bytes()
    }

    #[test]
    fn converts_rsa_entries() {
        let (n, e) = components();
        let set = KeySet::from_json(&jwks(json!([
            { "kid": "a", "kty": "RSA", "alg": "RS256", "use": "sig", "n": n, "e": e },
            { "kid": "b", "kty": "RSA", "n": n, "e": e }
        ])))
        .expect("key set");

        assert_eq!(set.len(), 2);
        let key = set.lookup("a").expect("kid a");
        assert_eq!(key.algorithm(), Some(Algorithm::RS256));
        assert_eq!(key.modulus_bits(), 2048);
        assert!(set.lookup("b").is_some_and(|key| key.algorithm().is_none()));
        assert!(set.lookup("c").is_none());
    }

    #[test]
    fn exports_spki_pem() {
        let (n, e) = components();
        let set = KeySet::from_json(&jwks(json!([{ "kid": "a", "kty": "RSA", "n": n, "e": e }])))
            .expect("key set");
        let pem = set.lookup("a").expect("kid").to_pem().expect("pem");
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
    }

    #[test]
    fn rejects_unsupported_key_type() {
        let err = KeySet::from_json(&jwks(json!([
            { "kid": "ec", "kty": "EC", "crv": "P-256", "x": "AA", "y": "AA" }
        ])))
        .expect_err("EC must be rejected");
        assert!(matches!(err, AuthError::KeyFetchFailed(msg) if msg.contains("unsupported key type")));
    }

    #[test]
    fn rejects_missing_components_and_kid() {
        let (n, _) = components();
        assert!(KeySet::from_json(&jwks(json!([{ "kid": "a", "kty": "RSA", "n": n }]))).is_err());
        assert!(KeySet::from_json(&jwks(json!([{ "kty": "RSA", "n": n, "e": "AQAB" }]))).is_err());
        assert!(KeySet::from_json(&jwks(json!([{ "kid": "a", "n": n, "e": "AQAB" }]))).is_err());
    }

    #[test]
    fn rejects_undersized_modulus() {
        let err = KeySet::from_json(&jwks(json!([
            { "kid": "tiny", "kty": "RSA", "n": URL_SAFE_NO_PAD.encode([0xC5u8; 64]), "e": "AQAB" }
        ])))
        .expect_err("512-bit key must be rejected");
        assert!(matches!(err, AuthError::KeyFetchFailed(_)));
    }

    #[test]
    fn rejects_duplicate_kid_and_foreign_alg() {
        let (n, e) = components();
        let duplicate = jwks(json!([
            { "kid": "a", "kty": "RSA", "n": n, "e": e },
            { "kid": "a", "kty": "RSA", "n": n, "e": e }
        ]));
        assert!(KeySet::from_json(&duplicate).is_err());

        let hmac = jwks(json!([{ "kid": "a", "kty": "RSA", "alg": "HS256", "n": n, "e": e }]));
        assert!(KeySet::from_json(&hmac).is_err());
    }

    #[test]
    fn skips_encryption_keys() {
        let (n, e) = components();
        let set = KeySet::from_json(&jwks(json!([
            { "kid": "enc", "kty": "RSA", "use": "enc", "n": n, "e": e },
            { "kid": "sig", "kty": "RSA", "use": "sig", "n": n, "e": e }
        ])))
        .expect("key set");
        assert_eq!(set.key_ids().collect::<Vec<_>>(), vec!["sig"]);
    }

    #[test]
    fn header_algorithm_must_match_key() {
        let (n, e) = components();
        let set = KeySet::from_json(&jwks(json!([
            { "kid": "a", "kty": "RSA", "alg": "RS256", "n": n, "e": e }
        ])))
        .expect("key set");
        let key = set.lookup("a").expect("kid");

        assert_eq!(key.algorithm_for("RS256").expect("RS256"), Algorithm::RS256);
        for alg in ["none", "NONE", "HS256", "ES256", "RS512", "bogus"] {
            let err = key.algorithm_for(alg).expect_err("must reject");
            assert!(matches!(err, AuthError::SignatureInvalid(_)), "{alg}: {err:?}");
        }
    }
}
