//! Bearer-token verification for a single user pool trust domain.
//!
//! A [`TokenValidator`] derives the issuer from a [`TrustDomainConfig`], loads
//! the issuer's published JWKS once in the background, and verifies tokens
//! against it.

pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod guards;
pub mod jwks;
pub mod keys;
pub mod metrics;
pub mod resolver;
pub mod token;
pub mod verifier;

pub use claims::Claims;
pub use config::{IssuerIdentity, TokenUse, TrustDomainConfig, TrustDomainSettings};
pub use error::{AuthError, AuthResult};
pub use extractors::AuthContext;
pub use guards::{ensure_group, ensure_scope, GuardError};
pub use jwks::JwksFetcher;
pub use keys::{KeyMaterial, KeySet};
pub use metrics::AuthMetrics;
pub use resolver::{KeyResolver, ResolverState};
pub use token::DecodedToken;
pub use verifier::{TokenValidator, TokenValidatorBuilder};
