//! JWT Token Codec
//! Mission: Issue and verify signed, time-bounded claim sets

use crate::auth::clock::Clock;
use crate::auth::models::{Claims, Role};
use crate::config::ConfigError;
use anyhow::{Context, Result};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// HS256 needs at least 256 bits of key material.
pub const MIN_SECRET_BYTES: usize = 32;

/// Fixed, non-renewable token lifetime.
pub const TOKEN_TTL_HOURS: i64 = 10;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("token signature does not match")]
    InvalidSignature,
    #[error("token is not a well-formed JWT")]
    Malformed,
}

/// Freshly issued token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Token codec bound to one process-wide secret and clock.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    /// Fails when the secret is shorter than [`MIN_SECRET_BYTES`].
    pub fn new(secret: &str, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let len = secret.as_bytes().len();
        if len < MIN_SECRET_BYTES {
            return Err(ConfigError::WeakSigningSecret {
                len,
                min: MIN_SECRET_BYTES,
            });
        }

        // Expiry is checked separately against our own clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs: TOKEN_TTL_HOURS * 3600,
            clock,
        })
    }

    /// Seconds a new token stays valid.
    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Sign a claim set for `subject` valid from now for the fixed lifetime.
    pub fn issue(&self, subject: &str, role: Role) -> Result<IssuedToken> {
        let iat = self.clock.now();
        let claims = Claims {
            sub: subject.to_string(),
            role,
            iat,
            exp: iat + self.ttl_secs,
            jti: Uuid::new_v4().to_string(),
        };

        debug!(
            subject = %subject,
            role = role.as_str(),
            "Issuing token, expires in {}h",
            TOKEN_TTL_HOURS
        );

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .context("Failed to sign token")?;

        Ok(IssuedToken { token, claims })
    }

    /// Check the signature and decode the claims. Expiry is not checked here.
    pub fn verify(&self, token: &str) -> Result<Claims, VerificationError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => VerificationError::InvalidSignature,
                _ => VerificationError::Malformed,
            })
    }

    /// A token expiring exactly now is already expired.
    pub fn is_expired(&self, claims: &Claims) -> bool {
        claims.exp <= self.clock.now()
    }
}
