//! Request-scoped caller identity.
//!
//! The gate inserts an [`Identity`] into the request extensions; handlers take
//! it as an extractor argument. Nothing outlives the request.

use crate::auth::models::{Claims, Role};
use crate::error::ApiError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub role: Role,
    pub token_id: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl Identity {
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            subject: claims.sub,
            role: claims.role,
            token_id: claims.jti,
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn current_user(&self) -> &str {
        &self.subject
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Absent only if a route was mounted outside the gate.
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(ApiError::Unauthenticated)
    }
}
