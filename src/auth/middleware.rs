//! Authentication Gate
//! Mission: Validate the bearer token on every non-public request
//!
//! START -> token-extracted -> signature-verified -> expiry-checked
//!       -> identity-populated (ALLOW) | REJECT
//!
//! The gate trusts the signed claims and never touches the credential store.

use crate::auth::{
    identity::Identity,
    jwt::{TokenCodec, VerificationError},
    models::Role,
    policy::{AccessPolicy, Decision, PathSet, RequiredRole},
    revocation::RevocationList,
};
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

/// Everything the gate needs; all read-only after startup except the denylist.
#[derive(Clone)]
pub struct GateState {
    pub codec: Arc<TokenCodec>,
    pub policy: Arc<AccessPolicy>,
    pub public_paths: Arc<PathSet>,
    pub revocation_checked: Arc<PathSet>,
    pub revocations: Arc<RevocationList>,
}

/// Why a request was turned away. Logged, never returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingToken,
    InvalidFormat,
    Malformed,
    InvalidSignature,
    Expired,
    Revoked,
    InsufficientRole,
}

impl RejectReason {
    fn into_api_error(self) -> ApiError {
        match self {
            RejectReason::InsufficientRole => ApiError::Forbidden,
            _ => ApiError::Unauthenticated,
        }
    }
}

impl From<VerificationError> for RejectReason {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::InvalidSignature => RejectReason::InvalidSignature,
            VerificationError::Malformed => RejectReason::Malformed,
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, RejectReason> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(RejectReason::MissingToken)?;
    value
        .to_str()
        .ok()
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(RejectReason::InvalidFormat)
}

impl GateState {
    /// Pure decision for one request: no I/O beyond signature verification.
    pub fn admit(&self, path: &str, headers: &HeaderMap) -> Result<Option<Identity>, RejectReason> {
        if self.public_paths.contains(path) {
            return Ok(None);
        }

        let token = bearer_token(headers)?;
        let claims = self.codec.verify(token)?;
        if self.codec.is_expired(&claims) {
            return Err(RejectReason::Expired);
        }

        let identity = Identity::from_claims(claims);

        let privileged = self.policy.requirement(path) == RequiredRole::Exactly(Role::Admin)
            || self.revocation_checked.contains(path);
        if privileged && self.revocations.is_revoked(&identity.token_id) {
            return Err(RejectReason::Revoked);
        }

        match self.policy.authorize(&identity, path) {
            Decision::Allow => Ok(Some(identity)),
            Decision::Forbidden => Err(RejectReason::InsufficientRole),
        }
    }
}

/// Auth middleware that validates JWT tokens and applies the access policy
pub async fn auth_middleware(
    State(gate): State<GateState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = req.uri().path().to_string();

    match gate.admit(&path, req.headers()) {
        Ok(Some(identity)) => {
            req.extensions_mut().insert(identity);
            Ok(next.run(req).await)
        }
        Ok(None) => Ok(next.run(req).await),
        Err(reason) => {
            debug!(path = %path, reason = ?reason, "request rejected at gate");
            Err(reason.into_api_error())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use axum::http::HeaderValue;
    use std::time::Duration;

    const SECRET: &str = "gate-test-secret-0123456789abcdef0123";

    fn gate() -> (GateState, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let codec = TokenCodec::new(SECRET, clock.clone()).unwrap();
        let state = GateState {
            codec: Arc::new(codec),
            policy: Arc::new(AccessPolicy::cafe_default()),
            public_paths: Arc::new(PathSet::cafe_public()),
            revocation_checked: Arc::new(PathSet::cafe_revocation_checked()),
            revocations: Arc::new(RevocationList::new()),
        };
        (state, clock)
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_public_path_bypasses_gate() {
        let (gate, _) = gate();
        assert_eq!(gate.admit("/user/login", &HeaderMap::new()), Ok(None));
    }

    #[test]
    fn test_missing_and_badly_formatted_tokens() {
        let (gate, _) = gate();
        assert_eq!(
            gate.admit("/category/get", &HeaderMap::new()),
            Err(RejectReason::MissingToken)
        );

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert_eq!(
            gate.admit("/category/get", &headers),
            Err(RejectReason::InvalidFormat)
        );

        assert_eq!(
            gate.admit("/category/get", &bearer("not.a.jwt")),
            Err(RejectReason::Malformed)
        );
    }

    #[test]
    fn test_valid_token_populates_identity() {
        let (gate, _) = gate();
        let issued = gate.codec.issue("staff@cafe.test", Role::User).unwrap();

        let identity = gate
            .admit("/category/get", &bearer(&issued.token))
            .unwrap()
            .unwrap();
        assert_eq!(identity.subject, "staff@cafe.test");
        assert_eq!(identity.role, Role::User);
    }

    #[test]
    fn test_expired_token_rejected() {
        let (gate, clock) = gate();
        let issued = gate.codec.issue("staff@cafe.test", Role::User).unwrap();
        clock.advance(Duration::from_secs(10 * 3600));

        assert_eq!(
            gate.admit("/category/get", &bearer(&issued.token)),
            Err(RejectReason::Expired)
        );
    }

    #[test]
    fn test_role_gating() {
        let (gate, _) = gate();
        let user = gate.codec.issue("staff@cafe.test", Role::User).unwrap();
        let admin = gate.codec.issue("boss@cafe.test", Role::Admin).unwrap();

        assert_eq!(
            gate.admit("/category/add", &bearer(&user.token)),
            Err(RejectReason::InsufficientRole)
        );
        assert!(gate
            .admit("/category/add", &bearer(&admin.token))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_revoked_token_blocked_only_on_privileged_paths() {
        let (gate, _) = gate();
        let admin = gate.codec.issue("boss@cafe.test", Role::Admin).unwrap();
        gate.revocations
            .revoke(&admin.claims.jti, admin.claims.exp, gate.codec.now());

        for path in ["/category/add", "/user/changePassword", "/user/checkToken", "/user/logout"] {
            assert_eq!(
                gate.admit(path, &bearer(&admin.token)),
                Err(RejectReason::Revoked),
                "{}",
                path
            );
        }
        assert!(gate
            .admit("/category/get", &bearer(&admin.token))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_reject_reasons_map_to_two_statuses() {
        use axum::http::StatusCode;
        for reason in [
            RejectReason::MissingToken,
            RejectReason::InvalidFormat,
            RejectReason::Malformed,
            RejectReason::InvalidSignature,
            RejectReason::Expired,
            RejectReason::Revoked,
        ] {
            assert_eq!(reason.into_api_error().status(), StatusCode::UNAUTHORIZED);
        }
        assert_eq!(
            RejectReason::InsufficientRole.into_api_error().status(),
            StatusCode::FORBIDDEN
        );
    }
}
