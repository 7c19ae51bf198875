//! Role Authorization Policy
//! Mission: Map request paths to the role they require, first match wins
//!
//! Patterns are evaluated in configuration order, not by specificity, so more
//! specific rules must be listed before broader ones.

use crate::auth::identity::Identity;
use crate::auth::models::Role;

/// Slash-separated path pattern. `*` matches one segment, a trailing `**`
/// matches zero or more segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<String>,
}

impl PathPattern {
    pub fn new(pattern: &str) -> Self {
        Self {
            raw: pattern.to_string(),
            segments: split_path(pattern).map(str::to_string).collect(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        let mut path_segments = split_path(path);
        for (i, seg) in self.segments.iter().enumerate() {
            if seg == "**" && i == self.segments.len() - 1 {
                return true;
            }
            match path_segments.next() {
                Some(actual) if seg == "*" || seg == actual => {}
                _ => return false,
            }
        }
        path_segments.next().is_none()
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Role a rule demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredRole {
    Authenticated,
    Exactly(Role),
}

#[derive(Debug, Clone)]
pub struct AccessRule {
    pub pattern: PathPattern,
    pub required: RequiredRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Forbidden,
}

/// Static, ordered rule table.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    rules: Vec<AccessRule>,
}

impl AccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, pattern: &str, required: RequiredRole) -> Self {
        self.rules.push(AccessRule {
            pattern: PathPattern::new(pattern),
            required,
        });
        self
    }

    pub fn require(self, pattern: &str, role: Role) -> Self {
        self.rule(pattern, RequiredRole::Exactly(role))
    }

    pub fn any_authenticated(self, pattern: &str) -> Self {
        self.rule(pattern, RequiredRole::Authenticated)
    }

    /// Rule table for the cafe endpoints.
    pub fn cafe_default() -> Self {
        Self::new()
            .require("/user/get", Role::Admin)
            .require("/user/update", Role::Admin)
            .any_authenticated("/category/get")
            .require("/category/**", Role::Admin)
            .any_authenticated("/product/get")
            .any_authenticated("/product/getByCategory/*")
            .any_authenticated("/product/getById/*")
            .any_authenticated("/product/productList")
            .require("/product/**", Role::Admin)
    }

    /// Requirement for `path`; unmatched paths need any authenticated role.
    pub fn requirement(&self, path: &str) -> RequiredRole {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(path))
            .map(|rule| rule.required)
            .unwrap_or(RequiredRole::Authenticated)
    }

    pub fn authorize(&self, identity: &Identity, path: &str) -> Decision {
        match self.requirement(path) {
            RequiredRole::Authenticated => Decision::Allow,
            RequiredRole::Exactly(role) if identity.role == role => Decision::Allow,
            RequiredRole::Exactly(_) => Decision::Forbidden,
        }
    }
}

/// Unordered set of path patterns.
#[derive(Debug, Clone, Default)]
pub struct PathSet {
    patterns: Vec<PathPattern>,
}

impl PathSet {
    pub fn new<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            patterns: patterns.into_iter().map(PathPattern::new).collect(),
        }
    }

    /// Paths that bypass the gate entirely.
    pub fn cafe_public() -> Self {
        Self::new([
            "/user/login",
            "/user/signup",
            "/user/forgotPassword",
            "/health",
            "/swagger-ui/**",
            "/v3/api-docs/**",
        ])
    }

    /// Non-admin paths that act on the caller's own session or credentials.
    /// A logged-out token is refused here as well as on admin paths.
    pub fn cafe_revocation_checked() -> Self {
        Self::new(["/user/changePassword", "/user/checkToken", "/user/logout"])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: Role) -> Identity {
        Identity {
            subject: "someone@cafe.test".to_string(),
            role,
            token_id: "t-1".to_string(),
            issued_at: 0,
            expires_at: 0,
        }
    }

    #[test]
    fn test_pattern_matching() {
        assert!(PathPattern::new("/category/add").matches("/category/add"));
        assert!(PathPattern::new("/category/add").matches("/category/add/"));
        assert!(!PathPattern::new("/category/add").matches("/category/add/1"));

        let one = PathPattern::new("/product/getById/*");
        assert!(one.matches("/product/getById/7"));
        assert!(!one.matches("/product/getById"));
        assert!(!one.matches("/product/getById/7/x"));

        let tail = PathPattern::new("/category/**");
        assert!(tail.matches("/category"));
        assert!(tail.matches("/category/update"));
        assert!(tail.matches("/category/a/b/c"));
        assert!(!tail.matches("/categoryx"));
        assert!(!tail.matches("/product/add"));
    }

    #[test]
    fn test_first_match_wins_over_specificity() {
        let broad_first = AccessPolicy::new()
            .require("/category/**", Role::Admin)
            .any_authenticated("/category/get");
        assert_eq!(
            broad_first.authorize(&identity(Role::User), "/category/get"),
            Decision::Forbidden
        );

        let specific_first = AccessPolicy::new()
            .any_authenticated("/category/get")
            .require("/category/**", Role::Admin);
        assert_eq!(
            specific_first.authorize(&identity(Role::User), "/category/get"),
            Decision::Allow
        );
    }

    #[test]
    fn test_unmatched_requires_any_authenticated() {
        let policy = AccessPolicy::cafe_default();
        assert_eq!(
            policy.requirement("/dashboard/details"),
            RequiredRole::Authenticated
        );
        assert_eq!(
            policy.authorize(&identity(Role::User), "/user/checkToken"),
            Decision::Allow
        );
    }

    #[test]
    fn test_admin_only_paths() {
        let policy = AccessPolicy::cafe_default();
        for path in [
            "/category/add",
            "/category/update",
            "/category/rename",
            "/product/add",
            "/product/update",
            "/product/updateStatus",
            "/product/delete/3",
            "/user/get",
            "/user/update",
            // Unknown paths under a guarded prefix look the same as real ones.
            "/category/does-not-exist",
        ] {
            assert_eq!(
                policy.authorize(&identity(Role::User), path),
                Decision::Forbidden,
                "{}",
                path
            );
            assert_eq!(
                policy.authorize(&identity(Role::Admin), path),
                Decision::Allow,
                "{}",
                path
            );
        }
    }

    #[test]
    fn test_read_paths_open_to_users() {
        let policy = AccessPolicy::cafe_default();
        for path in [
            "/category/get",
            "/product/get",
            "/product/getByCategory/2",
            "/product/getById/9",
            "/product/productList",
        ] {
            assert_eq!(
                policy.authorize(&identity(Role::User), path),
                Decision::Allow,
                "{}",
                path
            );
        }
    }

    #[test]
    fn test_public_paths() {
        let public = PathSet::cafe_public();
        assert!(public.contains("/user/login"));
        assert!(public.contains("/swagger-ui/index.html"));
        assert!(!public.contains("/user/checkToken"));
        assert!(!public.contains("/category/get"));
    }

    #[test]
    fn test_revocation_checked_paths() {
        let checked = PathSet::cafe_revocation_checked();
        assert!(checked.contains("/user/changePassword"));
        assert!(checked.contains("/user/checkToken"));
        assert!(checked.contains("/user/logout"));
        assert!(!checked.contains("/category/get"));
        assert!(!checked.contains("/user/login"));
    }
}
