//! Authentication Module
//! Mission: Stateless bearer tokens, role policy and the credential store

pub mod api;
pub mod clock;
pub mod identity;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod revocation;
pub mod user_store;

pub use identity::Identity;
pub use jwt::TokenCodec;
pub use middleware::{auth_middleware, GateState};
pub use models::Role;
pub use user_store::CredentialStore;
