//! HTTP Surface
//! Mission: Wire stores, gate and handlers into one axum router
//!
//! Layer order, outermost first: CORS, request logging, authentication gate,
//! then per-group layers (login rate limit) and handlers.

use crate::auth::{
    api as auth_api,
    clock::Clock,
    jwt::TokenCodec,
    middleware::{auth_middleware, GateState},
    policy::{AccessPolicy, PathSet},
    revocation::RevocationList,
    user_store::CredentialStore,
};
use crate::catalog::{api as catalog_api, store::CatalogStore};
use crate::concurrency::ConcurrencyGuard;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::middleware::{login_rate_limit, request_logging, LoginRateLimiter};
use crate::notify::Notifier;
use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<CredentialStore>,
    pub catalog: Arc<CatalogStore>,
    pub guard: Arc<ConcurrencyGuard>,
    pub codec: Arc<TokenCodec>,
    pub revocations: Arc<RevocationList>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    /// Open the stores and build the token codec. Fails on a weak secret.
    pub fn from_config(
        config: &AppConfig,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let lock_wait = config.lock_wait();
        let users = CredentialStore::new(&config.db_path, lock_wait)
            .context("Failed to open credential store")?
            .with_bcrypt_cost(config.bcrypt_cost);
        let catalog =
            CatalogStore::new(&config.db_path, lock_wait).context("Failed to open catalog store")?;
        let codec = TokenCodec::new(&config.jwt_secret, clock)?;

        Ok(Self {
            users: Arc::new(users),
            catalog: Arc::new(catalog),
            guard: Arc::new(ConcurrencyGuard::new(&config.db_path, lock_wait)),
            codec: Arc::new(codec),
            revocations: Arc::new(RevocationList::new()),
            notifier,
        })
    }

    /// Gate sharing this state's codec and denylist.
    pub fn gate(&self) -> GateState {
        GateState {
            codec: self.codec.clone(),
            policy: Arc::new(AccessPolicy::cafe_default()),
            public_paths: Arc::new(PathSet::cafe_public()),
            revocation_checked: Arc::new(PathSet::cafe_revocation_checked()),
            revocations: self.revocations.clone(),
        }
    }
}

/// Run storage / bcrypt work off the async workers.
pub async fn run_blocking<T, E, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {}", e)))?
        .map_err(Into::into)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "cafe-backend" }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not Found".to_string())
}

pub fn build_router(state: AppState, login_limit: u32) -> Router {
    let gate = state.gate();

    let credential_routes = Router::new()
        .route("/user/login", post(auth_api::login))
        .route("/user/signup", post(auth_api::signup))
        .route("/user/forgotPassword", post(auth_api::forgot_password))
        .layer(middleware::from_fn_with_state(
            LoginRateLimiter::per_minute(login_limit),
            login_rate_limit,
        ));

    let user_routes = Router::new()
        .route("/user/get", get(auth_api::list_users))
        .route("/user/update", post(auth_api::update_status))
        .route("/user/checkToken", get(auth_api::check_token))
        .route("/user/changePassword", post(auth_api::change_password))
        .route("/user/logout", post(auth_api::logout));

    let category_routes = Router::new()
        .route("/category/add", post(catalog_api::add_category))
        .route("/category/get", get(catalog_api::get_categories))
        .route("/category/update", post(catalog_api::update_category))
        .route("/category/rename", post(catalog_api::rename_category));

    let product_routes = Router::new()
        .route("/product/add", post(catalog_api::add_product))
        .route("/product/get", get(catalog_api::get_products))
        .route(
            "/product/getByCategory/:id",
            get(catalog_api::get_by_category),
        )
        .route("/product/getById/:id", get(catalog_api::get_by_id))
        .route("/product/productList", get(catalog_api::product_list))
        .route("/product/update", post(catalog_api::update_product))
        .route(
            "/product/updateStatus",
            post(catalog_api::update_product_status),
        )
        .route("/product/delete/:id", post(catalog_api::delete_product));

    Router::new()
        .route("/health", get(health))
        .route("/dashboard/details", get(catalog_api::dashboard_details))
        .merge(credential_routes)
        .merge(user_routes)
        .merge(category_routes)
        .merge(product_routes)
        // Unknown paths still pass the gate so they answer like real ones.
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(gate, auth_middleware))
        .layer(middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
