//! Catalog API Endpoints
//! Mission: Category / product administration and menu reads
//!
//! Each category edit declares its concurrency protocol up front. Products have
//! no version column, so only the locked path type-checks for them.

use crate::api::{run_blocking, AppState};
use crate::auth::identity::Identity;
use crate::catalog::models::{
    Category, CategoryFilter, CategoryRename, CategoryUpdate, DashboardCounts, NewCategory,
    NewProduct, PageQuery, Product, ProductPage, ProductStatusUpdate, ProductSummary, ProductUpdate,
    ProductView,
};
use crate::concurrency::{GuardError, Mutation};
use crate::error::{message, ApiError, INVALID_DATA};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    Json,
};
use tracing::info;

const EMPTY_ITEM: &str = "Item cannot be empty";

/// Protocol for `/category/rename`, used by bulk tooling.
const CATEGORY_RENAME: Mutation = Mutation::Pessimistic;

fn category_name(raw: &str) -> Result<String, GuardError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(GuardError::Rejected(EMPTY_ITEM.to_string()));
    }
    Ok(name.to_string())
}

fn validate_product(name: &str, price: i64) -> Result<(), ApiError> {
    if name.trim().is_empty() || price < 0 {
        return Err(ApiError::BadRequest(INVALID_DATA.to_string()));
    }
    Ok(())
}

/// POST /category/add (admin)
pub async fn add_category(
    State(state): State<AppState>,
    admin: Identity,
    Json(payload): Json<NewCategory>,
) -> Result<Response, ApiError> {
    let name = category_name(&payload.name)?;
    let catalog = state.catalog.clone();
    let category = run_blocking(move || catalog.add_category(&name)).await?;

    info!(by = %admin.subject, id = category.id, "Category created");
    Ok(message(StatusCode::OK, "Category Added Successfully"))
}

/// GET /category/get?filterValue=true
pub async fn get_categories(
    State(state): State<AppState>,
    Query(filter): Query<CategoryFilter>,
) -> Result<Json<Vec<Category>>, ApiError> {
    let catalog = state.catalog.clone();
    let active_only = filter.active_only();
    Ok(Json(run_blocking(move || catalog.categories(active_only)).await?))
}

/// POST /category/update (admin): optimistic, the body carries the version read.
pub async fn update_category(
    State(state): State<AppState>,
    admin: Identity,
    Json(payload): Json<CategoryUpdate>,
) -> Result<Json<Category>, ApiError> {
    let mutation = Mutation::Optimistic {
        expected_version: payload.version,
    };
    let updated = edit_category(&state, payload.id, &payload.name, mutation).await?;
    info!(by = %admin.subject, id = updated.id, version = updated.version, "Category updated");
    Ok(Json(updated))
}

/// POST /category/rename (admin): exclusive lock, no version needed.
pub async fn rename_category(
    State(state): State<AppState>,
    admin: Identity,
    Json(payload): Json<CategoryRename>,
) -> Result<Json<Category>, ApiError> {
    let updated = edit_category(&state, payload.id, &payload.name, CATEGORY_RENAME).await?;
    info!(by = %admin.subject, id = updated.id, version = updated.version, "Category renamed");
    Ok(Json(updated))
}

async fn edit_category(
    state: &AppState,
    id: i64,
    name: &str,
    mutation: Mutation,
) -> Result<Category, ApiError> {
    let name = category_name(name)?;
    let guard = state.guard.clone();
    run_blocking(move || {
        guard.apply(id, mutation, |category: &mut Category| {
            category.name = name;
            Ok(())
        })
    })
    .await
}

/// POST /product/add (admin)
pub async fn add_product(
    State(state): State<AppState>,
    admin: Identity,
    Json(payload): Json<NewProduct>,
) -> Result<Response, ApiError> {
    validate_product(&payload.name, payload.price)?;

    let catalog = state.catalog.clone();
    let product = run_blocking(move || {
        catalog.add_product(
            payload.name.trim(),
            payload.description.trim(),
            payload.price,
            payload.category_id,
            payload.status,
        )
    })
    .await?;

    info!(by = %admin.subject, id = product.id, "Product created");
    Ok(message(StatusCode::OK, "Product Added Successfully."))
}

/// GET /product/get
pub async fn get_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    let catalog = state.catalog.clone();
    Ok(Json(run_blocking(move || catalog.products()).await?))
}

/// GET /product/getByCategory/:id (active products only)
pub async fn get_by_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ProductSummary>>, ApiError> {
    let catalog = state.catalog.clone();
    Ok(Json(
        run_blocking(move || catalog.products_by_category(id)).await?,
    ))
}

/// GET /product/getById/:id
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ProductView>, ApiError> {
    let catalog = state.catalog.clone();
    run_blocking(move || catalog.product(id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Product id does not exist".to_string()))
}

/// GET /product/productList?page=0&size=10
pub async fn product_list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ProductPage>, ApiError> {
    let catalog = state.catalog.clone();
    Ok(Json(
        run_blocking(move || catalog.product_page(query.page, query.size)).await?,
    ))
}

/// POST /product/update (admin)
pub async fn update_product(
    State(state): State<AppState>,
    admin: Identity,
    Json(payload): Json<ProductUpdate>,
) -> Result<Response, ApiError> {
    validate_product(&payload.name, payload.price)?;

    let catalog = state.catalog.clone();
    let category_id = payload.category_id;
    if run_blocking(move || catalog.category(category_id))
        .await?
        .is_none()
    {
        return Err(ApiError::NotFound("Category id does not exist".to_string()));
    }

    let id = payload.id;
    let guard = state.guard.clone();
    run_blocking(move || {
        guard.update_exclusive(id, |product: &mut Product| {
            product.name = payload.name.trim().to_string();
            product.description = payload.description.trim().to_string();
            product.price = payload.price;
            product.category_id = payload.category_id;
            if let Some(status) = payload.status {
                product.status = status;
            }
            Ok(())
        })
    })
    .await?;

    info!(by = %admin.subject, id, "Product updated");
    Ok(message(StatusCode::OK, "Product Updated Successfully"))
}

/// POST /product/updateStatus (admin)
pub async fn update_product_status(
    State(state): State<AppState>,
    admin: Identity,
    Json(payload): Json<ProductStatusUpdate>,
) -> Result<Response, ApiError> {
    let guard = state.guard.clone();
    let ProductStatusUpdate { id, status } = payload;
    run_blocking(move || {
        guard.update_exclusive(id, |product: &mut Product| {
            product.status = status;
            Ok(())
        })
    })
    .await?;

    info!(by = %admin.subject, id, status, "Product status updated");
    Ok(message(StatusCode::OK, "Product Status Updated Successfully"))
}

/// POST /product/delete/:id (admin)
pub async fn delete_product(
    State(state): State<AppState>,
    admin: Identity,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let guard = state.guard.clone();
    run_blocking(move || guard.delete_exclusive::<Product>(id)).await?;

    info!(by = %admin.subject, id, "Product deleted");
    Ok(message(StatusCode::OK, "Product Deleted Successfully."))
}

/// GET /dashboard/details
pub async fn dashboard_details(
    State(state): State<AppState>,
) -> Result<Json<DashboardCounts>, ApiError> {
    let catalog = state.catalog.clone();
    Ok(Json(run_blocking(move || catalog.counts()).await?))
}
