//! HTTP front end: public product endpoints, token issuance, and the
//! bearer-protected reports.

pub mod error;

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::auth::{issue_token, verify_token, IssuedToken};
use crate::config::Config;
use crate::query::{Paginated, ProductQuery};
use crate::reports::{
    DateRange, DeletedProductsReport, NonDeletedProductsReport, ProductsByCategoryReport,
};
use crate::storage::repository::Product;
use crate::Catalog;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(catalog: Catalog, config: Arc<Config>) -> Self {
        Self { catalog, config }
    }
}

pub fn app_router(state: AppState) -> Router {
    let reports = Router::new()
        .route("/deleted-products", get(deleted_products))
        .route("/non-deleted-products", get(non_deleted_products))
        .route("/products-by-category", get(products_by_category))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/products", get(list_products))
        .route("/api/products/{id}", get(get_product).delete(delete_product))
        .route("/api/auth/generate-token", post(generate_token))
        .nest("/api/reports", reports)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get("authorization")
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| ApiError::unauthorized("Authorization header is not valid UTF-8"))?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| ApiError::unauthorized("Authorization header must be `Bearer <token>`"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ApiError::unauthorized("Authorization scheme must be `Bearer`"));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(ApiError::unauthorized("Bearer token is empty"));
    }

    Ok(token)
}

async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())?;
    let claims = verify_token(token, &state.config.jwt)?;
    log::debug!("Authenticated report request for {}", claims.username);
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
    })
}

// ── Products ───────────────────────────────────────────────────────

/// Raw list parameters; parsed by hand so bad values get a JSON 400.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    page: Option<String>,
    limit: Option<String>,
    name: Option<String>,
    category: Option<String>,
    brand: Option<String>,
    color: Option<String>,
    min_price: Option<String>,
    max_price: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_param<T: FromStr>(label: &str, value: Option<String>) -> Result<Option<T>, ApiError> {
    non_blank(value)
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| ApiError::bad_request(format!("{label} must be a number, got {v:?}")))
        })
        .transpose()
}

impl ListParams {
    fn into_query(self) -> Result<ProductQuery, ApiError> {
        let mut query = ProductQuery::new();
        if let Some(page) = parse_param::<u32>("page", self.page)? {
            query = query.page(page);
        }
        if let Some(limit) = parse_param::<u32>("limit", self.limit)? {
            query = query.limit(limit);
        }
        if let Some(min) = parse_param::<f64>("minPrice", self.min_price)? {
            query = query.min_price(min);
        }
        if let Some(max) = parse_param::<f64>("maxPrice", self.max_price)? {
            query = query.max_price(max);
        }
        if let Some(name) = non_blank(self.name) {
            query = query.name(&name);
        }
        if let Some(category) = non_blank(self.category) {
            query = query.category(&category);
        }
        if let Some(brand) = non_blank(self.brand) {
            query = query.brand(&brand);
        }
        if let Some(color) = non_blank(self.color) {
            query = query.color(&color);
        }
        query.validate()?;
        Ok(query)
    }
}

async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Paginated<Product>>, ApiError> {
    let query = params.into_query()?;
    Ok(Json(state.catalog.products(query).await?))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.catalog.product(&id).await?))
}

async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete_product(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Auth ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GenerateTokenRequest {
    #[serde(default)]
    username: String,
}

async fn generate_token(
    State(state): State<AppState>,
    payload: Result<Json<GenerateTokenRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IssuedToken>), ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let token = issue_token(&request.username, &state.config.jwt)?;
    Ok((StatusCode::CREATED, Json(token)))
}

// ── Reports ────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DateRangeParams {
    start_date: Option<String>,
    end_date: Option<String>,
}

async fn deleted_products(
    State(state): State<AppState>,
) -> Result<Json<DeletedProductsReport>, ApiError> {
    Ok(Json(state.catalog.deleted_report().await?))
}

async fn non_deleted_products(
    State(state): State<AppState>,
    Query(params): Query<DateRangeParams>,
) -> Result<Json<NonDeletedProductsReport>, ApiError> {
    let range = DateRange::parse(params.start_date.as_deref(), params.end_date.as_deref())?;
    Ok(Json(state.catalog.non_deleted_report(range).await?))
}

async fn products_by_category(
    State(state): State<AppState>,
) -> Result<Json<ProductsByCategoryReport>, ApiError> {
    Ok(Json(state.catalog.category_report().await?))
}
