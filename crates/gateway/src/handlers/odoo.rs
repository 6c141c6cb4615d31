//! Odoo proxy handlers

use axum::extract::State;
use serde::Deserialize;

use super::ApiQuery;
use crate::AppState;
use noe_common::{
    auth::AuthSession,
    cache::keys,
    errors::Result,
    models::{OdooConnection, OdooProduct},
    response::ApiResponse,
};

/// Upper bound for one product search
const MAX_SEARCH_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct ProductSearchQuery {
    #[serde(default)]
    pub search: String,
    pub limit: Option<u32>,
}

/// Product search through the response cache
pub(crate) async fn search_catalog(
    state: &AppState,
    query: &str,
    limit: u32,
) -> Result<Vec<OdooProduct>> {
    let catalog = state.catalog()?;
    let query = query.trim().to_lowercase();
    let key = keys::odoo_products(&query, limit);

    state
        .product_cache
        .get_or_load(key, || async move { catalog.search_products(&query, limit).await })
        .await
}

/// Odoo connectivity report
pub async fn status(
    State(state): State<AppState>,
    _auth: AuthSession,
) -> Result<ApiResponse<OdooConnection>> {
    let connection = state.catalog()?.test_connection().await;
    let message = if connection.connected {
        "Connected to Odoo"
    } else {
        "Odoo is unreachable"
    };

    Ok(ApiResponse::ok(connection).with_message(message))
}

/// Search Odoo products by name
pub async fn search_products(
    State(state): State<AppState>,
    _auth: AuthSession,
    ApiQuery(query): ApiQuery<ProductSearchQuery>,
) -> Result<ApiResponse<Vec<OdooProduct>>> {
    let limit = query
        .limit
        .unwrap_or(state.config.odoo.search_limit)
        .clamp(1, MAX_SEARCH_LIMIT);

    let products = search_catalog(&state, &query.search, limit).await?;
    Ok(ApiResponse::ok(products))
}
