//! Toast proxy handlers

use axum::extract::State;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ApiQuery;
use crate::AppState;
use noe_common::{
    auth::AuthSession,
    cache::keys,
    errors::{AppError, Result},
    models::{summarize_sales, SalesPage, SalesSummary, ToastConnection},
    response::ApiResponse,
    toast::{collect_sales, SalesQuery},
};

/// Largest page Toast will serve
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummaryResponse {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_revenue: f64,
    pub total_quantity: f64,
    pub items: Vec<SalesSummary>,
}

fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| AppError::validation(field, format!("{} must be YYYY-MM-DD", field))),
        None => Ok(Utc::now().date_naive()),
    }
}

/// Date range from query params; both default to today (UTC)
fn date_range(params: &SalesParams) -> Result<(NaiveDate, NaiveDate)> {
    let start = parse_date(params.start_date.as_deref(), "startDate")?;
    let end = match params.end_date.as_deref() {
        Some(_) => parse_date(params.end_date.as_deref(), "endDate")?,
        None => start,
    };
    Ok((start, end))
}

fn page_size(state: &AppState, requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(state.config.toast.page_size)
        .clamp(1, MAX_PAGE_SIZE)
}

/// Toast connectivity report
pub async fn status(
    State(state): State<AppState>,
    _auth: AuthSession,
) -> Result<ApiResponse<ToastConnection>> {
    let connection = state.sales()?.test_connection().await;
    let message = if connection.connected {
        "Connected to Toast"
    } else {
        "Toast is unreachable"
    };

    Ok(ApiResponse::ok(connection).with_message(message))
}

/// One page of sold items
pub async fn sales(
    State(state): State<AppState>,
    _auth: AuthSession,
    ApiQuery(params): ApiQuery<SalesParams>,
) -> Result<ApiResponse<SalesPage>> {
    let source = state.sales()?;
    let (start, end) = date_range(&params)?;
    let query = SalesQuery::new(
        start,
        end,
        params.page.unwrap_or(1),
        page_size(&state, params.page_size),
    )?;

    let key = keys::toast_sales(
        &start.to_string(),
        &end.to_string(),
        query.page,
        query.page_size,
    );
    let page = state
        .sales_cache
        .get_or_load(key, || async move { source.fetch_sales(&query).await })
        .await?;

    Ok(ApiResponse::ok(page))
}

/// Sales grouped by menu item over a date range
pub async fn sales_summary(
    State(state): State<AppState>,
    _auth: AuthSession,
    ApiQuery(params): ApiQuery<SalesParams>,
) -> Result<ApiResponse<SalesSummaryResponse>> {
    let source = state.sales()?;
    let (start, end) = date_range(&params)?;

    let items = collect_sales(
        source.as_ref(),
        start,
        end,
        page_size(&state, params.page_size),
        state.config.toast.max_summary_pages,
    )
    .await?;

    let summary = summarize_sales(&items);
    let total_revenue = summary.iter().map(|s| s.revenue).sum();
    let total_quantity = summary.iter().map(|s| s.quantity).sum();

    tracing::debug!(%start, %end, items = items.len(), menu_items = summary.len(), "Sales summary built");

    Ok(ApiResponse::ok(SalesSummaryResponse {
        start_date: start,
        end_date: end,
        total_revenue,
        total_quantity,
        items: summary,
    }))
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use noe_common::{
        errors::Result,
        models::{SalesPage, ToastConnection, ToastSalesItem},
        toast::{SalesQuery, SalesSource},
    };
    use noe_common::db::MemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Two pages: a full first page and a short second page
    struct FakeSales;

    fn item(order: &str, name: &str, quantity: f64, price: f64) -> ToastSalesItem {
        ToastSalesItem {
            guid: format!("{order}-{name}"),
            order_guid: order.to_string(),
            menu_item_guid: None,
            item_name: name.to_string(),
            quantity,
            price,
            business_date: Some("20240115".into()),
        }
    }

    #[async_trait]
    impl SalesSource for FakeSales {
        async fn fetch_sales(&self, query: &SalesQuery) -> Result<SalesPage> {
            let (items, has_more) = match query.page {
                1 => (
                    vec![item("o1", "Salmon Nigiri", 2.0, 9.0), item("o2", "Miso Soup", 1.0, 3.5)],
                    true,
                ),
                _ => (vec![item("o3", "Salmon Nigiri", 1.0, 4.5)], false),
            };
            Ok(SalesPage {
                order_count: items.len(),
                items,
                page: query.page,
                page_size: query.page_size,
                has_more,
            })
        }

        async fn test_connection(&self) -> ToastConnection {
            ToastConnection {
                api_base: "http://toast.test".into(),
                restaurant_guid: "rest".into(),
                connected: true,
                error: None,
            }
        }
    }

    fn state_with_toast() -> crate::AppState {
        let mut state = test_state();
        state.sales = Some(Arc::new(FakeSales));
        state
    }

    #[tokio::test]
    async fn test_sales_page_passthrough() {
        let app = app(state_with_toast());
        let token = login(&app).await;

        let (status, body) = send(
            &app,
            "GET",
            "/api/toast/sales?startDate=2024-01-15&endDate=2024-01-15&page=1&pageSize=2",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["page"], 1);
        assert_eq!(body["data"]["pageSize"], 2);
        assert_eq!(body["data"]["hasMore"], true);
        assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_summary_walks_pages() {
        let app = app(state_with_toast());
        let token = login(&app).await;

        let (status, body) = send(
            &app,
            "GET",
            "/api/toast/sales/summary?startDate=2024-01-15&endDate=2024-01-15",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let items = body["data"]["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["itemName"], "Salmon Nigiri");
        assert_eq!(items[0]["quantity"], 3.0);
        assert_eq!(items[0]["revenue"], 13.5);
        assert_eq!(items[0]["orderCount"], 2);
        assert_eq!(body["data"]["totalRevenue"], 17.0);
    }

    /// Always reports another page
    #[derive(Default)]
    struct EndlessSales {
        fetches: AtomicU32,
    }

    #[async_trait]
    impl SalesSource for EndlessSales {
        async fn fetch_sales(&self, query: &SalesQuery) -> Result<SalesPage> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(SalesPage {
                items: vec![item(&format!("o{}", query.page), "Edamame", 1.0, 4.0)],
                order_count: 1,
                page: query.page,
                page_size: query.page_size,
                has_more: true,
            })
        }

        async fn test_connection(&self) -> ToastConnection {
            FakeSales.test_connection().await
        }
    }

    #[tokio::test]
    async fn test_summary_stops_at_page_limit() {
        let mut config = test_config();
        config.toast.max_summary_pages = 3;
        let sales = Arc::new(EndlessSales::default());
        let mut state = crate::AppState::new(config, Arc::new(MemoryStore::new())).unwrap();
        state.sales = Some(sales.clone());
        let app = app(state);
        let token = login(&app).await;

        let (status, body) = send(
            &app,
            "GET",
            "/api/toast/sales/summary?startDate=2024-01-15&endDate=2024-01-16&pageSize=1",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["totalQuantity"], 3.0);
        assert_eq!(body["data"]["items"][0]["orderCount"], 3);
        assert_eq!(sales.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_bad_dates_rejected() {
        let app = app(state_with_toast());
        let token = login(&app).await;

        let (status, body) =
            send(&app, "GET", "/api/toast/sales?startDate=15/01/2024", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, _) = send(
            &app,
            "GET",
            "/api/toast/sales?startDate=2024-02-01&endDate=2024-01-01",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_status() {
        let app = app(state_with_toast());
        let token = login(&app).await;

        let (status, body) = send(&app, "GET", "/api/toast/status", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["connected"], true);
    }
}
