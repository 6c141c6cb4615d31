//! Toast POS client
//!
//! Machine-client authentication plus the bulk orders endpoint. Orders are
//! flattened into one `ToastSalesItem` per non-voided check selection.

use crate::config::ToastConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::{SalesPage, ToastConnection, ToastSalesItem};
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Tokens are refreshed this long before Toast says they expire
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

const RESTAURANT_HEADER: &str = "Toast-Restaurant-External-ID";

/// A date range page request; both dates are inclusive business days
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub page: u32,
    pub page_size: u32,
}

impl SalesQuery {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, page: u32, page_size: u32) -> Result<Self> {
        if end_date < start_date {
            return Err(AppError::validation("endDate", "endDate must not be before startDate"));
        }
        if page == 0 {
            return Err(AppError::validation("page", "page starts at 1"));
        }
        if page_size == 0 {
            return Err(AppError::validation("pageSize", "pageSize must be positive"));
        }
        Ok(Self { start_date, end_date, page, page_size })
    }

    /// `startDate`/`endDate` in Toast's timestamp format; the end is exclusive
    fn toast_range(&self) -> (String, String) {
        let end = self
            .end_date
            .checked_add_days(Days::new(1))
            .unwrap_or(self.end_date);
        (toast_timestamp(self.start_date), toast_timestamp(end))
    }
}

fn toast_timestamp(date: NaiveDate) -> String {
    format!("{}T00:00:00.000+0000", date.format("%Y-%m-%d"))
}

/// Source of POS sales
#[async_trait]
pub trait SalesSource: Send + Sync {
    /// One page of sold items
    async fn fetch_sales(&self, query: &SalesQuery) -> Result<SalesPage>;

    /// Connectivity report; failures are carried in the result
    async fn test_connection(&self) -> ToastConnection;
}

/// Every sold item of a range, following pages up to `max_pages`
pub async fn collect_sales(
    source: &dyn SalesSource,
    start_date: NaiveDate,
    end_date: NaiveDate,
    page_size: u32,
    max_pages: u32,
) -> Result<Vec<ToastSalesItem>> {
    let mut items = Vec::new();

    for page in 1..=max_pages.max(1) {
        let query = SalesQuery::new(start_date, end_date, page, page_size)?;
        let result = source.fetch_sales(&query).await?;
        items.extend(result.items);

        if !result.has_more {
            return Ok(items);
        }
    }

    tracing::warn!(max_pages, "Sales summary truncated at page limit");
    Ok(items)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    user_access_type: &'static str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: TokenBody,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenBody {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Order {
    guid: String,
    #[serde(default)]
    business_date: Option<Value>,
    #[serde(default)]
    voided: bool,
    #[serde(default)]
    checks: Vec<Check>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Check {
    #[serde(default)]
    voided: bool,
    #[serde(default)]
    selections: Vec<Selection>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Selection {
    guid: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    quantity: f64,
    #[serde(default)]
    price: f64,
    #[serde(default)]
    voided: bool,
    #[serde(default)]
    item: Option<ItemRef>,
}

#[derive(Deserialize)]
struct ItemRef {
    guid: String,
}

/// Toast sends `businessDate` as a yyyymmdd number
fn business_date(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn flatten_orders(orders: Vec<Order>) -> Vec<ToastSalesItem> {
    let mut items = Vec::new();

    for order in orders.into_iter().filter(|o| !o.voided) {
        let date = business_date(order.business_date.as_ref());
        for check in order.checks.into_iter().filter(|c| !c.voided) {
            for selection in check.selections.into_iter().filter(|s| !s.voided) {
                items.push(ToastSalesItem {
                    guid: selection.guid,
                    order_guid: order.guid.clone(),
                    menu_item_guid: selection.item.map(|i| i.guid),
                    item_name: selection
                        .display_name
                        .unwrap_or_else(|| "Unknown item".to_string()),
                    quantity: selection.quantity,
                    price: selection.price,
                    business_date: date.clone(),
                });
            }
        }
    }

    items
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Toast REST client
pub struct ToastClient {
    client: reqwest::Client,
    api_base: String,
    client_id: String,
    client_secret: String,
    restaurant_guid: String,
    token: Mutex<Option<CachedToken>>,
}

impl ToastClient {
    pub fn new(
        api_base: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        restaurant_guid: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            restaurant_guid: restaurant_guid.into(),
            token: Mutex::new(None),
        })
    }

    /// Build a client when credentials and the restaurant are configured
    pub fn from_config(config: &ToastConfig) -> Result<Option<Self>> {
        match (&config.client_id, &config.client_secret, &config.restaurant_guid) {
            (Some(id), Some(secret), Some(guid)) => Ok(Some(Self::new(
                config.api_base.as_str(),
                id.as_str(),
                secret.as_str(),
                guid.as_str(),
                Duration::from_secs(config.timeout_secs),
            )?)),
            _ => Ok(None),
        }
    }

    /// A valid access token, logging in when the cached one is near expiry
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| Instant::now() < t.refresh_at) {
            return Ok(token.value.clone());
        }

        let start = Instant::now();
        let result = self.login().await;
        metrics::record_upstream("toast", "login", start.elapsed().as_secs_f64(), result.is_ok());
        let body = result?;

        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        *cached = Some(CachedToken {
            value: body.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        tracing::info!(expires_in = body.expires_in, "Authenticated with Toast");
        Ok(body.access_token)
    }

    async fn login(&self) -> Result<TokenBody> {
        let response = self
            .client
            .post(format!("{}/authentication/v1/authentication/login", self.api_base))
            .json(&LoginRequest {
                client_id: &self.client_id,
                client_secret: &self.client_secret,
                user_access_type: "TOAST_MACHINE_CLIENT",
            })
            .send()
            .await
            .map_err(|e| AppError::Toast {
                message: format!("Login request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Toast {
                message: format!("Login rejected ({}): {}", status, body),
            });
        }

        let login: LoginResponse = response.json().await.map_err(|e| AppError::Toast {
            message: format!("Failed to parse login response: {}", e),
        })?;
        Ok(login.token)
    }

    async fn fetch_orders(&self, query: &SalesQuery) -> Result<Vec<Order>> {
        let token = self.access_token().await?;
        let (start, end) = query.toast_range();

        let response = self
            .client
            .get(format!("{}/orders/v2/ordersBulk", self.api_base))
            .bearer_auth(token)
            .header(RESTAURANT_HEADER, &self.restaurant_guid)
            .query(&[
                ("startDate", start),
                ("endDate", end),
                ("page", query.page.to_string()),
                ("pageSize", query.page_size.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Toast {
                message: format!("Orders request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Toast {
                message: format!("Orders request returned {}: {}", status, body),
            });
        }

        response.json().await.map_err(|e| AppError::Toast {
            message: format!("Failed to parse orders: {}", e),
        })
    }
}

#[async_trait]
impl SalesSource for ToastClient {
    async fn fetch_sales(&self, query: &SalesQuery) -> Result<SalesPage> {
        let start = Instant::now();
        let result = self.fetch_orders(query).await;
        metrics::record_upstream("toast", "orders_bulk", start.elapsed().as_secs_f64(), result.is_ok());

        let orders = result.map_err(|e| {
            tracing::warn!(error = %e, page = query.page, "Toast orders fetch failed");
            e
        })?;

        let order_count = orders.len();
        let has_more = order_count as u64 >= u64::from(query.page_size);
        let items = flatten_orders(orders);

        tracing::debug!(page = query.page, order_count, items = items.len(), "Fetched Toast orders");

        Ok(SalesPage {
            items,
            page: query.page,
            page_size: query.page_size,
            order_count,
            has_more,
        })
    }

    async fn test_connection(&self) -> ToastConnection {
        let error = self.access_token().await.err().map(|e| e.to_string());
        ToastConnection {
            api_base: self.api_base.clone(),
            restaurant_guid: self.restaurant_guid.clone(),
            connected: error.is_none(),
            error,
        }
    }
}
