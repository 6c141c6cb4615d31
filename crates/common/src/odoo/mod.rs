//! Odoo ERP client
//!
//! Talks JSON-RPC to `POST {url}/jsonrpc`. Products are read from
//! `product.product`; their cost price (`standard_price`) prices ingredients.

use crate::config::OdooConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::{OdooConnection, OdooProduct};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const PRODUCT_FIELDS: &[&str] = &[
    "id",
    "name",
    "default_code",
    "list_price",
    "standard_price",
    "uom_id",
    "categ_id",
];

/// Source of ingredient prices
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Products whose name contains `query` (case-insensitive)
    async fn search_products(&self, query: &str, limit: u32) -> Result<Vec<OdooProduct>>;

    /// Connectivity report; failures are carried in the result
    async fn test_connection(&self) -> OdooConnection;
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: RpcParams<'a>,
    id: u64,
}

#[derive(Serialize)]
struct RpcParams<'a> {
    service: &'a str,
    method: &'a str,
    args: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<RpcErrorData>,
}

#[derive(Deserialize)]
struct RpcErrorData {
    #[serde(default)]
    message: Option<String>,
}

impl RpcError {
    fn into_message(self) -> String {
        self.data
            .and_then(|d| d.message)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.message)
    }
}

/// `product.product` record as Odoo returns it
#[derive(Deserialize)]
struct ProductRecord {
    id: i64,
    name: String,
    #[serde(default, deserialize_with = "false_as_none")]
    default_code: Option<String>,
    #[serde(default)]
    list_price: f64,
    #[serde(default)]
    standard_price: f64,
    #[serde(default, deserialize_with = "many2one_name")]
    uom_id: Option<String>,
    #[serde(default, deserialize_with = "many2one_name")]
    categ_id: Option<String>,
}

impl From<ProductRecord> for OdooProduct {
    fn from(record: ProductRecord) -> Self {
        OdooProduct {
            id: record.id,
            name: record.name,
            default_code: record.default_code,
            list_price: record.list_price,
            standard_price: record.standard_price,
            uom_name: record.uom_id,
            category_name: record.categ_id,
        }
    }
}

/// Odoo sends `false` for empty char fields
fn false_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    })
}

/// Many2one fields arrive as `[id, "display name"]` or `false`
fn many2one_name<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(pair) => pair.get(1).and_then(Value::as_str).map(String::from),
        _ => None,
    })
}

/// JSON-RPC Odoo client
pub struct OdooClient {
    client: reqwest::Client,
    url: String,
    database: String,
    username: String,
    api_key: String,
    uid: Mutex<Option<i64>>,
    next_id: AtomicU64,
}

impl OdooClient {
    pub fn new(
        url: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.into().trim_end_matches('/').to_string(),
            database: database.into(),
            username: username.into(),
            api_key: api_key.into(),
            uid: Mutex::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    /// Build a client when all connection settings are present
    pub fn from_config(config: &OdooConfig) -> Result<Option<Self>> {
        match (&config.url, &config.database, &config.username, &config.api_key) {
            (Some(url), Some(database), Some(username), Some(api_key)) => Ok(Some(Self::new(
                url.as_str(),
                database.as_str(),
                username.as_str(),
                api_key.as_str(),
                Duration::from_secs(config.timeout_secs),
            )?)),
            _ => Ok(None),
        }
    }

    async fn call(&self, service: &str, method: &str, args: Value) -> Result<Value> {
        let start = Instant::now();
        let result = self.send(service, method, args).await;
        metrics::record_upstream("odoo", method, start.elapsed().as_secs_f64(), result.is_ok());

        if let Err(e) = &result {
            tracing::warn!(service, method, error = %e, "Odoo call failed");
        }
        result
    }

    async fn send(&self, service: &str, method: &str, args: Value) -> Result<Value> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method: "call",
            params: RpcParams { service, method, args },
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let response = self
            .client
            .post(format!("{}/jsonrpc", self.url))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Odoo {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Odoo {
                message: format!("HTTP {}: {}", status, body),
            });
        }

        let rpc: RpcResponse = response.json().await.map_err(|e| AppError::Odoo {
            message: format!("Failed to parse response: {}", e),
        })?;

        if let Some(error) = rpc.error {
            return Err(AppError::Odoo {
                message: error.into_message(),
            });
        }

        Ok(rpc.result.unwrap_or(Value::Null))
    }

    /// Server version string from `common.version`
    pub async fn version(&self) -> Result<String> {
        let result = self.call("common", "version", json!([])).await?;
        Ok(result
            .get("server_version")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string())
    }

    /// Log in and cache the uid
    pub async fn authenticate(&self) -> Result<i64> {
        let mut cached = self.uid.lock().await;
        if let Some(uid) = *cached {
            return Ok(uid);
        }

        let result = self
            .call(
                "common",
                "login",
                json!([self.database, self.username, self.api_key]),
            )
            .await?;

        let uid = result.as_i64().ok_or_else(|| AppError::Odoo {
            message: "Authentication failed: invalid database, username or API key".to_string(),
        })?;

        tracing::info!(uid, database = %self.database, "Authenticated with Odoo");
        *cached = Some(uid);
        Ok(uid)
    }
}

#[async_trait]
impl ProductCatalog for OdooClient {
    async fn search_products(&self, query: &str, limit: u32) -> Result<Vec<OdooProduct>> {
        let uid = self.authenticate().await?;

        let query = query.trim();
        let domain = if query.is_empty() {
            json!([])
        } else {
            json!([["name", "ilike", query]])
        };

        let result = self
            .call(
                "object",
                "execute_kw",
                json!([
                    self.database,
                    uid,
                    self.api_key,
                    "product.product",
                    "search_read",
                    [domain],
                    { "fields": PRODUCT_FIELDS, "limit": limit }
                ]),
            )
            .await?;

        let records: Vec<ProductRecord> = serde_json::from_value(result).map_err(|e| AppError::Odoo {
            message: format!("Unexpected product payload: {}", e),
        })?;

        tracing::debug!(query, count = records.len(), "Odoo product search");
        Ok(records.into_iter().map(OdooProduct::from).collect())
    }

    async fn test_connection(&self) -> OdooConnection {
        let mut connection = OdooConnection {
            url: self.url.clone(),
            database: self.database.clone(),
            username: self.username.clone(),
            connected: false,
            uid: None,
            server_version: None,
            error: None,
        };

        match self.version().await {
            Ok(version) => connection.server_version = Some(version),
            Err(e) => {
                connection.error = Some(e.to_string());
                return connection;
            }
        }

        match self.authenticate().await {
            Ok(uid) => {
                connection.uid = Some(uid);
                connection.connected = true;
            }
            Err(e) => connection.error = Some(e.to_string()),
        }

        connection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    /// Minimal Odoo stand-in answering version/login/search_read
    async fn spawn_odoo(accept_login: bool, logins: Arc<AtomicUsize>) -> String {
        let app = Router::new().route(
            "/jsonrpc",
            post(move |Json(body): Json<Value>| {
                let logins = logins.clone();
                async move {
                    let id = body["id"].clone();
                    let method = body["params"]["method"].as_str().unwrap_or_default().to_string();
                    let result = match method.as_str() {
                        "version" => json!({ "server_version": "17.0" }),
                        "login" => {
                            logins.fetch_add(1, Ordering::SeqCst);
                            if accept_login { json!(7) } else { json!(false) }
                        }
                        "execute_kw" => {
                            let domain = &body["params"]["args"][5][0];
                            if domain.as_array().map_or(true, |d| d.is_empty()) {
                                return Json(json!({
                                    "jsonrpc": "2.0",
                                    "id": id,
                                    "error": {
                                        "code": 200,
                                        "message": "Odoo Server Error",
                                        "data": { "message": "empty domain not allowed here" }
                                    }
                                }));
                            }
                            json!([
                                {
                                    "id": 11,
                                    "name": "Salmon Fillet",
                                    "default_code": false,
                                    "list_price": 0.0,
                                    "standard_price": 11.5,
                                    "uom_id": [3, "lb"],
                                    "categ_id": [5, "Seafood"]
                                },
                                {
                                    "id": 12,
                                    "name": "Smoked Salmon",
                                    "default_code": "SM-01",
                                    "list_price": 18.0,
                                    "standard_price": 14.25,
                                    "uom_id": false,
                                    "categ_id": false
                                }
                            ])
                        }
                        _ => Value::Null,
                    };
                    Json(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(url: &str) -> OdooClient {
        OdooClient::new(url, "noe", "ops@noe.test", "key", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_from_config_requires_all_settings() {
        let mut config = OdooConfig::default();
        assert!(OdooClient::from_config(&config).unwrap().is_none());

        config.url = Some("https://erp.noe.test/".into());
        config.database = Some("noe".into());
        config.username = Some("ops".into());
        config.api_key = Some("secret".into());
        let client = OdooClient::from_config(&config).unwrap().unwrap();
        assert_eq!(client.url, "https://erp.noe.test");
    }

    #[test]
    fn test_product_record_decoding() {
        let record: ProductRecord = serde_json::from_value(json!({
            "id": 1,
            "name": "Nori",
            "default_code": false,
            "standard_price": 0.12,
            "uom_id": [1, "Units"],
            "categ_id": false
        }))
        .unwrap();

        let product = OdooProduct::from(record);
        assert_eq!(product.default_code, None);
        assert_eq!(product.uom_name.as_deref(), Some("Units"));
        assert_eq!(product.category_name, None);
        assert_eq!(product.list_price, 0.0);
    }

    #[tokio::test]
    async fn test_search_products_caches_uid() {
        let logins = Arc::new(AtomicUsize::new(0));
        let url = spawn_odoo(true, logins.clone()).await;
        let odoo = client(&url);

        let products = odoo.search_products("salmon", 10).await.unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].uom_name.as_deref(), Some("lb"));
        assert_eq!(products[1].default_code.as_deref(), Some("SM-01"));

        odoo.search_products("salmon", 10).await.unwrap();
        assert_eq!(logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rpc_error_carries_odoo_message() {
        let url = spawn_odoo(true, Arc::new(AtomicUsize::new(0))).await;
        let err = client(&url).search_products("  ", 10).await.unwrap_err();
        match err {
            AppError::Odoo { message } => assert_eq!(message, "empty domain not allowed here"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_reports_rejected_login() {
        let url = spawn_odoo(false, Arc::new(AtomicUsize::new(0))).await;
        let connection = client(&url).test_connection().await;
        assert!(!connection.connected);
        assert_eq!(connection.server_version.as_deref(), Some("17.0"));
        assert!(connection.error.unwrap().contains("Authentication failed"));
    }

    #[tokio::test]
    async fn test_connection_success() {
        let url = spawn_odoo(true, Arc::new(AtomicUsize::new(0))).await;
        let connection = client(&url).test_connection().await;
        assert!(connection.connected);
        assert_eq!(connection.uid, Some(7));
        assert!(connection.error.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let connection = client("http://127.0.0.1:1").test_connection().await;
        assert!(!connection.connected);
        assert!(connection.error.is_some());
    }
}
