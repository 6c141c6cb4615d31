//! Shapes exchanged with Odoo and Toast

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A purchasable product as seen by Odoo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OdooProduct {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_code: Option<String>,
    #[serde(default)]
    pub list_price: f64,
    /// Cost price; this is what recipe ingredients are priced at
    #[serde(default)]
    pub standard_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uom_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
}

/// Outcome of an Odoo connectivity check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OdooConnection {
    pub url: String,
    pub database: String,
    pub username: String,
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a Toast connectivity check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToastConnection {
    pub api_base: String,
    pub restaurant_guid: String,
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One sold line of a Toast check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToastSalesItem {
    pub guid: String,
    pub order_guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu_item_guid: Option<String>,
    pub item_name: String,
    pub quantity: f64,
    /// Line total
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_date: Option<String>,
}

/// A page of sales items, with Toast's page/pageSize passed through
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesPage {
    pub items: Vec<ToastSalesItem>,
    pub page: u32,
    pub page_size: u32,
    pub order_count: usize,
    pub has_more: bool,
}

/// Sales of one menu item over a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub item_name: String,
    pub quantity: f64,
    pub revenue: f64,
    pub order_count: usize,
}

/// Group sales items by item name, highest revenue first
pub fn summarize_sales(items: &[ToastSalesItem]) -> Vec<SalesSummary> {
    let mut groups: HashMap<&str, (f64, f64, HashSet<&str>)> = HashMap::new();

    for item in items {
        let entry = groups
            .entry(item.item_name.as_str())
            .or_insert_with(|| (0.0, 0.0, HashSet::new()));
        entry.0 += item.quantity;
        entry.1 += item.price;
        entry.2.insert(item.order_guid.as_str());
    }

    let mut summary: Vec<SalesSummary> = groups
        .into_iter()
        .map(|(name, (quantity, revenue, orders))| SalesSummary {
            item_name: name.to_string(),
            quantity,
            revenue,
            order_count: orders.len(),
        })
        .collect();

    summary.sort_by(|a, b| {
        b.revenue
            .partial_cmp(&a.revenue)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.item_name.cmp(&b.item_name))
    });
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(order: &str, name: &str, quantity: f64, price: f64) -> ToastSalesItem {
        ToastSalesItem {
            guid: format!("{}-{}", order, name),
            order_guid: order.to_string(),
            menu_item_guid: None,
            item_name: name.to_string(),
            quantity,
            price,
            business_date: Some("20240105".into()),
        }
    }

    #[test]
    fn test_summarize_groups_by_name() {
        let items = vec![
            item("o1", "Salmon Nigiri", 2.0, 12.0),
            item("o1", "Miso Soup", 1.0, 4.0),
            item("o2", "Salmon Nigiri", 1.0, 6.0),
            item("o2", "Salmon Nigiri", 1.0, 6.0),
        ];
        let summary = summarize_sales(&items);

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].item_name, "Salmon Nigiri");
        assert_eq!(summary[0].quantity, 4.0);
        assert_eq!(summary[0].revenue, 24.0);
        assert_eq!(summary[0].order_count, 2);
        assert_eq!(summary[1].item_name, "Miso Soup");
    }

    #[test]
    fn test_summarize_empty() {
        assert!(summarize_sales(&[]).is_empty());
    }

    #[test]
    fn test_odoo_product_camel_case() {
        let product = OdooProduct {
            id: 7,
            name: "Nori Sheets".into(),
            default_code: None,
            list_price: 0.0,
            standard_price: 0.12,
            uom_name: Some("Units".into()),
            category_name: None,
        };
        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["standardPrice"], 0.12);
        assert!(json.get("defaultCode").is_none());
    }
}
