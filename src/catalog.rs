//! Product catalog query.
//!
//! Read-only view of the remote product list consumed by the order-entry
//! screen. The search term goes to the API; category filtering and
//! pagination are applied client-side on the fetched list, matching the
//! listing screen contract.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::api::{ApiClient, ApiError};

/// Category reference carried on each product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MegaMenuRef {
    #[serde(rename = "_id")]
    pub id: String,
}

/// A sellable product as returned by `GET /api/products`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub pic: Option<String>,
    #[serde(rename = "megaMenu", default)]
    pub mega_menu: Option<MegaMenuRef>,
}

fn percent_encode(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len());
    for b in input.bytes() {
        let is_unreserved =
            b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.' || b == b'~';
        if is_unreserved {
            encoded.push(b as char);
        } else {
            encoded.push_str(&format!("%{b:02X}"));
        }
    }
    encoded
}

/// Parse the `{success, data: Product[]}` listing envelope. Individual
/// malformed entries are skipped with a warning; a missing or non-array
/// `data` field is a contract violation.
pub fn parse_product_listing(resp: &Value) -> Result<Vec<Product>, ApiError> {
    if resp.get("success").and_then(Value::as_bool) == Some(false) {
        let message = resp
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("no message");
        return Err(ApiError::Serialization(format!(
            "product listing reported failure: {message}"
        )));
    }

    let data = resp
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            ApiError::Serialization("product listing response missing data array".to_string())
        })?;

    let mut products = Vec::with_capacity(data.len());
    for entry in data {
        match serde_json::from_value::<Product>(entry.clone()) {
            Ok(p) => products.push(p),
            Err(e) => warn!("skipping malformed product entry: {e}"),
        }
    }
    Ok(products)
}

/// Fetch the product list, optionally filtered by a search term.
pub async fn fetch_products(
    api: &ApiClient,
    search: Option<&str>,
) -> Result<Vec<Product>, ApiError> {
    let path = match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(q) => format!("/api/products?search={}", percent_encode(q)),
        None => "/api/products".to_string(),
    };

    let resp = api.request(Method::GET, &path, None).await?;
    parse_product_listing(&resp)
}

/// Keep only products belonging to the given category.
pub fn filter_by_category<'a>(products: &'a [Product], category_id: &str) -> Vec<&'a Product> {
    products
        .iter()
        .filter(|p| {
            p.mega_menu
                .as_ref()
                .map(|m| m.id == category_id)
                .unwrap_or(false)
        })
        .collect()
}

/// Slice one page out of the product list. Pages are 1-based; an
/// out-of-range page yields an empty slice.
pub fn paginate(products: &[Product], page: usize, per_page: usize) -> &[Product] {
    if per_page == 0 || page == 0 {
        return &[];
    }
    let start = (page - 1).saturating_mul(per_page);
    if start >= products.len() {
        return &[];
    }
    let end = (start + per_page).min(products.len());
    &products[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_product(id: &str, category: &str) -> Value {
        serde_json::json!({
            "_id": id,
            "name": format!("Product {id}"),
            "price": 250.0,
            "description": "House special",
            "type": "main",
            "pic": "https://cdn.example.com/p.jpg",
            "megaMenu": { "_id": category }
        })
    }

    #[test]
    fn test_parse_product_listing() {
        let resp = serde_json::json!({
            "success": true,
            "data": [sample_product("a1", "cat-1"), sample_product("a2", "cat-2")]
        });
        let products = parse_product_listing(&resp).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].id, "a1");
        assert_eq!(products[0].price, 250.0);
        assert_eq!(products[1].mega_menu.as_ref().unwrap().id, "cat-2");
    }

    #[test]
    fn test_parse_skips_malformed_entries() {
        let resp = serde_json::json!({
            "success": true,
            "data": [sample_product("a1", "cat-1"), { "name": 42 }]
        });
        let products = parse_product_listing(&resp).unwrap();
        assert_eq!(products.len(), 1);
    }

    #[test]
    fn test_parse_missing_data_is_contract_violation() {
        let resp = serde_json::json!({ "success": true });
        assert!(matches!(
            parse_product_listing(&resp),
            Err(ApiError::Serialization(_))
        ));
    }

    #[test]
    fn test_filter_by_category() {
        let products: Vec<Product> = parse_product_listing(&serde_json::json!({
            "success": true,
            "data": [
                sample_product("a1", "cat-1"),
                sample_product("a2", "cat-2"),
                sample_product("a3", "cat-1")
            ]
        }))
        .unwrap();

        let filtered = filter_by_category(&products, "cat-1");
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|p| p
            .mega_menu
            .as_ref()
            .is_some_and(|m| m.id == "cat-1")));
    }

    #[test]
    fn test_paginate_bounds() {
        let products: Vec<Product> = (0..5)
            .map(|i| Product {
                id: format!("p{i}"),
                ..Product::default()
            })
            .collect();

        assert_eq!(paginate(&products, 1, 2).len(), 2);
        assert_eq!(paginate(&products, 3, 2).len(), 1);
        assert!(paginate(&products, 4, 2).is_empty());
        assert!(paginate(&products, 0, 2).is_empty());
        assert!(paginate(&products, 1, 0).is_empty());
    }

    #[test]
    fn test_percent_encode() {
        assert_eq!(percent_encode("chicken karahi"), "chicken%20karahi");
        assert_eq!(percent_encode("naan+chai"), "naan%2Bchai");
        assert_eq!(percent_encode("plain-name_1.0~x"), "plain-name_1.0~x");
    }
}
