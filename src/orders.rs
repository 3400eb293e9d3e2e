//! Order endpoint wire types.
//!
//! Request bodies for `POST /api/orders` / `PUT /api/orders/:id` and the
//! tolerant parsing of order records out of their responses. The
//! `OrderEndpoint` trait is the seam the checkout orchestrator and sync
//! engine submit through, so tests can substitute a recording fake for
//! the real HTTP client.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::api::{ApiClient, ApiError};
use crate::cart::{Cart, SizeOption, Variant};
use crate::catalog::Product;

// ---------------------------------------------------------------------------
// Request shapes
// ---------------------------------------------------------------------------

/// One order line on the wire. Price is intentionally absent: the server
/// is the source of truth for pricing at order-creation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItemRequest {
    pub product: String,
    pub quantity: u32,
    #[serde(rename = "isSpicy")]
    pub is_spicy: bool,
    pub size: SizeOption,
}

/// Body for order creation and update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub products: Vec<OrderItemRequest>,
    pub customer_name: String,
    pub phone_number: String,
    pub discount: f64,
    /// Client-generated idempotency key. A queued order replayed after an
    /// ambiguous failure carries the same key, so an idempotent server
    /// cannot create a duplicate.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub client_request_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

/// An order record as returned by the API. Every field is optional;
/// offline placeholders and historical orders lack parts of it, and the
/// receipt renderer defines the fallbacks.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderRecord {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub orderid: Option<String>,
    pub receipt_number: Option<String>,
    pub total_amount: Option<f64>,
    pub status: Option<String>,
    pub created_at: Option<String>,
    pub customer_name: Option<String>,
    pub phone_number: Option<String>,
    pub discount: Option<f64>,
}

fn looks_like_order(value: &Value) -> bool {
    value.is_object()
        && ["orderid", "_id", "totalAmount", "status", "createdAt"]
            .iter()
            .any(|k| value.get(k).is_some())
}

/// Extract an order record from a creation/update response. The API
/// returns either `{success, data: Order}` or the order fields at the
/// top level; anything else is a contract violation.
pub fn parse_order_response(resp: &Value) -> Result<OrderRecord, ApiError> {
    let candidate = match resp.get("data") {
        Some(data) if looks_like_order(data) => data,
        _ if looks_like_order(resp) => resp,
        _ => {
            return Err(ApiError::Serialization(
                "order response carries no recognizable order record".to_string(),
            ));
        }
    };

    serde_json::from_value(candidate.clone())
        .map_err(|e| ApiError::Serialization(format!("order record: {e}")))
}

/// One line of a fetched order, for update-mode pre-population. The
/// product arrives nested so its current name, price, and image are
/// available to rebuild the cart.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemDetail {
    pub product: Product,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(rename = "isSpicy", default)]
    pub is_spicy: bool,
    #[serde(default)]
    pub size: SizeOption,
}

fn default_quantity() -> u32 {
    1
}

/// Rebuild a cart from a fetched order's lines. Unit prices come from
/// the nested product records at load time.
pub fn cart_from_order_items(items: &[OrderItemDetail]) -> Cart {
    let mut cart = Cart::default();
    for item in items {
        let variant = Variant {
            size: item.size,
            spicy: item.is_spicy,
        };
        cart.add(&item.product, variant);
        if item.quantity > 1 {
            cart.adjust_quantity(&item.product.id, variant, item.quantity as i32 - 1);
        }
    }
    cart
}

// ---------------------------------------------------------------------------
// Endpoint seam
// ---------------------------------------------------------------------------

/// Remote order-creation endpoint. Implemented by [`ApiClient`]; tests
/// substitute recording fakes.
#[allow(async_fn_in_trait)]
pub trait OrderEndpoint {
    /// POST the request to the order-creation endpoint.
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderRecord, ApiError>;

    /// PUT the request over an existing order (update-mode checkout).
    async fn update_order(
        &self,
        order_id: &str,
        request: &OrderRequest,
    ) -> Result<OrderRecord, ApiError>;
}

impl OrderEndpoint for ApiClient {
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderRecord, ApiError> {
        let body = serde_json::to_value(request)
            .map_err(|e| ApiError::Serialization(format!("serialize order request: {e}")))?;
        let resp = self.request(Method::POST, "/api/orders", Some(&body)).await?;
        parse_order_response(&resp)
    }

    async fn update_order(
        &self,
        order_id: &str,
        request: &OrderRequest,
    ) -> Result<OrderRecord, ApiError> {
        let body = serde_json::to_value(request)
            .map_err(|e| ApiError::Serialization(format!("serialize order request: {e}")))?;
        let path = format!("/api/orders/{order_id}");
        let resp = self.request(Method::PUT, &path, Some(&body)).await?;
        parse_order_response(&resp)
    }
}

/// Fetch an existing order with its lines, for update-mode checkout.
pub async fn fetch_order(
    api: &ApiClient,
    order_id: &str,
) -> Result<(OrderRecord, Vec<OrderItemDetail>), ApiError> {
    let path = format!("/api/orders/{order_id}");
    let resp = api.request(Method::GET, &path, None).await?;
    let record = parse_order_response(&resp)?;

    let products = resp
        .get("data")
        .unwrap_or(&resp)
        .get("products")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut items = Vec::with_capacity(products.len());
    for entry in products {
        match serde_json::from_value::<OrderItemDetail>(entry) {
            Ok(item) => items.push(item),
            Err(e) => warn!(order_id, "skipping malformed order line: {e}"),
        }
    }

    Ok((record, items))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_request_wire_shape() {
        let request = OrderRequest {
            products: vec![OrderItemRequest {
                product: "prod-a".to_string(),
                quantity: 2,
                is_spicy: false,
                size: SizeOption::Small,
            }],
            customer_name: "Ali".to_string(),
            phone_number: "+92 300 1234567".to_string(),
            discount: 0.0,
            client_request_id: None,
        };

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "products": [{
                    "product": "prod-a",
                    "quantity": 2,
                    "isSpicy": false,
                    "size": "small"
                }],
                "customerName": "Ali",
                "phoneNumber": "+92 300 1234567",
                "discount": 0.0
            })
        );
    }

    #[test]
    fn test_parse_order_response_envelope() {
        let resp = serde_json::json!({
            "success": true,
            "data": {
                "orderid": "ORD-1042",
                "totalAmount": 700.0,
                "status": "pending",
                "createdAt": "2026-08-08T10:00:00Z"
            }
        });

        let record = parse_order_response(&resp).unwrap();
        assert_eq!(record.orderid.as_deref(), Some("ORD-1042"));
        assert_eq!(record.total_amount, Some(700.0));
    }

    #[test]
    fn test_parse_order_response_top_level() {
        let resp = serde_json::json!({
            "_id": "64ffab",
            "orderid": "ORD-7",
            "totalAmount": 120.5,
            "status": "completed"
        });

        let record = parse_order_response(&resp).unwrap();
        assert_eq!(record.id.as_deref(), Some("64ffab"));
        assert_eq!(record.status.as_deref(), Some("completed"));
    }

    #[test]
    fn test_parse_order_response_shape_mismatch() {
        let resp = serde_json::json!({ "success": true, "data": "created" });
        assert!(matches!(
            parse_order_response(&resp),
            Err(ApiError::Serialization(_))
        ));
    }

    #[test]
    fn test_cart_from_order_items() {
        let items: Vec<OrderItemDetail> = serde_json::from_value(serde_json::json!([
            {
                "product": { "_id": "p1", "name": "Seekh Kebab", "price": 150.0 },
                "quantity": 3,
                "isSpicy": true,
                "size": "large"
            },
            {
                "product": { "_id": "p2", "name": "Raita", "price": 40.0 }
            }
        ]))
        .unwrap();

        let cart = cart_from_order_items(&items);
        assert_eq!(cart.line_count(), 2);
        assert_eq!(cart.lines()[0].quantity, 3);
        assert_eq!(cart.lines()[0].unit_price, 150.0);
        assert!(cart.lines()[0].variant.spicy);
        assert_eq!(cart.lines()[1].quantity, 1);
    }
}
