//! Order draft builder.
//!
//! Turns the cart plus customer details into a submittable draft.
//! Validation is first-failure-wins, one error at a time, surfaced
//! inline next to the offending field by the embedding screen. Cart
//! emptiness is deliberately not validated here: checkout is only
//! offered while the cart is non-empty.

use thiserror::Error;
use uuid::Uuid;

use crate::cart::{Cart, CartLine};
use crate::orders::{OrderItemRequest, OrderRequest};

/// Field-level validation failures, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Customer name is required")]
    MissingCustomerName,
    #[error("Phone number is required")]
    MissingPhoneNumber,
    #[error("Phone number format is not recognized")]
    InvalidPhoneFormat,
}

/// A validated, submittable order. Discarded on successful submission or
/// explicit cancel.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub lines: Vec<CartLine>,
    pub customer_name: String,
    pub phone_number: String,
    pub discount: f64,
    pub is_update: bool,
    pub target_order_id: Option<String>,
}

/// Build a creation draft from the cart and customer fields.
pub fn build(
    cart: &Cart,
    customer_name: &str,
    phone_number: &str,
    discount: f64,
) -> Result<OrderDraft, ValidationError> {
    let name = customer_name.trim();
    if name.is_empty() {
        return Err(ValidationError::MissingCustomerName);
    }

    let phone = phone_number.trim();
    if phone.is_empty() {
        return Err(ValidationError::MissingPhoneNumber);
    }
    if !is_valid_phone(phone) {
        return Err(ValidationError::InvalidPhoneFormat);
    }

    Ok(OrderDraft {
        lines: cart.lines().to_vec(),
        customer_name: name.to_string(),
        phone_number: phone.to_string(),
        discount,
        is_update: false,
        target_order_id: None,
    })
}

/// Build an update-mode draft targeting a previously placed order.
pub fn build_update(
    cart: &Cart,
    customer_name: &str,
    phone_number: &str,
    discount: f64,
    target_order_id: &str,
) -> Result<OrderDraft, ValidationError> {
    let mut draft = build(cart, customer_name, phone_number, discount)?;
    draft.is_update = true;
    draft.target_order_id = Some(target_order_id.to_string());
    Ok(draft)
}

impl OrderDraft {
    /// Wire payload for submission. Unit prices never leave the client;
    /// the server prices the order at creation time.
    pub fn to_request(&self, client_request_id: Option<String>) -> OrderRequest {
        OrderRequest {
            products: self
                .lines
                .iter()
                .map(|line| OrderItemRequest {
                    product: line.product_id.clone(),
                    quantity: line.quantity,
                    is_spicy: line.variant.spicy,
                    size: line.variant.size,
                })
                .collect(),
            customer_name: self.customer_name.clone(),
            phone_number: self.phone_number.clone(),
            discount: self.discount,
            client_request_id,
        }
    }

    /// Same payload with a fresh idempotency key attached.
    pub fn to_keyed_request(&self) -> OrderRequest {
        self.to_request(Some(Uuid::new_v4().to_string()))
    }
}

// ---------------------------------------------------------------------------
// Phone format
// ---------------------------------------------------------------------------

/// Generic international phone shape: an optional `+` country code of
/// one to three digits, then either an unbroken run of seven to fifteen
/// digits, or groups separated by single spaces or dashes: one or two
/// three-digit groups followed by a four-to-seven digit subscriber
/// group.
fn is_valid_phone(phone: &str) -> bool {
    let mut rest = phone.trim();
    let has_plus = rest.starts_with('+');
    if has_plus {
        rest = &rest[1..];
    }

    let groups: Vec<&str> = rest.split([' ', '-']).collect();
    if groups
        .iter()
        .any(|g| g.is_empty() || !g.chars().all(|c| c.is_ascii_digit()))
    {
        return false;
    }

    if groups.len() == 1 {
        return (7..=15).contains(&groups[0].len());
    }

    // With an explicit country code the first group holds 1-3 digits.
    let with_cc = groups[0].len() <= 3 && national_groups_ok(&groups[1..]);
    if has_plus {
        with_cc
    } else {
        with_cc || national_groups_ok(&groups)
    }
}

fn national_groups_ok(groups: &[&str]) -> bool {
    let Some((subscriber, exchanges)) = groups.split_last() else {
        return false;
    };
    if exchanges.is_empty() || exchanges.len() > 2 {
        return false;
    }
    exchanges.iter().all(|g| g.len() == 3) && (4..=7).contains(&subscriber.len())
}
