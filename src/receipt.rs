//! Receipt rendering.
//!
//! Pure mapping from an order record plus its lines to a printable
//! document. The same path serves fresh online orders, offline
//! placeholders, and historical orders, so every field has a defined
//! fallback. Actually putting the document in front of the customer
//! (print window, spooler) is the job of a [`ReceiptSink`] supplied by
//! the embedding shell.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::orders::OrderRecord;

/// Fallback shown when a server-assigned identifier is absent, e.g. on
/// offline placeholder orders.
pub const MISSING_FIELD_TEXT: &str = "Not Available";

// ---------------------------------------------------------------------------
// Document model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ReceiptItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ReceiptDoc {
    pub order_id: String,
    pub receipt_number: String,
    pub date: String,
    pub status: String,
    pub reference: String,
    #[serde(default)]
    pub items: Vec<ReceiptItem>,
    pub total: f64,
}

/// Header and footer text around the printable body.
#[derive(Debug, Clone)]
pub struct ReceiptConfig {
    pub restaurant_name: String,
    pub address: String,
    pub phone: String,
    pub footer_lines: Vec<String>,
    pub width: usize,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            restaurant_name: "Restaurant Name".to_string(),
            address: "123 Main Street".to_string(),
            phone: "Phone: (123) 456-7890".to_string(),
            footer_lines: vec![
                "Thank you for your order!".to_string(),
                "Note: This is a computer generated receipt.".to_string(),
            ],
            width: 40,
        }
    }
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// Amount formatting: whole amounts print without decimals, fractional
/// amounts with two.
pub fn money(value: f64) -> String {
    if (value.round() - value).abs() < f64::EPSILON {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

fn display_date(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.format("%d/%m/%Y %H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Map an order and its lines to a printable document, applying the
/// defined fallbacks for fields the record lacks.
pub fn build_receipt(order: &OrderRecord, lines: &[CartLine]) -> ReceiptDoc {
    let order_id = order
        .orderid
        .clone()
        .or_else(|| order.id.clone())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| MISSING_FIELD_TEXT.to_string());

    ReceiptDoc {
        order_id,
        receipt_number: order
            .receipt_number
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| MISSING_FIELD_TEXT.to_string()),
        date: order.created_at.clone().unwrap_or_default(),
        status: order.status.clone().unwrap_or_default(),
        reference: order
            .id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| MISSING_FIELD_TEXT.to_string()),
        items: lines
            .iter()
            .map(|line| ReceiptItem {
                name: line.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                total: line.line_total(),
            })
            .collect(),
        total: order.total_amount.unwrap_or(0.0),
    }
}

// ---------------------------------------------------------------------------
// Text layout
// ---------------------------------------------------------------------------

fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let pad = (width - len) / 2;
    format!("{}{}", " ".repeat(pad), text)
}

fn two_col(left: &str, right: &str, width: usize) -> String {
    let used = left.chars().count() + right.chars().count();
    if used >= width {
        return format!("{left} {right}");
    }
    format!("{}{}{}", left, " ".repeat(width - used), right)
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('.');
    out
}

/// Render the document as a fixed-width printable page. The embedding
/// shell hands the result to its print view unchanged.
pub fn render_text(doc: &ReceiptDoc, config: &ReceiptConfig) -> String {
    let width = config.width.max(24);
    let rule = "-".repeat(width);
    let mut out = String::new();

    out.push_str(&center(&config.restaurant_name, width));
    out.push('\n');
    out.push_str(&center(&config.address, width));
    out.push('\n');
    out.push_str(&center(&config.phone, width));
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');

    out.push_str(&format!("Order #: {}\n", doc.order_id));
    out.push_str(&format!("Receipt #: {}\n", doc.receipt_number));
    let date = if doc.date.trim().is_empty() {
        MISSING_FIELD_TEXT.to_string()
    } else {
        display_date(&doc.date)
    };
    out.push_str(&format!("Date: {date}\n"));
    if !doc.status.trim().is_empty() {
        out.push_str(&format!("Status: {}\n", doc.status));
    }
    out.push_str(&format!("Reference: {}\n", doc.reference));
    out.push_str(&rule);
    out.push('\n');

    // Columns: name 17, qty 4, price 8, total 11 (width 40).
    let name_w = width.saturating_sub(23);
    out.push_str(&two_col(
        &format!("{:<name_w$} {:>4} {:>8}", "Item", "Qty", "Price"),
        "Total",
        width,
    ));
    out.push('\n');
    for item in &doc.items {
        let left = format!(
            "{:<name_w$} {:>4} {:>8}",
            truncate(&item.name, name_w),
            item.quantity,
            money(item.unit_price),
        );
        out.push_str(&two_col(&left, &money(item.total), width));
        out.push('\n');
    }
    out.push_str(&rule);
    out.push('\n');

    out.push_str(&two_col(
        "TOTAL",
        &format!("Rs {}", money(doc.total)),
        width,
    ));
    out.push('\n');
    out.push('\n');

    for line in &config.footer_lines {
        out.push_str(&center(line, width));
        out.push('\n');
    }

    out
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// Capability that puts a rendered receipt in front of the user. The
/// core's responsibility ends at producing the content.
pub trait ReceiptSink {
    fn deliver(&self, rendered: &str, doc: &ReceiptDoc) -> Result<(), String>;
}

/// Sink that keeps delivered receipts in memory. Used in tests and as a
/// preview buffer.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub delivered: std::sync::Mutex<Vec<String>>,
}

impl ReceiptSink for MemorySink {
    fn deliver(&self, rendered: &str, _doc: &ReceiptDoc) -> Result<(), String> {
        self.delivered
            .lock()
            .map_err(|e| e.to_string())?
            .push(rendered.to_string());
        Ok(())
    }
}
