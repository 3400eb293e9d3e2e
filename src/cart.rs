//! Cart aggregate for the order-entry screen.
//!
//! Line identity is (product, variant): the same product added with a
//! different size or spiciness is a separate line and never merges.
//! Every mutation is mirrored into the local store synchronously before
//! returning, so a reload reconstructs the cart exactly even after an
//! abrupt termination.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::Product;
use crate::db::{self, DbState};

/// Storage key inherited from the web frontend's localStorage contract.
pub const CART_STORE_KEY: &str = "cartItemss";

// ---------------------------------------------------------------------------
// Variant identity
// ---------------------------------------------------------------------------

/// Portion size offered on the order screen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SizeOption {
    #[default]
    Small,
    Medium,
    Large,
    Family,
    Deal,
}

impl SizeOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            SizeOption::Small => "small",
            SizeOption::Medium => "medium",
            SizeOption::Large => "large",
            SizeOption::Family => "family",
            SizeOption::Deal => "deal",
        }
    }
}

/// Variant selection. Part of the cart line identity key, so two lines
/// for the same product with different variants stay distinct.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Variant {
    #[serde(default)]
    pub size: SizeOption,
    #[serde(rename = "isSpicy", default)]
    pub spicy: bool,
}

// ---------------------------------------------------------------------------
// Lines and totals
// ---------------------------------------------------------------------------

/// One cart entry. `unit_price` is copied from the product at add time;
/// later catalog price changes do not affect lines already in the cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLine {
    #[serde(rename = "productId")]
    pub product_id: String,
    pub name: String,
    #[serde(rename = "unitPrice")]
    pub unit_price: f64,
    pub quantity: u32,
    #[serde(flatten)]
    pub variant: Variant,
    #[serde(default)]
    pub image: Option<String>,
}

impl CartLine {
    fn matches(&self, product_id: &str, variant: Variant) -> bool {
        self.product_id == product_id && self.variant == variant
    }

    pub fn line_total(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }
}

/// Derived amounts for display and receipts.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct CartTotals {
    pub subtotal: f64,
    pub discount_amount: f64,
    pub total: f64,
}

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

/// Ordered collection of cart lines, insertion order preserved for
/// display.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Add one unit of `product` in the given variant. An existing line
    /// with the same identity key is incremented; otherwise a new line is
    /// appended with the product's current price captured.
    pub fn add(&mut self, product: &Product, variant: Variant) {
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|l| l.matches(&product.id, variant))
        {
            line.quantity += 1;
            return;
        }

        self.lines.push(CartLine {
            product_id: product.id.clone(),
            name: product.name.clone(),
            unit_price: product.price,
            quantity: 1,
            variant,
            image: product.pic.clone(),
        });
    }

    /// Delete the matching line entirely, regardless of its quantity.
    /// Returns whether a line was removed.
    pub fn remove(&mut self, product_id: &str, variant: Variant) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| !l.matches(product_id, variant));
        self.lines.len() != before
    }

    /// Apply `delta` to the matching line's quantity. A result below 1
    /// leaves the line unchanged; removal is always an explicit action.
    pub fn adjust_quantity(&mut self, product_id: &str, variant: Variant, delta: i32) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.matches(product_id, variant)) {
            let next = line.quantity as i64 + delta as i64;
            if next < 1 {
                return;
            }
            line.quantity = next as u32;
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Compute subtotal, clamped discount, and total. The discount lives
    /// on the order draft, so it is supplied by the caller.
    pub fn totals(&self, discount: f64) -> CartTotals {
        let subtotal: f64 = self.lines.iter().map(CartLine::line_total).sum();
        let discount_amount = discount.max(0.0).min(subtotal);
        CartTotals {
            subtotal,
            discount_amount,
            total: subtotal - discount_amount,
        }
    }
}

// ---------------------------------------------------------------------------
// Persistent store
// ---------------------------------------------------------------------------

/// Cart plus its durable mirror. All mutations go through this type, so
/// durable storage always reflects the last successful in-memory
/// mutation.
pub struct CartStore {
    db: Arc<DbState>,
    cart: Cart,
}

impl CartStore {
    /// Reconstruct the cart from the local store. A missing or corrupt
    /// value yields an empty cart; the entry screen must never fail to
    /// boot over a bad stored blob.
    pub fn load(db: Arc<DbState>) -> Self {
        let cart = match db::kv_get(&db, CART_STORE_KEY) {
            Some(raw) => match serde_json::from_str::<Cart>(&raw) {
                Ok(cart) => cart,
                Err(e) => {
                    warn!(error = %e, "stored cart is corrupt, starting empty");
                    Cart::default()
                }
            },
            None => Cart::default(),
        };

        debug!(lines = cart.line_count(), "cart loaded");
        Self { db, cart }
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn totals(&self, discount: f64) -> CartTotals {
        self.cart.totals(discount)
    }

    fn persist(&self) -> Result<(), String> {
        let raw = serde_json::to_string(&self.cart)
            .map_err(|e| format!("serialize cart: {e}"))?;
        db::kv_put(&self.db, CART_STORE_KEY, &raw)
    }

    pub fn add(&mut self, product: &Product, variant: Variant) -> Result<(), String> {
        self.cart.add(product, variant);
        self.persist()
    }

    pub fn remove(&mut self, product_id: &str, variant: Variant) -> Result<bool, String> {
        let removed = self.cart.remove(product_id, variant);
        self.persist()?;
        Ok(removed)
    }

    pub fn adjust_quantity(
        &mut self,
        product_id: &str,
        variant: Variant,
        delta: i32,
    ) -> Result<(), String> {
        self.cart.adjust_quantity(product_id, variant, delta);
        self.persist()
    }

    /// Empty the cart. Used after a successful submission.
    pub fn clear(&mut self) -> Result<(), String> {
        self.cart.clear();
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn test_db() -> Arc<DbState> {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        crate::db::run_migrations_for_test(&conn);
        Arc::new(DbState {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    fn product(id: &str, price: f64) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            price,
            ..Product::default()
        }
    }

    fn spicy_large() -> Variant {
        Variant {
            size: SizeOption::Large,
            spicy: true,
        }
    }

    #[test]
    fn test_same_identity_merges_into_one_line() {
        let mut cart = Cart::default();
        let p = product("biryani", 350.0);

        cart.add(&p, spicy_large());
        cart.add(&p, spicy_large());

        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.lines()[0].quantity, 2);
    }

    #[test]
    fn test_different_variant_stays_distinct() {
        let mut cart = Cart::default();
        let p = product("biryani", 350.0);

        cart.add(&p, spicy_large());
        cart.add(
            &p,
            Variant {
                size: SizeOption::Large,
                spicy: false,
            },
        );
        cart.add(
            &p,
            Variant {
                size: SizeOption::Family,
                spicy: true,
            },
        );

        assert_eq!(cart.line_count(), 3);
        assert!(cart.lines().iter().all(|l| l.quantity == 1));
    }

    #[test]
    fn test_price_captured_at_add_time() {
        let mut cart = Cart::default();
        let mut p = product("karahi", 900.0);

        cart.add(&p, Variant::default());
        p.price = 1100.0;
        cart.add(&p, spicy_large());

        assert_eq!(cart.lines()[0].unit_price, 900.0);
        assert_eq!(cart.lines()[1].unit_price, 1100.0);
    }

    #[test]
    fn test_quantity_floor() {
        let mut cart = Cart::default();
        let p = product("naan", 60.0);
        cart.add(&p, Variant::default());

        cart.adjust_quantity("naan", Variant::default(), -1);
        assert_eq!(cart.lines()[0].quantity, 1);

        cart.adjust_quantity("naan", Variant::default(), -5);
        assert_eq!(cart.lines()[0].quantity, 1);

        cart.adjust_quantity("naan", Variant::default(), 3);
        assert_eq!(cart.lines()[0].quantity, 4);
        cart.adjust_quantity("naan", Variant::default(), -3);
        assert_eq!(cart.lines()[0].quantity, 1);
    }

    #[test]
    fn test_remove_ignores_quantity() {
        let mut cart = Cart::default();
        let p = product("naan", 60.0);
        cart.add(&p, Variant::default());
        cart.adjust_quantity("naan", Variant::default(), 9);

        assert!(cart.remove("naan", Variant::default()));
        assert!(cart.is_empty());
        assert!(!cart.remove("naan", Variant::default()));
    }

    #[test]
    fn test_totals_invariant() {
        let mut cart = Cart::default();
        cart.add(&product("a", 100.0), Variant::default());
        cart.adjust_quantity("a", Variant::default(), 1);
        cart.add(&product("b", 75.5), spicy_large());

        for discount in [0.0, 50.0, 275.5, 1000.0, -30.0] {
            let t = cart.totals(discount);
            assert!(t.discount_amount >= 0.0);
            assert!(t.discount_amount <= t.subtotal);
            assert_eq!(t.total, t.subtotal - t.discount_amount);
        }
    }

    #[test]
    fn test_discount_clamp() {
        let mut cart = Cart::default();
        cart.add(&product("a", 50.0), Variant::default());

        let t = cart.totals(80.0);
        assert_eq!(t.subtotal, 50.0);
        assert_eq!(t.discount_amount, 50.0);
        assert_eq!(t.total, 0.0);
    }

    #[test]
    fn test_persistence_round_trip() {
        let db = test_db();

        let mut store = CartStore::load(db.clone());
        store.add(&product("a", 120.0), spicy_large()).unwrap();
        store.add(&product("b", 80.0), Variant::default()).unwrap();
        store.adjust_quantity("a", spicy_large(), 2).unwrap();
        let original = store.cart().clone();

        // Fresh store over the same database: simulated reload.
        let reloaded = CartStore::load(db);
        assert_eq!(reloaded.cart(), &original);
        assert_eq!(reloaded.cart().lines()[0].quantity, 3);
    }

    #[test]
    fn test_corrupt_stored_cart_fails_open() {
        let db = test_db();
        db::kv_put(&db, CART_STORE_KEY, "{not json").unwrap();

        let store = CartStore::load(db);
        assert!(store.cart().is_empty());
    }

    #[test]
    fn test_clear_persists_immediately() {
        let db = test_db();
        let mut store = CartStore::load(db.clone());
        store.add(&product("a", 10.0), Variant::default()).unwrap();
        store.clear().unwrap();

        let reloaded = CartStore::load(db);
        assert!(reloaded.cart().is_empty());
    }
}
