//! Checkout orchestrator.
//!
//! Coordinates order submission: the online path POSTs (or PUTs, in
//! update mode) the draft and renders a receipt from the server's
//! record; the offline path enqueues the draft, synthesizes a local
//! placeholder order, and renders a receipt from that; it never blocks
//! on the network and always succeeds locally. The cart is cleared only
//! after a submission succeeds; a failed online submission leaves cart
//! and customer fields untouched so the user can retry.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::ApiError;
use crate::cart::CartStore;
use crate::connectivity::ConnectivityMonitor;
use crate::db::DbState;
use crate::draft::{self, OrderDraft, ValidationError};
use crate::orders::{OrderEndpoint, OrderRecord};
use crate::queue;
use crate::receipt::{self, ReceiptSink};

/// Tag prefix distinguishing locally synthesized order ids from
/// server-assigned ones.
pub const OFFLINE_ORDER_PREFIX: &str = "offline-";

/// Status shown on receipts for orders that still await sync.
pub const OFFLINE_ORDER_STATUS: &str = "Pending (Offline)";

// ---------------------------------------------------------------------------
// Errors and inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Cannot check out with an empty cart")]
    EmptyCart,

    /// A submission is already in flight; double-clicks must not create
    /// duplicate orders.
    #[error("A submission is already in progress")]
    SubmitInProgress,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{0}")]
    Storage(String),
}

/// Customer fields collected by the checkout form.
#[derive(Debug, Clone, Default)]
pub struct CustomerInfo {
    pub customer_name: String,
    pub phone_number: String,
    pub discount: f64,
}

/// Result of a successful submission.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub order: OrderRecord,
    /// True when the order was queued locally instead of sent; it will
    /// sync on the next reconnect.
    pub queued_offline: bool,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct CheckoutOrchestrator {
    submitting: AtomicBool,
}

impl CheckoutOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    /// Gate for the customer-info collection step. Checkout is only
    /// offered while the cart is non-empty, independent of connectivity.
    pub fn start_checkout(&self, cart_store: &CartStore) -> Result<(), CheckoutError> {
        if cart_store.cart().is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        Ok(())
    }

    /// Submit the current cart with the entered customer fields. Pass
    /// `target_order_id` when editing a previously placed order; that
    /// routes to an update-in-place submission.
    #[allow(clippy::too_many_arguments)]
    pub async fn submit_order<E: OrderEndpoint, S: ReceiptSink>(
        &self,
        db: &DbState,
        cart_store: &mut CartStore,
        monitor: &ConnectivityMonitor,
        endpoint: &E,
        sink: &S,
        customer: &CustomerInfo,
        target_order_id: Option<&str>,
    ) -> Result<SubmitOutcome, CheckoutError> {
        if self.submitting.swap(true, Ordering::SeqCst) {
            return Err(CheckoutError::SubmitInProgress);
        }

        let result = self
            .submit_inner(db, cart_store, monitor, endpoint, sink, customer, target_order_id)
            .await;
        self.submitting.store(false, Ordering::SeqCst);
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn submit_inner<E: OrderEndpoint, S: ReceiptSink>(
        &self,
        db: &DbState,
        cart_store: &mut CartStore,
        monitor: &ConnectivityMonitor,
        endpoint: &E,
        sink: &S,
        customer: &CustomerInfo,
        target_order_id: Option<&str>,
    ) -> Result<SubmitOutcome, CheckoutError> {
        if cart_store.cart().is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let draft = match target_order_id {
            Some(order_id) => draft::build_update(
                cart_store.cart(),
                &customer.customer_name,
                &customer.phone_number,
                customer.discount,
                order_id,
            )?,
            None => draft::build(
                cart_store.cart(),
                &customer.customer_name,
                &customer.phone_number,
                customer.discount,
            )?,
        };

        if monitor.is_online() {
            self.submit_online(cart_store, endpoint, sink, &draft).await
        } else {
            self.submit_offline(db, cart_store, sink, &draft)
        }
    }

    /// Offline path: queue the real request, hand the user a receipt
    /// built from a local placeholder, clear the cart. Never touches the
    /// network.
    fn submit_offline<S: ReceiptSink>(
        &self,
        db: &DbState,
        cart_store: &mut CartStore,
        sink: &S,
        draft: &OrderDraft,
    ) -> Result<SubmitOutcome, CheckoutError> {
        queue::enqueue(db, draft.to_keyed_request()).map_err(CheckoutError::Storage)?;

        let totals = cart_store.totals(draft.discount);
        let placeholder = OrderRecord {
            orderid: Some(format!("{OFFLINE_ORDER_PREFIX}{}", Uuid::new_v4())),
            total_amount: Some(totals.total),
            status: Some(OFFLINE_ORDER_STATUS.to_string()),
            created_at: Some(Utc::now().to_rfc3339()),
            customer_name: Some(draft.customer_name.clone()),
            phone_number: Some(draft.phone_number.clone()),
            discount: Some(draft.discount),
            ..OrderRecord::default()
        };

        deliver_receipt(sink, &placeholder, draft);
        cart_store.clear().map_err(CheckoutError::Storage)?;

        info!(
            orderid = placeholder.orderid.as_deref().unwrap_or("?"),
            total = totals.total,
            "order accepted offline, will sync on reconnect"
        );

        Ok(SubmitOutcome {
            order: placeholder,
            queued_offline: true,
        })
    }

    /// Online path: direct submission. Any failure propagates before the
    /// cart is touched, so the entered data survives for a retry.
    async fn submit_online<E: OrderEndpoint, S: ReceiptSink>(
        &self,
        cart_store: &mut CartStore,
        endpoint: &E,
        sink: &S,
        draft: &OrderDraft,
    ) -> Result<SubmitOutcome, CheckoutError> {
        let request = draft.to_keyed_request();

        let record = match draft.target_order_id.as_deref() {
            Some(order_id) if draft.is_update => {
                endpoint.update_order(order_id, &request).await?
            }
            _ => endpoint.create_order(&request).await?,
        };

        deliver_receipt(sink, &record, draft);
        cart_store.clear().map_err(CheckoutError::Storage)?;

        info!(
            orderid = record.orderid.as_deref().unwrap_or("?"),
            update = draft.is_update,
            "order submitted"
        );

        Ok(SubmitOutcome {
            order: record,
            queued_offline: false,
        })
    }
}

/// Build, render, and hand off the receipt. The order is already placed
/// at this point, so a failing sink is logged and swallowed.
fn deliver_receipt<S: ReceiptSink>(sink: &S, order: &OrderRecord, draft: &OrderDraft) {
    let doc = receipt::build_receipt(order, &draft.lines);
    let rendered = receipt::render_text(&doc, &receipt::ReceiptConfig::default());
    if let Err(e) = sink.deliver(&rendered, &doc) {
        warn!(error = %e, "receipt delivery failed");
    }
}
