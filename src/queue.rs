//! Offline pending-orders queue and sync engine.
//!
//! While disconnected, checkout appends serialized order requests to the
//! durable `pending_orders` table. On reconnect the sync engine replays
//! them against the order-creation endpoint strictly in insertion order,
//! one at a time. Accepted entries are deleted as they are acknowledged;
//! the first failure stops the pass and retains the failed suffix for
//! the next reconnect. Replayed requests keep their original
//! `clientRequestId`, so a retry after an ambiguous failure cannot
//! create a duplicate on an idempotent server.

use rusqlite::params;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::connectivity::Transition;
use crate::db::DbState;
use crate::orders::{OrderEndpoint, OrderRequest};

/// A queued order awaiting replay.
#[derive(Debug, Clone)]
pub struct PendingOrder {
    pub id: i64,
    pub request: OrderRequest,
    pub idempotency_key: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Queue storage
// ---------------------------------------------------------------------------

/// Append an order request to the durable queue. No network call is
/// attempted. Assigns an idempotency key when the request carries none,
/// and returns the queue row id.
pub fn enqueue(db: &DbState, mut request: OrderRequest) -> Result<i64, String> {
    let key = request
        .client_request_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    request.client_request_id = Some(key.clone());

    let payload =
        serde_json::to_string(&request).map_err(|e| format!("serialize pending order: {e}"))?;

    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    conn.execute(
        "INSERT INTO pending_orders (payload, idempotency_key) VALUES (?1, ?2)",
        params![payload, key],
    )
    .map_err(|e| format!("enqueue pending order: {e}"))?;

    let row_id = conn.last_insert_rowid();
    info!(queue_id = row_id, "order queued for later sync");
    Ok(row_id)
}

/// All queued orders in insertion order. Rows whose payload no longer
/// parses are dropped with a warning instead of poisoning the flush.
pub fn pending(db: &DbState) -> Result<Vec<PendingOrder>, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    let mut stmt = conn
        .prepare(
            "SELECT id, payload, idempotency_key, attempts, last_error, created_at
             FROM pending_orders
             ORDER BY id ASC",
        )
        .map_err(|e| format!("prepare pending query: {e}"))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })
        .map_err(|e| format!("query pending_orders: {e}"))?;

    let mut orders = Vec::new();
    for row in rows {
        let (id, payload, idempotency_key, attempts, last_error, created_at) =
            row.map_err(|e| format!("read pending row: {e}"))?;
        match serde_json::from_str::<OrderRequest>(&payload) {
            Ok(request) => orders.push(PendingOrder {
                id,
                request,
                idempotency_key,
                attempts,
                last_error,
                created_at,
            }),
            Err(e) => warn!(queue_id = id, "dropping unparseable pending order: {e}"),
        }
    }
    Ok(orders)
}

/// Number of rows in the queue.
pub fn pending_count(db: &DbState) -> Result<i64, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    conn.query_row("SELECT COUNT(*) FROM pending_orders", [], |row| row.get(0))
        .map_err(|e| format!("count pending_orders: {e}"))
}

fn remove_entry(db: &DbState, id: i64) -> Result<(), String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    conn.execute("DELETE FROM pending_orders WHERE id = ?1", params![id])
        .map_err(|e| format!("remove pending order {id}: {e}"))?;
    Ok(())
}

fn mark_attempt_failed(db: &DbState, id: i64, error: &str) -> Result<(), String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    conn.execute(
        "UPDATE pending_orders
         SET attempts = attempts + 1, last_error = ?1
         WHERE id = ?2",
        params![error, id],
    )
    .map_err(|e| format!("mark pending order {id} failed: {e}"))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Sync engine
// ---------------------------------------------------------------------------

/// Result of one flush pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushReport {
    pub attempted: usize,
    pub sent: usize,
    pub remaining: i64,
    pub last_error: Option<String>,
}

/// Outcome of a flush request.
#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    Completed(FlushReport),
    /// A flush was already running; the request was ignored. The next
    /// reconnect will find the queue empty or retry the remainder.
    AlreadyRunning,
}

/// Replays the pending queue. One instance is shared per process; the
/// `in_flight` flag makes flushes single-flight.
#[derive(Debug, Default)]
pub struct SyncEngine {
    in_flight: AtomicBool,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// React to a connectivity transition: a reconnect triggers a flush,
    /// going offline does nothing.
    pub async fn on_transition<E: OrderEndpoint>(
        &self,
        db: &DbState,
        endpoint: &E,
        transition: Transition,
    ) -> Result<Option<FlushOutcome>, String> {
        match transition {
            Transition::WentOnline => self.flush(db, endpoint).await.map(Some),
            Transition::WentOffline => Ok(None),
        }
    }

    /// Replay the queue against the order-creation endpoint.
    pub async fn flush<E: OrderEndpoint>(
        &self,
        db: &DbState,
        endpoint: &E,
    ) -> Result<FlushOutcome, String> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("flush already in flight, ignoring trigger");
            return Ok(FlushOutcome::AlreadyRunning);
        }

        let result = self.flush_queue(db, endpoint).await;
        self.in_flight.store(false, Ordering::SeqCst);
        result.map(FlushOutcome::Completed)
    }

    async fn flush_queue<E: OrderEndpoint>(
        &self,
        db: &DbState,
        endpoint: &E,
    ) -> Result<FlushReport, String> {
        let queued = pending(db)?;
        let attempted = queued.len();
        if attempted > 0 {
            info!(count = attempted, "replaying pending orders");
        }

        let mut sent = 0usize;
        let mut last_error = None;

        // Sequential on purpose: the server may apply ordering-sensitive
        // effects, so queued orders must land in insertion order.
        for entry in queued {
            match endpoint.create_order(&entry.request).await {
                Ok(record) => {
                    remove_entry(db, entry.id)?;
                    sent += 1;
                    info!(
                        queue_id = entry.id,
                        orderid = record.orderid.as_deref().unwrap_or("?"),
                        "pending order accepted"
                    );
                }
                Err(e) => {
                    let message = e.to_string();
                    if e.is_network_like() {
                        warn!(
                            queue_id = entry.id,
                            error = %message,
                            "replay failed, will retry on next reconnect"
                        );
                    } else {
                        warn!(
                            queue_id = entry.id,
                            attempts = entry.attempts + 1,
                            error = %message,
                            "replay rejected by server, order needs attention"
                        );
                    }
                    mark_attempt_failed(db, entry.id, &message)?;
                    last_error = Some(message);
                    break;
                }
            }
        }

        let remaining = pending_count(db)?;
        Ok(FlushReport {
            attempted,
            sent,
            remaining,
            last_error,
        })
    }
}
