//! Tandoor POS order-entry core.
//!
//! Headless implementation of the restaurant point-of-sale "New Order"
//! workflow: product catalog queries, a variant-aware cart persisted
//! across reloads, order draft validation, connectivity-aware checkout
//! with a durable offline pending-orders queue, sequential replay on
//! reconnect, and printable receipt rendering. The embedding shell owns
//! the screens; this crate owns the state machines behind them.

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod api;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod connectivity;
pub mod db;
pub mod draft;
pub mod orders;
pub mod queue;
pub mod receipt;
pub mod session;

/// Initialize structured logging (console + daily rolling file).
///
/// Call once at process start. Embedding shells that install their own
/// subscriber should skip this.
pub fn init_logging(log_dir: &std::path::Path) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tandoor_pos=debug"));

    std::fs::create_dir_all(log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(log_dir, "orders");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let console_layer = fmt::layer().with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    // Keep the guard alive for the lifetime of the process; dropping it
    // flushes logs. Leaked intentionally since logging runs until exit.
    std::mem::forget(guard);

    info!("Tandoor POS core v{}", env!("CARGO_PKG_VERSION"));
}
