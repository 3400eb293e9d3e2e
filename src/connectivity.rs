//! Connectivity monitor.
//!
//! Tracks the online/offline state fed in by platform connectivity
//! events and reports transitions edge-triggered: a re-delivered
//! "online" event while already online produces no transition, so the
//! sync engine fires exactly once per actual reconnect. The monitor
//! never polls on its own.

use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

use crate::api::normalize_base_url;

/// Timeout for the one-shot reachability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// An actual change of connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    WentOnline,
    WentOffline,
}

/// Current connectivity state, shared across the checkout orchestrator
/// and the sync engine.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    online: AtomicBool,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        Self {
            online: AtomicBool::new(initially_online),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Feed a platform connectivity event. Returns a transition only
    /// when the state actually changed.
    pub fn set_online(&self, online: bool) -> Option<Transition> {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return None;
        }
        if online {
            info!("Network restored");
            Some(Transition::WentOnline)
        } else {
            info!("Network lost; orders will queue locally");
            Some(Transition::WentOffline)
        }
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

/// One-shot reachability check: HEAD against the API health endpoint.
/// For embedders that must seed the monitor's state at startup or
/// re-check after a suspicious failure; the monitor itself stays
/// event-driven.
pub async fn probe(base_url: &str) -> bool {
    let base = normalize_base_url(base_url);
    let health_url = format!("{base}/api/health");

    let client = match Client::builder().timeout(PROBE_TIMEOUT).build() {
        Ok(c) => c,
        Err(_) => return false,
    };

    match client.head(&health_url).send().await {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_edge_triggered() {
        let monitor = ConnectivityMonitor::new(true);
        assert!(monitor.is_online());

        // Same state again: no transition.
        assert_eq!(monitor.set_online(true), None);

        assert_eq!(monitor.set_online(false), Some(Transition::WentOffline));
        assert!(!monitor.is_online());

        // Re-delivered offline event while already offline.
        assert_eq!(monitor.set_online(false), None);

        assert_eq!(monitor.set_online(true), Some(Transition::WentOnline));
        assert!(monitor.is_online());
    }

    #[test]
    fn test_initial_state_produces_no_transition() {
        let monitor = ConnectivityMonitor::new(false);
        assert!(!monitor.is_online());
        assert_eq!(monitor.set_online(false), None);
    }
}
