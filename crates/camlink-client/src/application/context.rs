//! ConnectivityContext: the shared state every connectivity component sees.
//!
//! The kill switch, the rolling log, and the observer registry are
//! process-wide in spirit: the session layer's I/O call sites, the discovery
//! task, and the UI all touch them.  Rather than living in globals they are
//! bundled here, created once at startup, and handed to each component by
//! `Arc`, which keeps every component constructible in isolation for tests.
//!
//! Mutation rights: the orchestrator and the discovery loop may set or clear
//! the kill switch and append to the log; observers only read.

use std::sync::Arc;

use camlink_core::KillSwitch;

use super::log_aggregator::LogAggregator;
use super::observers::ObserverRegistry;

/// Cheaply clonable bundle of shared connectivity state.
#[derive(Clone)]
pub struct ConnectivityContext {
    kill_switch: Arc<KillSwitch>,
    log: Arc<LogAggregator>,
    observers: Arc<ObserverRegistry>,
}

impl ConnectivityContext {
    /// Creates a context with the kill switch set and an empty log.
    pub fn new() -> Self {
        let observers = Arc::new(ObserverRegistry::new());
        Self {
            kill_switch: Arc::new(KillSwitch::new()),
            log: Arc::new(LogAggregator::new(Arc::clone(&observers))),
            observers,
        }
    }

    pub fn kill_switch(&self) -> &Arc<KillSwitch> {
        &self.kill_switch
    }

    pub fn log(&self) -> &Arc<LogAggregator> {
        &self.log
    }

    pub fn observers(&self) -> &Arc<ObserverRegistry> {
        &self.observers
    }
}

impl Default for ConnectivityContext {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
