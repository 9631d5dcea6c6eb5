//! Observer registry: the outward-facing callback surface of the orchestrator.
//!
//! UI screens register themselves here to receive log text, connection error
//! notifications, and camera name updates.  There is a fixed, small set of
//! slots (the main screen and the gallery screen); a slot that is empty when
//! an update is broadcast is simply skipped.

use std::sync::{Arc, PoisonError, RwLock};

use camlink_core::{ErrorCode, ErrorReport};
use tracing::trace;

/// Callbacks pushed to UI observers.
///
/// Only `on_log_update` is mandatory; screens that do not show errors or
/// camera names can rely on the no-op defaults.
pub trait ConnectionObserver: Send + Sync {
    /// Called with the full, trimmed rolling log after every log mutation.
    fn on_log_update(&self, text: &str);

    /// Called once per error report that actually set the kill switch.
    fn on_connection_error(&self, _code: ErrorCode, _reason: &str) {}

    /// Called when the connected camera reports its name.
    fn on_camera_name_update(&self, _name: &str) {}
}

/// The fixed observer positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverSlot {
    Main,
    Gallery,
}

type Slot = RwLock<Option<Arc<dyn ConnectionObserver>>>;

/// Holds at most one observer per [`ObserverSlot`].
#[derive(Default)]
pub struct ObserverRegistry {
    main: Slot,
    gallery: Slot,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, slot: ObserverSlot) -> &Slot {
        match slot {
            ObserverSlot::Main => &self.main,
            ObserverSlot::Gallery => &self.gallery,
        }
    }

    /// Installs `observer` in `slot`, replacing any previous occupant.
    pub fn register(&self, slot: ObserverSlot, observer: Arc<dyn ConnectionObserver>) {
        *self
            .slot(slot)
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(observer);
    }

    /// Empties `slot`.  Later broadcasts skip it.
    pub fn unregister(&self, slot: ObserverSlot) {
        *self
            .slot(slot)
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_registered(&self, slot: ObserverSlot) -> bool {
        self.slot(slot)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Snapshot of the currently registered observers.
    ///
    /// Callbacks run on the snapshot so an observer may register or
    /// unregister from inside a callback without deadlocking.
    fn current(&self) -> Vec<Arc<dyn ConnectionObserver>> {
        [ObserverSlot::Main, ObserverSlot::Gallery]
            .into_iter()
            .filter_map(|slot| {
                self.slot(slot)
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone()
            })
            .collect()
    }

    pub fn broadcast_log(&self, text: &str) {
        let observers = self.current();
        trace!(observers = observers.len(), "broadcasting log update");
        for observer in observers {
            observer.on_log_update(text);
        }
    }

    pub fn broadcast_error(&self, report: &ErrorReport) {
        for observer in self.current() {
            observer.on_connection_error(report.code, &report.reason);
        }
    }

    pub fn broadcast_camera_name(&self, name: &str) {
        for observer in self.current() {
            observer.on_camera_name_update(name);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
