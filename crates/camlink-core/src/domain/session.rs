//! Session lifecycle and the orchestrator's connection state machine.
//!
//! # Connection lifecycle (for beginners)
//!
//! ```text
//! Uninitialized ──► Idle ──► Connecting ──► Connected
//!                    ▲           │              │
//!                    └───────────┘          Error
//!                  (attempt failed)            │
//!                                         Discovering ──► Connecting ──► …
//! ```
//!
//! - `Uninitialized`: the session layer has not been initialised yet.
//! - `Idle`: initialised, no session open, nothing in progress.
//! - `Connecting`: a USB or WiFi attempt is in flight.
//! - `Connected`: a session is open and the kill switch is clear.
//! - `Error`: a failure was reported; the kill switch is being set.
//! - `Discovering`: the session is dead and background discovery is polling
//!   for the camera so the connection can heal itself.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::transport::{TransportHandle, TransportKind};

/// Unique identifier assigned to every opened session, used in log output.
pub type SessionId = Uuid;

/// State of the orchestrator's connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Uninitialized,
    Idle,
    Connecting,
    Connected,
    Error,
    Discovering,
}

impl ConnectionState {
    /// Returns `true` while a connect attempt may be started from this state.
    ///
    /// A live session must be disconnected before another is opened.
    pub fn accepts_connect(self) -> bool {
        !matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }
}

/// Whether access to the transport has been authorised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Authorization {
    /// Waiting on the platform permission prompt.
    Pending,
    /// Access granted (WiFi transports need no grant and start here).
    Granted,
    /// Access refused or never answered.
    Denied,
}

/// The live connection to a camera.
///
/// At most one `Session` exists at a time; the orchestrator owns it and
/// drops it on explicit disconnect or when an error is reported.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    transport: TransportHandle,
    open: bool,
    camera_name: Option<String>,
    opened_at: Instant,
}

impl Session {
    /// Records a freshly opened, authorised session on `transport`.
    pub fn open(transport: TransportHandle, camera_name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            transport,
            open: true,
            camera_name,
            opened_at: Instant::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn transport(&self) -> &TransportHandle {
        &self.transport
    }

    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn camera_name(&self) -> Option<&str> {
        self.camera_name.as_deref()
    }

    pub fn set_camera_name(&mut self, name: impl Into<String>) {
        self.camera_name = Some(name.into());
    }

    /// Time since the transport was opened.
    pub fn uptime(&self) -> Duration {
        self.opened_at.elapsed()
    }

    /// Marks the session closed.  Closing twice is harmless.
    pub fn close(&mut self) {
        self.open = false;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
