//! camlink-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does camlink-client do?
//!
//! It keeps a picture-transfer session with a camera alive over USB or the
//! camera's own WiFi network:
//!
//! 1. Acquires a transport: finds the camera on USB and waits for the user to
//!    grant access, or targets the camera's command port over WiFi.
//! 2. Opens the session and clears the kill switch so I/O may flow.
//! 3. When anything fails, funnels the error through one path that sets the
//!    kill switch, drops the session, and starts background discovery.
//! 4. When discovery sees the camera again, reconnects over WiFi.
//!
//! Progress is reported as a three-line rolling log pushed to UI observers.

/// Application layer: orchestrator, discovery, log, observers.
pub mod application;

/// Infrastructure layer: TCP, USB, config storage, UI bridge, mocks.
pub mod infrastructure;
