//! # camlink-core
//!
//! Shared library for camlink containing the connectivity domain types, the
//! process-wide I/O kill switch, and the bounded rolling log buffer.
//!
//! This crate has zero dependencies on OS APIs, USB stacks, or network
//! sockets.  Everything here can be unit-tested on any machine.
//!
//! # Architecture overview (for beginners)
//!
//! camlink talks to a camera over a picture-transfer-protocol command
//! channel.  The camera is reached either over USB or over the camera's own
//! WiFi access point.  The client crate owns the connection state machine;
//! this crate defines the vocabulary it speaks:
//!
//! - **`domain`** – What a transport is (USB endpoints or a WiFi socket
//!   target), what a session is, which states a connection moves through, and
//!   the error-code taxonomy with its human-readable messages.
//!
//! - **`kill_switch`** – A single atomic flag.  While it is *set*, every I/O
//!   call on the camera transport must fail immediately.  It starts set and is
//!   cleared only after a transport has been opened successfully.
//!
//! - **`log_buffer`** – The short rolling text log (three lines) shown to the
//!   user on the main and gallery screens.

pub mod domain;
pub mod kill_switch;
pub mod log_buffer;

// Re-export the most-used types at the crate root so callers can write
// `camlink_core::KillSwitch` instead of `camlink_core::kill_switch::KillSwitch`.
pub use domain::error_code::{ErrorCode, ErrorReport};
pub use domain::session::{Authorization, ConnectionState, Session, SessionId};
pub use domain::transport::{
    TransportHandle, TransportKind, UsbDevice, UsbEndpoints, WifiTarget, COMMAND_PORT,
    DEFAULT_CAMERA_IP, EMULATOR_CAMERA_IP,
};
pub use kill_switch::{IoBlocked, KillSwitch};
pub use log_buffer::{LogBuffer, MAX_LOG_LINES};
