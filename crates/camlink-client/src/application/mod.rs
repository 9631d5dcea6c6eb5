//! Application layer: the connectivity use cases.
//!
//! # What lives here?
//!
//! - **`context`** – [`context::ConnectivityContext`], the shared bundle of
//!   kill switch, rolling log, and observer registry handed to every
//!   component instead of process globals.
//!
//! - **`observers`** – the outward callback surface (`on_log_update`,
//!   `on_connection_error`, `on_camera_name_update`) and the fixed
//!   main/gallery observer slots.
//!
//! - **`log_aggregator`** – the three-line rolling status log, mirrored to
//!   `tracing` and broadcast to observers on every change.
//!
//! - **`discovery`** – the background reachability loop that runs after an
//!   error so the connection can heal itself.
//!
//! - **`orchestrator`** – the connection state machine: USB and WiFi connect,
//!   the error funnel, gated I/O, disconnect and shutdown.
//!
//! Nothing in this layer touches a socket or a USB bus directly; those live
//! behind the traits in `orchestrator` and `discovery` and are implemented in
//! the infrastructure layer.

pub mod context;
pub mod discovery;
pub mod log_aggregator;
pub mod observers;
pub mod orchestrator;
