//! Domain entities for camlink.
//!
//! This module contains pure connectivity vocabulary with no infrastructure
//! dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain**.  Domain code:
//!
//! - Describes the things the application reasons about (transports,
//!   sessions, error codes) without knowing how they are implemented.
//! - Has **no** imports from USB stacks, socket libraries, or UI frameworks.
//! - Can be compiled and tested on any platform without a camera attached.
//!
//! The orchestrator in `camlink-client` depends on these types; the domain
//! never depends on the orchestrator.

/// Result codes reported by the session layer and their user-facing messages.
pub mod error_code;

/// Session lifecycle and connection state machine states.
pub mod session;

/// USB and WiFi transport descriptions.
pub mod transport;
