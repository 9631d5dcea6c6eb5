//! Infrastructure layer: adapters behind the orchestrator's trait seams.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `camlink_core`, but MUST NOT be imported by the `application` layer.
//!
//! - **`network`** – TCP session layer and reachability probe for WiFi.
//! - **`usb`** – USB host access and the `watch`-based permission broker.
//! - **`storage`** – TOML configuration file.
//! - **`ui_bridge`** – command envelope and status snapshot for front ends.
//! - **`mock`** – recording collaborators for tests and hardware-free runs.

pub mod mock;
pub mod network;
pub mod storage;
pub mod ui_bridge;
pub mod usb;
