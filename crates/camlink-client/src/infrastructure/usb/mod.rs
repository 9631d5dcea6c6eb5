//! USB infrastructure: host-side device access and the permission prompt.
//!
//! The client ships without a USB stack, so the production [`UsbHost`] is
//! [`UnavailableUsbHost`], which never finds a camera.  Platform front ends
//! (and the tests) inject their own host.  USB transport is therefore
//! reachable through the orchestrator's trait seam only.
//!
//! [`ChannelPermissionBroker`] models the platform's asynchronous permission
//! prompt as a `tokio::sync::watch` channel per request: the orchestrator
//! awaits the receiver, and the prompt's answer is delivered by calling
//! [`ChannelPermissionBroker::grant`] or [`ChannelPermissionBroker::deny`].

use std::sync::{Mutex, PoisonError};

use camlink_core::{Authorization, UsbDevice, UsbEndpoints};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::application::orchestrator::{PermissionBroker, TransportError, UsbHost};

/// A host with no USB access at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableUsbHost;

impl UsbHost for UnavailableUsbHost {
    fn find_camera(&self) -> Option<UsbDevice> {
        debug!("USB host unavailable; no camera enumerated");
        None
    }

    fn open_connection(&self, device: &UsbDevice) -> Result<(), TransportError> {
        Err(TransportError::Unsupported(format!(
            "no USB stack available to open {device}"
        )))
    }

    fn resolve_endpoints(&self, device: &UsbDevice) -> Result<UsbEndpoints, TransportError> {
        Err(TransportError::Unsupported(format!(
            "no USB stack available to claim {device}"
        )))
    }

    fn close_connection(&self, _device: &UsbDevice) {}
}

/// How the broker answers new requests before anyone calls `grant`/`deny`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptPolicy {
    /// Leave the request pending until answered.
    Ask,
    /// Answer every request immediately with the given decision.
    Always(Authorization),
}

/// Permission broker backed by `watch` channels.
pub struct ChannelPermissionBroker {
    policy: PromptPolicy,
    pending: Mutex<Vec<(UsbDevice, watch::Sender<Authorization>)>>,
}

impl ChannelPermissionBroker {
    pub fn new(policy: PromptPolicy) -> Self {
        Self {
            policy,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// A broker that grants every request at once.
    pub fn auto_grant() -> Self {
        Self::new(PromptPolicy::Always(Authorization::Granted))
    }

    /// Number of requests still awaiting an answer.  Requests whose waiter
    /// has gone away are not counted.
    pub fn pending_requests(&self) -> usize {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        prune_abandoned(&mut pending);
        pending.len()
    }

    /// Answers every pending request for `device` with `Granted`.
    pub fn grant(&self, device: &UsbDevice) -> usize {
        self.answer(device, Authorization::Granted)
    }

    /// Answers every pending request for `device` with `Denied`.
    pub fn deny(&self, device: &UsbDevice) -> usize {
        self.answer(device, Authorization::Denied)
    }

    fn answer(&self, device: &UsbDevice, decision: Authorization) -> usize {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        prune_abandoned(&mut pending);
        let mut answered = 0;
        pending.retain(|(requested, tx)| {
            if requested != device {
                return true;
            }
            if tx.send(decision).is_ok() {
                answered += 1;
            }
            false
        });
        info!("USB permission {decision:?} for {device} ({answered} request(s))");
        answered
    }
}

/// Drops requests whose receiver was dropped, e.g. after a timed-out wait.
fn prune_abandoned(pending: &mut Vec<(UsbDevice, watch::Sender<Authorization>)>) {
    let before = pending.len();
    pending.retain(|(_, tx)| !tx.is_closed());
    if pending.len() < before {
        debug!("dropped {} abandoned permission request(s)", before - pending.len());
    }
}

impl PermissionBroker for ChannelPermissionBroker {
    fn request_access(&self, device: &UsbDevice) -> watch::Receiver<Authorization> {
        match self.policy {
            PromptPolicy::Always(decision) => {
                let (_tx, rx) = watch::channel(decision);
                rx
            }
            PromptPolicy::Ask => {
                let (tx, rx) = watch::channel(Authorization::Pending);
                let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
                prune_abandoned(&mut pending);
                pending.push((device.clone(), tx));
                debug!("USB permission requested for {device}");
                rx
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
