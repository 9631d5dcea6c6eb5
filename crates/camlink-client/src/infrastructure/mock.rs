//! In-memory collaborators for tests and for running without hardware.
//!
//! Each mock records every call in `Mutex`-guarded fields so assertions can
//! inspect exactly what the orchestrator did and in what order.  Failure
//! paths are driven by scripting the next results up front.
//!
//! ```ignore
//! let layer = Arc::new(MockSessionLayer::new(Arc::clone(ctx.kill_switch())));
//! layer.script_open(Err(TransportError::NetworkNotConnected));
//! let err = orchestrator.connect_wifi().await.unwrap_err();
//! assert_eq!(layer.opened.lock().unwrap().len(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use camlink_core::{ErrorCode, KillSwitch, TransportHandle, UsbDevice, UsbEndpoints, WifiTarget};

use crate::application::discovery::{ProbeOutcome, ReachabilityProbe};
use crate::application::observers::ConnectionObserver;
use crate::application::orchestrator::{OpenedSession, SessionLayer, TransportError, UsbHost};

// ── Session layer ─────────────────────────────────────────────────────────────

/// Session layer that records opens and sends without touching the network.
///
/// `open_transport` pops the next scripted result; with nothing scripted it
/// succeeds with `default_camera_name`.
pub struct MockSessionLayer {
    kill_switch: Arc<KillSwitch>,
    scripted_opens: Mutex<VecDeque<Result<OpenedSession, TransportError>>>,
    /// Camera name reported by unscripted opens.
    pub default_camera_name: Option<String>,
    /// Every handle passed to `open_transport`.
    pub opened: Mutex<Vec<TransportHandle>>,
    /// Every payload accepted by `send`.
    pub sent: Mutex<Vec<Vec<u8>>>,
    /// Bytes handed out by `receive`.
    pub inbound: Mutex<VecDeque<u8>>,
    /// Number of `close_transport` calls.
    pub closes: AtomicUsize,
    /// When `true`, `send` fails with a broken-pipe I/O error.
    pub fail_sends: bool,
}

impl MockSessionLayer {
    pub fn new(kill_switch: Arc<KillSwitch>) -> Self {
        Self {
            kill_switch,
            scripted_opens: Mutex::new(VecDeque::new()),
            default_camera_name: None,
            opened: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            inbound: Mutex::new(VecDeque::new()),
            closes: AtomicUsize::new(0),
            fail_sends: false,
        }
    }

    /// Queues the result of the next `open_transport` call.
    pub fn script_open(&self, result: Result<OpenedSession, TransportError>) {
        self.scripted_opens.lock().unwrap().push_back(result);
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionLayer for MockSessionLayer {
    async fn open_transport(
        &self,
        handle: &TransportHandle,
    ) -> Result<OpenedSession, TransportError> {
        self.opened.lock().unwrap().push(handle.clone());
        let scripted = self.scripted_opens.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(OpenedSession {
                camera_name: self.default_camera_name.clone(),
            })
        })
    }

    async fn close_transport(&self) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        self.kill_switch.check()?;
        if self.fail_sends {
            return Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe).into());
        }
        self.sent.lock().unwrap().push(bytes.to_vec());
        Ok(())
    }

    async fn receive(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.kill_switch.check()?;
        let mut inbound = self.inbound.lock().unwrap();
        let n = buf.len().min(inbound.len());
        for (slot, byte) in buf.iter_mut().zip(inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

// ── USB host ──────────────────────────────────────────────────────────────────

/// USB host with an optional attached camera.
#[derive(Default)]
pub struct MockUsbHost {
    /// Device returned by `find_camera`.
    pub device: Option<UsbDevice>,
    /// When `true`, `open_connection` fails.
    pub fail_open: bool,
    /// When `true`, `resolve_endpoints` fails after the connection opened.
    pub fail_endpoints: bool,
    /// Number of `open_connection` calls.
    pub connection_attempts: AtomicUsize,
    /// Number of `close_connection` calls.
    pub releases: AtomicUsize,
}

impl MockUsbHost {
    pub fn with_camera(device: UsbDevice) -> Self {
        Self {
            device: Some(device),
            ..Default::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.connection_attempts.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl UsbHost for MockUsbHost {
    fn find_camera(&self) -> Option<UsbDevice> {
        self.device.clone()
    }

    fn open_connection(&self, device: &UsbDevice) -> Result<(), TransportError> {
        self.connection_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(TransportError::OpenFailed {
                target: device.to_string(),
                reason: "mock failure".into(),
            });
        }
        Ok(())
    }

    fn resolve_endpoints(&self, device: &UsbDevice) -> Result<UsbEndpoints, TransportError> {
        if self.fail_endpoints {
            return Err(TransportError::OpenFailed {
                target: device.to_string(),
                reason: "no still-image interface".into(),
            });
        }
        Ok(UsbEndpoints {
            interface: 0,
            bulk_in: 0x81,
            bulk_out: 0x02,
            interrupt: Some(0x83),
        })
    }

    fn close_connection(&self, _device: &UsbDevice) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Reachability probe ────────────────────────────────────────────────────────

/// Probe that replays a fixed sequence of outcomes, then repeats `fallback`.
pub struct ScriptedProbe {
    outcomes: Mutex<VecDeque<ProbeOutcome>>,
    fallback: ProbeOutcome,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(outcomes: impl IntoIterator<Item = ProbeOutcome>, fallback: ProbeOutcome) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    /// A probe that never finds the camera and never terminates.
    pub fn unreachable() -> Self {
        Self::new([], ProbeOutcome::Unreachable)
    }

    /// A probe that ends discovery on its first call.
    pub fn terminal(code: ErrorCode) -> Self {
        Self::new([], ProbeOutcome::Terminal(code))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProbe for ScriptedProbe {
    async fn probe_reachability(&self, _target: &WifiTarget) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

// ── Observer ──────────────────────────────────────────────────────────────────

/// Observer that records every callback.
#[derive(Default)]
pub struct RecordingObserver {
    pub logs: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<(ErrorCode, String)>>,
    pub camera_names: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent log text, or an empty string.
    pub fn last_log(&self) -> String {
        self.logs.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

impl ConnectionObserver for RecordingObserver {
    fn on_log_update(&self, text: &str) {
        self.logs.lock().unwrap().push(text.to_string());
    }

    fn on_connection_error(&self, code: ErrorCode, reason: &str) {
        self.errors.lock().unwrap().push((code, reason.to_string()));
    }

    fn on_camera_name_update(&self, name: &str) {
        self.camera_names.lock().unwrap().push(name.to_string());
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_session_layer_replays_script_then_succeeds() {
        // Arrange
        let layer = MockSessionLayer::new(Arc::new(KillSwitch::new()));
        layer.script_open(Err(TransportError::NetworkNotConnected));
        let handle = TransportHandle::Wifi(WifiTarget::default());

        // Act
        let first = layer.open_transport(&handle).await;
        let second = layer.open_transport(&handle).await;

        // Assert
        assert!(first.is_err());
        assert!(second.is_ok());
        assert_eq!(layer.open_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_session_layer_honours_kill_switch() {
        let kill_switch = Arc::new(KillSwitch::new());
        let layer = MockSessionLayer::new(Arc::clone(&kill_switch));

        assert!(layer.send(b"a").await.is_err());
        kill_switch.clear();
        layer.send(b"b").await.unwrap();

        assert_eq!(*layer.sent.lock().unwrap(), vec![b"b".to_vec()]);
    }

    #[tokio::test]
    async fn test_scripted_probe_falls_back_after_script() {
        let probe = ScriptedProbe::new(
            [ProbeOutcome::Reachable { camera_name: None }],
            ProbeOutcome::Unreachable,
        );
        let target = WifiTarget::default();

        assert_eq!(
            probe.probe_reachability(&target).await,
            ProbeOutcome::Reachable { camera_name: None }
        );
        assert_eq!(probe.probe_reachability(&target).await, ProbeOutcome::Unreachable);
        assert_eq!(probe.calls(), 2);
    }

    #[test]
    fn test_mock_usb_host_counts_releases() {
        // Arrange
        let host = MockUsbHost {
            fail_endpoints: true,
            ..MockUsbHost::with_camera(UsbDevice {
                vendor_id: 0x04cb,
                product_id: 0x02e3,
                product_name: None,
            })
        };
        let device = host.find_camera().unwrap();

        // Act
        host.open_connection(&device).unwrap();
        let endpoints = host.resolve_endpoints(&device);
        host.close_connection(&device);

        // Assert
        assert!(endpoints.is_err());
        assert_eq!(host.attempts(), 1);
        assert_eq!(host.release_count(), 1);
    }
}
