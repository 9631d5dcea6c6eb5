//! Network infrastructure: the WiFi command channel to the camera.
//!
//! [`TcpSessionLayer`] is the production [`SessionLayer`] for WiFi.  It owns
//! the TCP stream to the camera's command port once `open_transport`
//! succeeds and moves raw bytes for the protocol layer above it.  It is also
//! the [`ReachabilityProbe`] the discovery loop uses: a probe is a short,
//! bounded TCP connect that is immediately dropped.
//!
//! Every byte-moving call checks the shared [`KillSwitch`] first and fails
//! with [`TransportError::Blocked`] while it is set.
//!
//! The stream is split into independently locked halves.  `close_transport`
//! cancels the open's token before taking either half, so a read parked on a
//! silent camera returns `NetworkNotConnected` instead of holding up the
//! close.
//!
//! # Error classification
//!
//! | `io::ErrorKind`      | open_transport                  | probe                |
//! |----------------------|---------------------------------|----------------------|
//! | `AddrNotAvailable`   | `NetworkUnavailable`            | `Terminal(-100)`     |
//! | `PermissionDenied`   | `Unsupported`                   | `Terminal(-102)`     |
//! | anything else        | `OpenFailed`                    | `Unreachable`        |

use std::io;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use camlink_core::{ErrorCode, KillSwitch, TransportHandle, WifiTarget};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::Mutex,
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::application::discovery::{ProbeOutcome, ReachabilityProbe};
use crate::application::orchestrator::{OpenedSession, SessionLayer, TransportError};

/// Default bound on a single reachability probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// TCP transport to the camera's command port.
pub struct TcpSessionLayer {
    kill_switch: Arc<KillSwitch>,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    /// Cancelled when the current stream is closed or replaced.
    closing: StdMutex<CancellationToken>,
    probe_timeout: Duration,
}

impl TcpSessionLayer {
    pub fn new(kill_switch: Arc<KillSwitch>) -> Self {
        Self::with_probe_timeout(kill_switch, DEFAULT_PROBE_TIMEOUT)
    }

    pub fn with_probe_timeout(kill_switch: Arc<KillSwitch>, probe_timeout: Duration) -> Self {
        Self {
            kill_switch,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            closing: StdMutex::new(CancellationToken::new()),
            probe_timeout,
        }
    }

    /// Returns `true` while a stream is held.
    pub async fn is_open(&self) -> bool {
        self.writer.lock().await.is_some()
    }

    fn closing_token(&self) -> CancellationToken {
        self.closing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Cancels I/O on the current stream and arms a fresh token for the next.
    fn rearm_closing(&self) {
        let fresh = CancellationToken::new();
        let previous = std::mem::replace(
            &mut *self.closing.lock().unwrap_or_else(PoisonError::into_inner),
            fresh,
        );
        previous.cancel();
    }
}

fn classify_open_error(target: WifiTarget, e: io::Error) -> TransportError {
    match e.kind() {
        io::ErrorKind::AddrNotAvailable => TransportError::NetworkUnavailable(e.to_string()),
        io::ErrorKind::PermissionDenied => TransportError::Unsupported(e.to_string()),
        _ => TransportError::OpenFailed {
            target: target.to_string(),
            reason: e.to_string(),
        },
    }
}

fn classify_probe_error(e: &io::Error) -> ProbeOutcome {
    match e.kind() {
        io::ErrorKind::AddrNotAvailable => ProbeOutcome::Terminal(ErrorCode::NetworkUnavailable),
        io::ErrorKind::PermissionDenied => {
            ProbeOutcome::Terminal(ErrorCode::UnsupportedEnvironment)
        }
        _ => ProbeOutcome::Unreachable,
    }
}

#[async_trait]
impl SessionLayer for TcpSessionLayer {
    async fn open_transport(
        &self,
        handle: &TransportHandle,
    ) -> Result<OpenedSession, TransportError> {
        let target = match handle {
            TransportHandle::Wifi(target) => *target,
            TransportHandle::Usb { .. } => {
                return Err(TransportError::Unsupported(
                    "the TCP session layer only carries WiFi transports".into(),
                ));
            }
        };

        // Single attempt, no timeout: the OS connect timeout applies.
        let stream = TcpStream::connect(target.socket_addr())
            .await
            .map_err(|e| classify_open_error(target, e))?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not set TCP_NODELAY on {target}: {e}");
        }

        self.rearm_closing();
        let (read_half, write_half) = stream.into_split();
        let previous = self.writer.lock().await.replace(write_half);
        *self.reader.lock().await = Some(read_half);
        if previous.is_some() {
            debug!("replaced a stale stream while opening {target}");
        }
        info!("command channel open to {target}");
        Ok(OpenedSession::default())
    }

    async fn close_transport(&self) -> Result<(), TransportError> {
        self.rearm_closing();
        let writer = self.writer.lock().await.take();
        let reader = self.reader.lock().await.take();
        if let Some(mut writer) = writer {
            drop(reader);
            writer.shutdown().await?;
            debug!("command channel closed");
        }
        Ok(())
    }

    async fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        self.kill_switch.check()?;
        let closing = self.closing_token();
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::NetworkNotConnected)?;
        tokio::select! {
            biased;
            _ = closing.cancelled() => return Err(TransportError::NetworkNotConnected),
            written = writer.write_all(bytes) => written?,
        }
        trace!(len = bytes.len(), "sent");
        Ok(())
    }

    async fn receive(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.kill_switch.check()?;
        let closing = self.closing_token();
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(TransportError::NetworkNotConnected)?;
        let n = tokio::select! {
            biased;
            _ = closing.cancelled() => return Err(TransportError::NetworkNotConnected),
            read = reader.read(buf) => read?,
        };
        if n == 0 && !buf.is_empty() {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        trace!(len = n, "received");
        Ok(n)
    }
}

#[async_trait]
impl ReachabilityProbe for TcpSessionLayer {
    async fn probe_reachability(&self, target: &WifiTarget) -> ProbeOutcome {
        match time::timeout(self.probe_timeout, TcpStream::connect(target.socket_addr())).await {
            Ok(Ok(_stream)) => ProbeOutcome::Reachable { camera_name: None },
            Ok(Err(e)) => {
                let outcome = classify_probe_error(&e);
                if matches!(outcome, ProbeOutcome::Terminal(_)) {
                    warn!("probe of {target} cannot continue: {e}");
                } else {
                    trace!("probe of {target} failed: {e}");
                }
                outcome
            }
            Err(_) => {
                trace!("probe of {target} timed out after {:?}", self.probe_timeout);
                ProbeOutcome::Unreachable
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::net::TcpListener;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    async fn listener() -> (TcpListener, WifiTarget) {
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, WifiTarget::new(LOCALHOST, port))
    }

    fn closed_target() -> WifiTarget {
        // Port 1 (tcpmux) is not listening on any sane test host.
        WifiTarget::new(LOCALHOST, 1)
    }

    #[tokio::test]
    async fn test_open_transport_refused_maps_to_open_failed() {
        // Arrange
        let layer = TcpSessionLayer::new(Arc::new(KillSwitch::new()));

        // Act
        let err = layer
            .open_transport(&TransportHandle::Wifi(closed_target()))
            .await
            .unwrap_err();

        // Assert
        assert_eq!(err.code(), ErrorCode::TransportOpenFailed);
        assert!(!layer.is_open().await);
    }

    #[tokio::test]
    async fn test_open_transport_connects_to_listener() {
        // Arrange
        let (listener, target) = listener().await;
        let layer = TcpSessionLayer::new(Arc::new(KillSwitch::new()));

        // Act
        let opened = layer.open_transport(&TransportHandle::Wifi(target)).await;
        let (_peer, _) = listener.accept().await.unwrap();

        // Assert
        assert!(opened.is_ok());
        assert!(layer.is_open().await);
        layer.close_transport().await.unwrap();
        assert!(!layer.is_open().await);
    }

    #[tokio::test]
    async fn test_send_is_blocked_while_kill_switch_set() {
        // Arrange
        let (listener, target) = listener().await;
        let kill_switch = Arc::new(KillSwitch::new());
        let layer = TcpSessionLayer::new(Arc::clone(&kill_switch));
        layer
            .open_transport(&TransportHandle::Wifi(target))
            .await
            .unwrap();
        let _peer = listener.accept().await.unwrap();

        // Act
        let result = layer.send(b"hello").await;

        // Assert
        assert!(matches!(result, Err(TransportError::Blocked(_))));
    }

    #[tokio::test]
    async fn test_send_and_receive_when_clear() {
        // Arrange
        let (listener, target) = listener().await;
        let kill_switch = Arc::new(KillSwitch::new());
        let layer = TcpSessionLayer::new(Arc::clone(&kill_switch));
        layer
            .open_transport(&TransportHandle::Wifi(target))
            .await
            .unwrap();
        let (mut peer, _) = listener.accept().await.unwrap();
        kill_switch.clear();

        // Act
        layer.send(b"ping").await.unwrap();
        let mut echoed = [0u8; 4];
        peer.read_exact(&mut echoed).await.unwrap();
        peer.write_all(b"pong").await.unwrap();
        let mut buf = [0u8; 4];
        let n = layer.receive(&mut buf).await.unwrap();

        // Assert
        assert_eq!(&echoed, b"ping");
        assert_eq!(&buf[..n], &b"pong"[..n]);
    }

    #[tokio::test]
    async fn test_send_without_stream_is_not_connected() {
        let kill_switch = Arc::new(KillSwitch::new());
        kill_switch.clear();
        let layer = TcpSessionLayer::new(kill_switch);

        let result = layer.send(b"x").await;

        assert!(matches!(result, Err(TransportError::NetworkNotConnected)));
    }

    #[tokio::test]
    async fn test_usb_handle_is_unsupported() {
        use camlink_core::{UsbDevice, UsbEndpoints};
        let layer = TcpSessionLayer::new(Arc::new(KillSwitch::new()));
        let handle = TransportHandle::Usb {
            device: UsbDevice {
                vendor_id: 0x04cb,
                product_id: 0x02d7,
                product_name: None,
            },
            endpoints: UsbEndpoints {
                interface: 0,
                bulk_in: 0x81,
                bulk_out: 0x02,
                interrupt: None,
            },
        };

        let err = layer.open_transport(&handle).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::UnsupportedEnvironment);
    }

    #[tokio::test]
    async fn test_probe_reachable_and_unreachable() {
        // Arrange
        let (_listener, target) = listener().await;
        let layer = TcpSessionLayer::with_probe_timeout(
            Arc::new(KillSwitch::new()),
            Duration::from_millis(200),
        );

        // Act / Assert
        assert_eq!(
            layer.probe_reachability(&target).await,
            ProbeOutcome::Reachable { camera_name: None }
        );
        assert_eq!(
            layer.probe_reachability(&closed_target()).await,
            ProbeOutcome::Unreachable
        );
    }

    #[tokio::test]
    async fn test_close_interrupts_receive_on_silent_peer() {
        // Arrange: an open channel whose peer never writes
        let (listener, target) = listener().await;
        let kill_switch = Arc::new(KillSwitch::new());
        let layer = Arc::new(TcpSessionLayer::new(Arc::clone(&kill_switch)));
        layer
            .open_transport(&TransportHandle::Wifi(target))
            .await
            .unwrap();
        let (_peer, _) = listener.accept().await.unwrap();
        kill_switch.clear();
        let reading = {
            let layer = Arc::clone(&layer);
            tokio::spawn(async move {
                let mut buf = [0u8; 16];
                layer.receive(&mut buf).await
            })
        };
        time::sleep(Duration::from_millis(50)).await;

        // Act
        kill_switch.set();
        let closed = time::timeout(Duration::from_secs(2), layer.close_transport()).await;

        // Assert
        assert!(matches!(closed, Ok(Ok(()))), "close must not wait on the read");
        let received = time::timeout(Duration::from_secs(2), reading)
            .await
            .expect("pending receive must return")
            .unwrap();
        assert!(matches!(received, Err(TransportError::NetworkNotConnected)));
        assert!(!layer.is_open().await);
    }

    #[tokio::test]
    async fn test_reopen_after_close_moves_bytes_again() {
        // Arrange
        let (listener, target) = listener().await;
        let kill_switch = Arc::new(KillSwitch::new());
        let layer = TcpSessionLayer::new(Arc::clone(&kill_switch));
        let handle = TransportHandle::Wifi(target);
        layer.open_transport(&handle).await.unwrap();
        let _first = listener.accept().await.unwrap();
        layer.close_transport().await.unwrap();

        // Act
        layer.open_transport(&handle).await.unwrap();
        let (mut peer, _) = listener.accept().await.unwrap();
        kill_switch.clear();
        layer.send(b"again").await.unwrap();

        // Assert
        let mut buf = [0u8; 5];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"again");
    }

    #[test]
    fn test_classify_probe_error_terminal_kinds() {
        let unavailable = io::Error::from(io::ErrorKind::AddrNotAvailable);
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);

        assert_eq!(
            classify_probe_error(&unavailable),
            ProbeOutcome::Terminal(ErrorCode::NetworkUnavailable)
        );
        assert_eq!(
            classify_probe_error(&denied),
            ProbeOutcome::Terminal(ErrorCode::UnsupportedEnvironment)
        );
        assert_eq!(classify_probe_error(&refused), ProbeOutcome::Unreachable);
    }
}
