//! ConnectionOrchestrator: acquires a transport, opens the camera session,
//! gates I/O behind the kill switch, and funnels failures into recovery.
//!
//! The orchestrator is the only component with real state-machine behaviour.
//! It owns the single [`Session`] and drives it through
//! [`ConnectionState`]:
//!
//! ```text
//! connect_usb / connect_wifi
//!        │
//!        ▼
//!   Connecting ──ok──► Connected ──report_error──► Error ──► Discovering
//!        │                                                        │
//!        └──fail──► Idle / Discovering        camera reachable ◄──┘
//!                                              (auto-reconnect)
//! ```
//!
//! # The error funnel
//!
//! [`ConnectionOrchestrator::report_error`] is the single authoritative path
//! for a dead session.  It (a) asks the discovery loop to start, (b) returns
//! early if the kill switch is already set, and otherwise (c) logs the reason,
//! sets the kill switch, drops the session, and notifies observers.  Nothing
//! here is fatal to the process: every failure is followed by rediscovery.
//!
//! # External collaborators
//!
//! The orchestrator never speaks the camera protocol itself.  It depends on
//! three traits implemented in the infrastructure layer:
//!
//! - [`SessionLayer`] – opens/closes the transport and moves raw bytes.
//! - [`UsbHost`] – finds the camera on the USB bus and resolves its endpoints.
//! - [`PermissionBroker`] – asks the platform for USB access.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use camlink_core::{
    Authorization, ConnectionState, ErrorCode, ErrorReport, IoBlocked, Session, SessionId,
    TransportHandle, UsbDevice, UsbEndpoints, WifiTarget,
};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::context::ConnectivityContext;
use super::discovery::{DiscoveryListener, DiscoveryLoop, ReachabilityProbe};

/// Number of permission checks the original polling wait performed.
pub const PERMISSION_POLL_ATTEMPTS: u32 = 100;

/// Interval between those checks.
pub const PERMISSION_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Text-update key carrying the camera's name.
pub const CAMERA_NAME_KEY: &str = "cam_name";

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failures reported by the transport collaborators.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no camera found on the USB bus")]
    NoDevice,
    #[error("USB access denied for {0}")]
    PermissionDenied(String),
    #[error("failed to open {target}: {reason}")]
    OpenFailed { target: String, reason: String },
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),
    #[error("not connected to the camera network")]
    NetworkNotConnected,
    #[error("unsupported environment: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Blocked(#[from] IoBlocked),
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Classifies the failure into the user-facing taxonomy.
    pub fn code(&self) -> ErrorCode {
        match self {
            TransportError::NoDevice => ErrorCode::NoDeviceFound,
            TransportError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            TransportError::OpenFailed { .. } => ErrorCode::TransportOpenFailed,
            TransportError::NetworkUnavailable(_) => ErrorCode::NetworkUnavailable,
            TransportError::NetworkNotConnected => ErrorCode::NetworkNotConnected,
            TransportError::Unsupported(_) => ErrorCode::UnsupportedEnvironment,
            TransportError::Blocked(_) | TransportError::Io(_) => ErrorCode::Unknown,
        }
    }
}

/// Errors returned to callers of the orchestrator's connect operations.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("a connection attempt is already in progress")]
    Busy,
    #[error("a session is already open; disconnect first")]
    AlreadyConnected,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ConnectError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ConnectError::Busy | ConnectError::AlreadyConnected => ErrorCode::Unknown,
            ConnectError::Transport(e) => e.code(),
        }
    }

    /// The translated message shown to the user.
    pub fn user_message(&self) -> &'static str {
        self.code().message()
    }
}

// ── Collaborator traits ───────────────────────────────────────────────────────

/// What the session layer learned while opening a transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenedSession {
    pub camera_name: Option<String>,
}

/// The native transport/session layer.
///
/// Implementations own the socket or USB endpoints once `open_transport`
/// succeeds.  `send` and `receive` are the raw byte primitives the protocol
/// layer builds on; they must consult the kill switch and fail with
/// [`TransportError::Blocked`] while it is set.
#[async_trait]
pub trait SessionLayer: Send + Sync {
    /// One-time initialisation of the native layer.
    fn init(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn open_transport(&self, handle: &TransportHandle)
        -> Result<OpenedSession, TransportError>;

    async fn close_transport(&self) -> Result<(), TransportError>;

    async fn send(&self, bytes: &[u8]) -> Result<(), TransportError>;

    async fn receive(&self, buf: &mut [u8]) -> Result<usize, TransportError>;
}

/// Host-side USB access.
pub trait UsbHost: Send + Sync {
    /// Returns the first attached camera, if any.
    fn find_camera(&self) -> Option<UsbDevice>;

    /// Opens the low-level device connection.
    fn open_connection(&self, device: &UsbDevice) -> Result<(), TransportError>;

    /// Claims the still-image interface and resolves its endpoints.
    fn resolve_endpoints(&self, device: &UsbDevice) -> Result<UsbEndpoints, TransportError>;

    /// Releases the interface and connection taken by `open_connection`.
    fn close_connection(&self, device: &UsbDevice);
}

/// The platform's device-access prompt.
pub trait PermissionBroker: Send + Sync {
    /// Asks for access to `device`.  The returned receiver moves from
    /// `Pending` to `Granted` or `Denied` when the user answers.
    fn request_access(&self, device: &UsbDevice) -> watch::Receiver<Authorization>;
}

/// The external collaborators an orchestrator is wired to.
pub struct Collaborators {
    pub session_layer: Arc<dyn SessionLayer>,
    pub probe: Arc<dyn ReachabilityProbe>,
    pub usb: Arc<dyn UsbHost>,
    pub permissions: Arc<dyn PermissionBroker>,
}

// ── Configuration ─────────────────────────────────────────────────────────────

/// Runtime tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Camera command channel used by `connect_wifi` and discovery.
    pub wifi_target: WifiTarget,
    /// How long `connect_usb` waits for the user to grant access.
    pub permission_timeout: Duration,
    /// Pause between discovery probes.
    pub discovery_interval: Duration,
    /// Reconnect over WiFi when discovery finds the camera after an error.
    pub auto_reconnect: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            wifi_target: WifiTarget::default(),
            permission_timeout: PERMISSION_POLL_INTERVAL * PERMISSION_POLL_ATTEMPTS,
            discovery_interval: Duration::from_secs(1),
            auto_reconnect: true,
        }
    }
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

/// Top-level connection state machine.
///
/// Constructed behind an `Arc` (see [`ConnectionOrchestrator::new`]) because
/// the discovery task holds a weak reference back to it for reconnection.
pub struct ConnectionOrchestrator {
    me: Weak<ConnectionOrchestrator>,
    config: OrchestratorConfig,
    context: ConnectivityContext,
    session_layer: Arc<dyn SessionLayer>,
    usb: Arc<dyn UsbHost>,
    permissions: Arc<dyn PermissionBroker>,
    discovery: DiscoveryLoop,
    initialized: AtomicBool,
    state: Mutex<ConnectionState>,
    session: Mutex<Option<Session>>,
    permitted_usb: Mutex<Option<UsbDevice>>,
}

impl ConnectionOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        context: ConnectivityContext,
        collaborators: Collaborators,
    ) -> Arc<Self> {
        let discovery = DiscoveryLoop::new(
            collaborators.probe,
            config.wifi_target,
            config.discovery_interval,
        );
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            config,
            context,
            session_layer: collaborators.session_layer,
            usb: collaborators.usb,
            permissions: collaborators.permissions,
            discovery,
            initialized: AtomicBool::new(false),
            state: Mutex::new(ConnectionState::Uninitialized),
            session: Mutex::new(None),
            permitted_usb: Mutex::new(None),
        })
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn context(&self) -> &ConnectivityContext {
        &self.context
    }

    pub fn discovery(&self) -> &DiscoveryLoop {
        &self.discovery
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the active session, if any.
    pub fn session(&self) -> Option<Session> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected && !self.context.kill_switch().is_set()
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != next {
            debug!("connection state {:?} → {:?}", *state, next);
            *state = next;
        }
    }

    /// Moves to `Connecting` unless an attempt is running or a session is open.
    fn begin_connect(&self) -> Result<(), ConnectError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            ConnectionState::Connecting => return Err(ConnectError::Busy),
            ConnectionState::Connected => return Err(ConnectError::AlreadyConnected),
            _ => {}
        }
        debug!("connection state {:?} → Connecting", *state);
        *state = ConnectionState::Connecting;
        Ok(())
    }

    /// Takes the session out of the orchestrator and closes it.  A USB
    /// connection behind it is released.
    fn drop_session(&self) -> Option<Session> {
        let mut session = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        session.close();
        if let TransportHandle::Usb { device, .. } = session.transport() {
            self.usb.close_connection(device);
        }
        Some(session)
    }

    /// State to fall back to after a connect attempt that did not succeed.
    fn settle_after_failure(&self) {
        if self.discovery.is_running() {
            self.set_state(ConnectionState::Discovering);
        } else {
            self.set_state(ConnectionState::Idle);
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// One-time initialisation of the session layer.
    ///
    /// Idempotent: returns `true` only for the call that performed it.
    pub fn init(&self) -> bool {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Err(e) = self.session_layer.init() {
            error!("session layer initialisation failed: {e}");
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == ConnectionState::Uninitialized {
            *state = ConnectionState::Idle;
        }
        info!("connectivity initialised");
        true
    }

    /// Closes the active session without reporting an error.
    ///
    /// The kill switch is set before the transport is closed so no I/O can
    /// slip in while it is being torn down.  Discovery is not started.
    pub async fn disconnect(&self) {
        self.context.kill_switch().set();
        if let Some(session) = self.drop_session() {
            if let Err(e) = self.session_layer.close_transport().await {
                warn!("error closing transport for session {}: {e}", session.id());
            }
            info!("session {} closed", session.id());
            self.context.log().append("Disconnected.");
        }
        self.set_state(ConnectionState::Idle);
    }

    /// Stops discovery, waits for it, and closes any open session.
    pub async fn shutdown(&self) {
        if let Some(exit) = self.discovery.shutdown().await {
            debug!("discovery exited during shutdown: {exit:?}");
        }
        self.disconnect().await;
    }

    // ── USB ───────────────────────────────────────────────────────────────────

    /// Finds the camera on USB, waits for access, and opens it.
    ///
    /// Failures are logged, never returned: if access is not granted within
    /// the permission timeout the call simply returns and no open is
    /// attempted.  Callers learn the outcome from [`Self::state`] or the log.
    pub async fn connect_usb(&self) {
        self.init();
        if let Err(e) = self.begin_connect() {
            warn!("connect_usb ignored: {e}");
            return;
        }

        let Some(device) = self.usb.find_camera() else {
            self.context.log().append(ErrorCode::NoDeviceFound.message());
            self.settle_after_failure();
            return;
        };

        self.context.log().append("Trying to get permission...");
        match self.wait_for_permission(&device).await {
            Authorization::Granted => {
                debug!("have USB permission for {device}");
                *self
                    .permitted_usb
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(device);
                self.continue_open_usb().await;
            }
            Authorization::Denied => {
                warn!("USB permission denied for {device}");
                self.context
                    .log()
                    .append(ErrorCode::PermissionDenied.message());
                self.settle_after_failure();
            }
            Authorization::Pending => {
                warn!(
                    "USB permission for {device} not granted within {:?}",
                    self.config.permission_timeout
                );
                self.settle_after_failure();
            }
        }
    }

    /// Waits for the permission broker to answer, bounded by the configured
    /// timeout.  Returns `Pending` when the bound expires.
    async fn wait_for_permission(&self, device: &UsbDevice) -> Authorization {
        let mut rx = self.permissions.request_access(device);
        let answered = async {
            loop {
                let current = *rx.borrow_and_update();
                if current != Authorization::Pending {
                    return current;
                }
                if rx.changed().await.is_err() {
                    // Broker went away without answering.
                    return Authorization::Pending;
                }
            }
        };
        tokio::time::timeout(self.config.permission_timeout, answered)
            .await
            .unwrap_or(Authorization::Pending)
    }

    /// Opens the permitted USB device and hands it to the session layer.
    ///
    /// Any failure is logged and swallowed.
    pub async fn continue_open_usb(&self) {
        let device = self
            .permitted_usb
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(device) = device else {
            warn!("continue_open_usb called without a permitted device");
            self.settle_after_failure();
            return;
        };

        match self.open_usb(&device).await {
            Ok(session_id) => {
                info!("USB session {session_id} established with {device}");
            }
            Err(e) => {
                error!("failed to open USB device {device}: {e}");
                self.context.log().append(e.code().message());
                self.settle_after_failure();
            }
        }
    }

    async fn open_usb(&self, device: &UsbDevice) -> Result<SessionId, TransportError> {
        self.usb.open_connection(device)?;
        match self.open_usb_transport(device).await {
            Ok((handle, opened)) => Ok(self.establish(handle, opened)),
            Err(e) => {
                self.usb.close_connection(device);
                Err(e)
            }
        }
    }

    async fn open_usb_transport(
        &self,
        device: &UsbDevice,
    ) -> Result<(TransportHandle, OpenedSession), TransportError> {
        let endpoints = self.usb.resolve_endpoints(device)?;
        let handle = TransportHandle::Usb {
            device: device.clone(),
            endpoints,
        };
        let opened = self.session_layer.open_transport(&handle).await?;
        Ok((handle, opened))
    }

    // ── WiFi ──────────────────────────────────────────────────────────────────

    /// Makes a single connection attempt to the configured camera address.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::Busy`] while another attempt is running,
    /// [`ConnectError::AlreadyConnected`] while a session is open, or the
    /// transport failure.  The kill switch stays set on failure; map the error
    /// to user text with [`ConnectError::user_message`].
    pub async fn connect_wifi(&self) -> Result<SessionId, ConnectError> {
        self.init();
        self.begin_connect()?;

        self.context.log().append("Connecting...");
        let handle = TransportHandle::Wifi(self.config.wifi_target);
        match self.session_layer.open_transport(&handle).await {
            Ok(opened) => Ok(self.establish(handle, opened)),
            Err(e) => {
                warn!("WiFi connect to {} failed: {e}", self.config.wifi_target);
                self.settle_after_failure();
                Err(e.into())
            }
        }
    }

    /// Records a confirmed open: stores the session, clears the kill switch,
    /// and publishes the camera name.
    fn establish(&self, handle: TransportHandle, opened: OpenedSession) -> SessionId {
        let kind = handle.kind();
        let session = Session::open(handle, opened.camera_name.clone());
        let id = session.id();
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session);

        if self.context.kill_switch().clear() {
            debug!("kill switch cleared for session {id}");
        }
        self.set_state(ConnectionState::Connected);
        info!("session {id} open over {kind}");

        if let Some(name) = opened.camera_name {
            self.send_text_update(CAMERA_NAME_KEY, &name);
        }
        id
    }

    // ── Errors and I/O ────────────────────────────────────────────────────────

    /// The failure funnel.  See the module docs for the exact ordering.
    pub fn report_error(&self, code: ErrorCode, reason: &str) {
        self.start_discovery();

        if self.context.kill_switch().is_set() {
            debug!(?code, "error report ignored; kill switch already set: {reason}");
            return;
        }

        let report = ErrorReport::new(code, reason);
        warn!(code = code.code(), "{report}");
        if !self.context.kill_switch().set() {
            // Another thread set it between the check and here.
            return;
        }

        if let Some(session) = self.drop_session() {
            info!("session {} dropped after error", session.id());
        }

        self.set_state(ConnectionState::Error);
        self.context.log().append(&report.log_line());
        self.context.observers().broadcast_error(&report);
        self.settle_after_failure();
    }

    fn start_discovery(&self) {
        let listener: Weak<dyn DiscoveryListener> = self.me.clone();
        self.discovery.start(listener);
    }

    /// Runs a session I/O operation only while the kill switch is clear.
    ///
    /// A transport failure other than [`TransportError::Blocked`] is funneled
    /// into [`Self::report_error`] before being returned.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Blocked`] immediately when I/O is not allowed.
    pub async fn with_io<T, F, Fut>(&self, op: F) -> Result<T, TransportError>
    where
        F: FnOnce(Arc<dyn SessionLayer>) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        self.context.kill_switch().check()?;
        match op(Arc::clone(&self.session_layer)).await {
            Ok(value) => Ok(value),
            Err(e @ TransportError::Blocked(_)) => Err(e),
            Err(e) => {
                self.report_error(e.code(), &e.to_string());
                Err(e)
            }
        }
    }

    /// Routes a key/value update from the session layer to observers.
    pub fn send_text_update(&self, key: &str, value: &str) {
        match key {
            CAMERA_NAME_KEY => {
                if let Some(session) = self
                    .session
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .as_mut()
                {
                    session.set_camera_name(value);
                }
                self.context.observers().broadcast_camera_name(value);
            }
            _ => debug!("unknown update key {key}"),
        }
    }
}

#[async_trait]
impl DiscoveryListener for ConnectionOrchestrator {
    async fn on_reachable(&self, target: WifiTarget, camera_name: Option<String>) {
        if let Some(name) = camera_name.as_deref() {
            self.send_text_update(CAMERA_NAME_KEY, name);
        }
        if !self.config.auto_reconnect || !self.context.kill_switch().is_set() {
            return;
        }
        if !self.state().accepts_connect() {
            return;
        }
        info!("camera reachable at {target}; reconnecting");
        if let Err(e) = self.connect_wifi().await {
            debug!("reconnect attempt failed: {e}");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
