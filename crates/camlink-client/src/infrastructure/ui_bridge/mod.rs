//! Command bridge between a UI front end and the orchestrator.
//!
//! Front ends (a desktop shell, a mobile wrapper, or the `camlink` CLI) call
//! these functions instead of touching the orchestrator directly.  Every
//! command returns a [`CommandResult<T>`] envelope:
//!
//! ```json
//! { "success": true,  "data": {...}, "error": null  }
//! { "success": false, "data": null,  "error": "Couldn't connect to device." }
//! ```
//!
//! Error strings are always the translated user message for the failure's
//! [`ErrorCode`]; the structured error stays on the Rust side.
//!
//! # DTOs
//!
//! [`StatusDto`] is a plain serializable snapshot of orchestrator state, safe
//! to hand across an IPC boundary.

use std::sync::Arc;

use camlink_core::{ErrorCode, TransportKind};
use serde::{Deserialize, Serialize};

use crate::application::orchestrator::ConnectionOrchestrator;

// ── DTOs ──────────────────────────────────────────────────────────────────────

/// Status snapshot returned to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDto {
    /// Connection state name, e.g. `"Connected"` or `"Discovering"`.
    pub connection_state: String,
    pub io_allowed: bool,
    pub transport: Option<TransportKind>,
    pub camera_name: Option<String>,
    pub session_id: Option<String>,
    /// Whole seconds since the session opened.
    pub connected_secs: Option<u64>,
    /// `ip:port` of the WiFi command channel.
    pub wifi_target: String,
    pub discovery_running: bool,
    /// The rolling log text.
    pub log: String,
}

/// Unified response wrapper for bridge commands.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResult<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> CommandResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Returns the current status snapshot.
pub fn get_status(orchestrator: &ConnectionOrchestrator) -> CommandResult<StatusDto> {
    let session = orchestrator.session();
    let context = orchestrator.context();
    CommandResult::ok(StatusDto {
        connection_state: format!("{:?}", orchestrator.state()),
        io_allowed: context.kill_switch().is_io_allowed(),
        transport: session.as_ref().map(|s| s.kind()),
        camera_name: session
            .as_ref()
            .and_then(|s| s.camera_name().map(str::to_string)),
        session_id: session.as_ref().map(|s| s.id().to_string()),
        connected_secs: session.as_ref().map(|s| s.uptime().as_secs()),
        wifi_target: orchestrator.config().wifi_target.to_string(),
        discovery_running: orchestrator.discovery().is_running(),
        log: context.log().text(),
    })
}

/// Makes one WiFi connection attempt.  On success returns the session id.
pub async fn connect_wifi(orchestrator: Arc<ConnectionOrchestrator>) -> CommandResult<String> {
    match orchestrator.connect_wifi().await {
        Ok(id) => CommandResult::ok(id.to_string()),
        Err(e) => CommandResult::err(e.user_message()),
    }
}

/// Runs the USB connect flow.  The outcome is reported through the log and
/// the returned status snapshot, never as an error.
pub async fn connect_usb(orchestrator: Arc<ConnectionOrchestrator>) -> CommandResult<StatusDto> {
    orchestrator.connect_usb().await;
    get_status(&orchestrator)
}

pub async fn disconnect(orchestrator: Arc<ConnectionOrchestrator>) -> CommandResult<()> {
    orchestrator.disconnect().await;
    CommandResult::ok(())
}

/// Empties the rolling log.
pub fn clear_log(orchestrator: &ConnectionOrchestrator) -> CommandResult<()> {
    orchestrator.context().log().clear();
    CommandResult::ok(())
}

/// Reports an error raised by the UI-side protocol layer.
///
/// `code` is the raw numeric code; unrecognised values map to `Unknown`.
pub fn report_error(
    orchestrator: &ConnectionOrchestrator,
    code: i32,
    reason: &str,
) -> CommandResult<()> {
    orchestrator.report_error(ErrorCode::from_code(code), reason);
    CommandResult::ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::context::ConnectivityContext;
    use crate::application::orchestrator::{Collaborators, OrchestratorConfig, TransportError};
    use crate::infrastructure::mock::{MockSessionLayer, MockUsbHost, ScriptedProbe};
    use crate::infrastructure::usb::ChannelPermissionBroker;

    fn make_orchestrator(
        layer: MockSessionLayer,
        context: ConnectivityContext,
    ) -> Arc<ConnectionOrchestrator> {
        ConnectionOrchestrator::new(
            OrchestratorConfig::default(),
            context,
            Collaborators {
                session_layer: Arc::new(layer),
                probe: Arc::new(ScriptedProbe::unreachable()),
                usb: Arc::new(MockUsbHost::default()),
                permissions: Arc::new(ChannelPermissionBroker::auto_grant()),
            },
        )
    }

    #[test]
    fn test_get_status_before_any_connect() {
        // Arrange
        let context = ConnectivityContext::new();
        let orch = make_orchestrator(
            MockSessionLayer::new(Arc::clone(context.kill_switch())),
            context,
        );

        // Act
        let result = get_status(&orch);

        // Assert
        assert!(result.success);
        let dto = result.data.unwrap();
        assert_eq!(dto.connection_state, "Uninitialized");
        assert!(!dto.io_allowed);
        assert!(dto.session_id.is_none());
        assert!(dto.connected_secs.is_none());
        assert_eq!(dto.wifi_target, "192.168.0.1:55740");
    }

    #[tokio::test]
    async fn test_connect_wifi_failure_returns_user_message() {
        // Arrange
        let context = ConnectivityContext::new();
        let layer = MockSessionLayer::new(Arc::clone(context.kill_switch()));
        layer.script_open(Err(TransportError::NetworkNotConnected));
        let orch = make_orchestrator(layer, context);

        // Act
        let result = connect_wifi(orch).await;

        // Assert
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("WiFi is not connected. Wait a few seconds or check your settings.")
        );
    }

    #[tokio::test]
    async fn test_connect_wifi_success_shows_in_status() {
        let context = ConnectivityContext::new();
        let mut layer = MockSessionLayer::new(Arc::clone(context.kill_switch()));
        layer.default_camera_name = Some("X-H2".into());
        let orch = make_orchestrator(layer, context);

        let result = connect_wifi(Arc::clone(&orch)).await;
        let status = get_status(&orch).data.unwrap();

        assert!(result.success);
        assert_eq!(status.connection_state, "Connected");
        assert_eq!(status.transport, Some(TransportKind::Wifi));
        assert_eq!(status.camera_name.as_deref(), Some("X-H2"));
        assert_eq!(status.session_id, result.data);
        assert!(status.connected_secs.is_some_and(|secs| secs < 60));
    }

    #[test]
    fn test_clear_log_empties_status_log() {
        let context = ConnectivityContext::new();
        context.log().append("old line");
        let orch = make_orchestrator(
            MockSessionLayer::new(Arc::clone(context.kill_switch())),
            context,
        );

        clear_log(&orch);

        assert_eq!(get_status(&orch).data.unwrap().log, "");
    }

    #[test]
    fn test_command_result_envelopes() {
        let ok: CommandResult<u8> = CommandResult::ok(7);
        let err: CommandResult<u8> = CommandResult::err("nope");
        assert!(ok.success && ok.error.is_none());
        assert!(!err.success && err.data.is_none());
    }
}
