//! Connection result codes and their user-facing messages.
//!
//! The session layer reports failures as small negative integers.  The
//! orchestrator never shows those numbers to the user; it translates them into
//! the short sentences below, which end up in the rolling log and in the
//! `on_connection_error` observer callback.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of every connection failure the orchestrator can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// No camera was found on the USB bus.
    NoDeviceFound,
    /// The user (or OS) did not grant access to the USB device.
    PermissionDenied,
    /// The transport exists but could not be opened.
    TransportOpenFailed,
    /// WiFi hardware is not ready yet.
    NetworkUnavailable,
    /// WiFi is up but not associated with the camera's access point.
    NetworkNotConnected,
    /// The platform cannot bind sockets to the WiFi interface.
    UnsupportedEnvironment,
    /// Any code not listed above.
    Unknown,
}

impl ErrorCode {
    /// Maps a raw result code from the session layer onto the taxonomy.
    ///
    /// Unrecognised values (including the I/O and runtime codes the protocol
    /// layer may produce) map to [`ErrorCode::Unknown`].
    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => ErrorCode::NoDeviceFound,
            -2 => ErrorCode::PermissionDenied,
            -3 => ErrorCode::TransportOpenFailed,
            -100 => ErrorCode::NetworkUnavailable,
            -101 => ErrorCode::NetworkNotConnected,
            -102 => ErrorCode::UnsupportedEnvironment,
            _ => ErrorCode::Unknown,
        }
    }

    /// Returns the raw result code.  `Unknown` has no dedicated value and
    /// reports the generic runtime error code.
    pub fn code(self) -> i32 {
        match self {
            ErrorCode::NoDeviceFound => -1,
            ErrorCode::PermissionDenied => -2,
            ErrorCode::TransportOpenFailed => -3,
            ErrorCode::NetworkUnavailable => -100,
            ErrorCode::NetworkNotConnected => -101,
            ErrorCode::UnsupportedEnvironment => -102,
            ErrorCode::Unknown => -6,
        }
    }

    /// Returns the human-readable message shown to the user.
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::NoDeviceFound => "No device found.",
            ErrorCode::PermissionDenied => "Invalid permissions.",
            ErrorCode::TransportOpenFailed => "Couldn't connect to device.",
            ErrorCode::NetworkUnavailable => "WiFi not ready yet.",
            ErrorCode::NetworkNotConnected => {
                "WiFi is not connected. Wait a few seconds or check your settings."
            }
            ErrorCode::UnsupportedEnvironment => "Unsupported SDK",
            ErrorCode::Unknown => "Unknown error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A (code, reason) pair delivered through the error funnel.
///
/// Reports are transient: they are logged and pushed to observers, never
/// stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub reason: String,
}

impl ErrorReport {
    pub fn new(code: ErrorCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// The line appended to the rolling log: translated message, then reason.
    pub fn log_line(&self) -> String {
        format!("{} {}", self.code.message(), self.reason)
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reason, self.code.code())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ErrorCode; 6] = [
        ErrorCode::NoDeviceFound,
        ErrorCode::PermissionDenied,
        ErrorCode::TransportOpenFailed,
        ErrorCode::NetworkUnavailable,
        ErrorCode::NetworkNotConnected,
        ErrorCode::UnsupportedEnvironment,
    ];

    #[test]
    fn test_known_codes_map_back_to_same_variant() {
        for code in ALL {
            assert_eq!(ErrorCode::from_code(code.code()), code);
        }
    }

    #[test]
    fn test_unrecognised_code_maps_to_unknown() {
        assert_eq!(ErrorCode::from_code(-5), ErrorCode::Unknown);
        assert_eq!(ErrorCode::from_code(0), ErrorCode::Unknown);
        assert_eq!(ErrorCode::from_code(42), ErrorCode::Unknown);
    }

    #[test]
    fn test_open_failure_message_matches_user_text() {
        assert_eq!(
            ErrorCode::TransportOpenFailed.message(),
            "Couldn't connect to device."
        );
    }

    #[test]
    fn test_unknown_message_is_generic() {
        assert_eq!(ErrorCode::from_code(-999).to_string(), "Unknown error");
    }

    #[test]
    fn test_error_report_display_includes_reason_and_code() {
        // Arrange
        let report = ErrorReport::new(ErrorCode::NoDeviceFound, "usb unplugged");

        // Act / Assert
        assert_eq!(report.to_string(), "usb unplugged (-1)");
    }

    #[test]
    fn test_error_report_log_line_leads_with_user_message() {
        let report = ErrorReport::new(ErrorCode::NetworkUnavailable, "wlan0 down");
        assert_eq!(report.log_line(), "WiFi not ready yet. wlan0 down");
    }
}
