//! Transport descriptions for the two physical channels a camera can be
//! reached on.
//!
//! A [`TransportHandle`] is what the orchestrator hands to the session layer
//! when it opens a session.  The handle is opaque to everything above the
//! session layer: the orchestrator only needs to know *which* channel backs
//! the session, never how bytes move across it.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

/// Address of the camera on its own WiFi access point.
pub const DEFAULT_CAMERA_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1));

/// Address of the desktop camera emulator used during development.
pub const EMULATOR_CAMERA_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 33));

/// TCP port of the camera's command channel.
pub const COMMAND_PORT: u16 = 55740;

/// Which physical channel backs a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    Usb,
    Wifi,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Usb => f.write_str("USB"),
            TransportKind::Wifi => f.write_str("WiFi"),
        }
    }
}

/// A USB device as reported by the host's device enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbDevice {
    /// USB vendor ID.
    pub vendor_id: u16,
    /// USB product ID.
    pub product_id: u16,
    /// Product string, if the device reports one.
    pub product_name: Option<String>,
}

impl fmt::Display for UsbDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)?;
        if let Some(name) = &self.product_name {
            write!(f, " ({name})")?;
        }
        Ok(())
    }
}

/// The interface and endpoint addresses resolved on an opened USB device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbEndpoints {
    /// Interface number claimed for the still-image class.
    pub interface: u8,
    /// Bulk IN endpoint address (device to host).
    pub bulk_in: u8,
    /// Bulk OUT endpoint address (host to device).
    pub bulk_out: u8,
    /// Interrupt endpoint for device events, when present.
    pub interrupt: Option<u8>,
}

/// A camera's command channel on the local network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WifiTarget {
    pub ip: IpAddr,
    pub port: u16,
}

impl WifiTarget {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Returns the socket address of the command channel.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl Default for WifiTarget {
    fn default() -> Self {
        Self::new(DEFAULT_CAMERA_IP, COMMAND_PORT)
    }
}

impl fmt::Display for WifiTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

/// Opaque handle over either a USB endpoint pair or a WiFi socket target.
///
/// Once a session is opened on a handle its [`TransportKind`] never changes;
/// switching channels means opening a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportHandle {
    Usb {
        device: UsbDevice,
        endpoints: UsbEndpoints,
    },
    Wifi(WifiTarget),
}

impl TransportHandle {
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportHandle::Usb { .. } => TransportKind::Usb,
            TransportHandle::Wifi(_) => TransportKind::Wifi,
        }
    }
}

impl fmt::Display for TransportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportHandle::Usb { device, .. } => write!(f, "USB {device}"),
            TransportHandle::Wifi(target) => write!(f, "WiFi {target}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_usb_handle() -> TransportHandle {
        TransportHandle::Usb {
            device: UsbDevice {
                vendor_id: 0x04cb,
                product_id: 0x02d7,
                product_name: Some("X-T4".to_string()),
            },
            endpoints: UsbEndpoints {
                interface: 0,
                bulk_in: 0x81,
                bulk_out: 0x02,
                interrupt: Some(0x83),
            },
        }
    }

    #[test]
    fn test_default_wifi_target_uses_camera_ip_and_command_port() {
        // Arrange / Act
        let target = WifiTarget::default();

        // Assert
        assert_eq!(target.socket_addr(), "192.168.0.1:55740".parse().unwrap());
    }

    #[test]
    fn test_emulator_ip_differs_from_camera_ip() {
        assert_ne!(EMULATOR_CAMERA_IP, DEFAULT_CAMERA_IP);
    }

    #[test]
    fn test_handle_kind_matches_variant() {
        assert_eq!(make_usb_handle().kind(), TransportKind::Usb);
        assert_eq!(
            TransportHandle::Wifi(WifiTarget::default()).kind(),
            TransportKind::Wifi
        );
    }

    #[test]
    fn test_usb_handle_display_includes_ids_and_product_name() {
        // Arrange
        let handle = make_usb_handle();

        // Act
        let text = handle.to_string();

        // Assert
        assert_eq!(text, "USB 04cb:02d7 (X-T4)");
    }

    #[test]
    fn test_wifi_handle_display_shows_socket_address() {
        let handle = TransportHandle::Wifi(WifiTarget::new(EMULATOR_CAMERA_IP, 1234));
        assert_eq!(handle.to_string(), "WiFi 192.168.1.33:1234");
    }
}
