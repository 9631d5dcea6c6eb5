//! Process-wide I/O kill switch.
//!
//! # What is the kill switch? (for beginners)
//!
//! The camera transport can die at any moment: the USB cable is pulled, the
//! camera powers off, the phone roams to another access point.  Once that
//! happens, every further read or write would block, time out, or return
//! garbage.  The kill switch is a single boolean consulted before every I/O
//! call on the transport:
//!
//! - **set** – I/O is forbidden; calls fail immediately with [`IoBlocked`].
//! - **clear** – I/O may proceed.
//!
//! The switch starts *set* (fail closed).  The only path to *clear* is a
//! confirmed successful transport open, and any reported error sets it again.
//!
//! # Thread safety
//!
//! The flag is an `AtomicBool`.  Writes use `Release` ordering and reads use
//! `Acquire`, so a thread that observes the switch as clear also observes
//! everything the opening thread wrote before clearing it (the open
//! transport, the session record).  I/O call sites on any thread see a
//! consistent value without taking a lock.

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

/// Returned by [`KillSwitch::check`] when I/O is not allowed.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("transport I/O blocked by kill switch")]
pub struct IoBlocked;

/// Atomic gate that must be clear for any transport I/O to proceed.
#[derive(Debug)]
pub struct KillSwitch {
    set: AtomicBool,
}

impl KillSwitch {
    /// Creates a switch in the *set* (blocking) state.
    pub fn new() -> Self {
        Self {
            set: AtomicBool::new(true),
        }
    }

    /// Returns `true` while I/O is blocked.
    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }

    /// Returns `true` while I/O may proceed.
    pub fn is_io_allowed(&self) -> bool {
        !self.is_set()
    }

    /// Blocks all I/O.  Returns `true` if this call flipped the switch from
    /// clear to set.
    pub fn set(&self) -> bool {
        !self.set.swap(true, Ordering::AcqRel)
    }

    /// Allows I/O.  Returns `true` if this call flipped the switch from set to
    /// clear.
    ///
    /// Must only be called once a transport open has been confirmed.
    pub fn clear(&self) -> bool {
        self.set.swap(false, Ordering::AcqRel)
    }

    /// Fails fast when I/O is blocked.
    ///
    /// # Errors
    ///
    /// Returns [`IoBlocked`] while the switch is set.
    pub fn check(&self) -> Result<(), IoBlocked> {
        if self.is_set() {
            Err(IoBlocked)
        } else {
            Ok(())
        }
    }
}

impl Default for KillSwitch {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
