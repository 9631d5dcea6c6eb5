//! Integration tests for the shared connectivity state in camlink-core.
//!
//! The kill switch and log buffer are read and written from several threads
//! at once in the client: the orchestrator, the discovery task, and the
//! session layer's I/O call sites.  These tests drive them through the public
//! API from multiple OS threads.

use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use camlink_core::{ErrorCode, KillSwitch, LogBuffer, MAX_LOG_LINES};

/// Many threads racing to clear the switch: exactly one observes the
/// set→clear transition.
#[test]
fn test_concurrent_clear_reports_exactly_one_transition() {
    // Arrange
    let switch = Arc::new(KillSwitch::new());
    let barrier = Arc::new(Barrier::new(8));

    // Act
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let switch = Arc::clone(&switch);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                switch.clear()
            })
        })
        .collect();
    let transitions = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked"))
        .filter(|flipped| *flipped)
        .count();

    // Assert
    assert_eq!(transitions, 1);
    assert!(!switch.is_set());
}

/// A set performed on one thread is visible to I/O checks on another.
#[test]
fn test_set_on_one_thread_blocks_io_on_another() {
    let switch = Arc::new(KillSwitch::new());
    switch.clear();

    let setter = Arc::clone(&switch);
    thread::spawn(move || {
        setter.set();
    })
    .join()
    .expect("setter panicked");

    assert!(switch.check().is_err());
}

/// Concurrent appends through a mutex never leave more than the limit.
#[test]
fn test_concurrent_appends_respect_line_limit() {
    // Arrange
    let buf = Arc::new(Mutex::new(LogBuffer::new()));

    // Act
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let buf = Arc::clone(&buf);
            thread::spawn(move || {
                for i in 0..50 {
                    let mut guard = buf.lock().unwrap();
                    guard.push(&format!("thread {t} line {i}"));
                    assert!(guard.len() <= MAX_LOG_LINES);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("appender panicked");
    }

    // Assert
    let guard = buf.lock().unwrap();
    assert_eq!(guard.len(), MAX_LOG_LINES);
}

/// The user-visible message for a failed WiFi connect is the open-failure
/// text, reachable from the raw result code.
#[test]
fn test_raw_open_failure_code_maps_to_user_message() {
    let code = ErrorCode::from_code(-3);
    assert_eq!(code.message(), "Couldn't connect to device.");
}
