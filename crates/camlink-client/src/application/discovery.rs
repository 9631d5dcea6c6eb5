//! DiscoveryLoop: background reachability polling for the camera over WiFi.
//!
//! After an error is reported the orchestrator starts this loop so the
//! connection can heal itself.  The loop repeatedly asks a
//! [`ReachabilityProbe`] whether the camera's command channel answers:
//!
//! - `Reachable` – the camera is there.  Registered listeners are told so
//!   (the orchestrator reconnects), and polling **continues** as a liveness
//!   heartbeat.
//! - `Unreachable` – keep polling.
//! - `Terminal(code)` – the single sentinel that ends the loop.
//!
//! # Lifecycle
//!
//! At most one loop runs at a time: [`DiscoveryLoop::start`] is a no-op while
//! a previous task is still alive.  The task is a Tokio task whose
//! `JoinHandle` is retained, so shutdown can cancel it and then await its
//! exit instead of racing on timers.
//!
//! ```text
//! start() ──► [probe ─► sleep(interval)] ─► … ─► Terminal ─► stopped
//!                ▲            ▲
//!                └── cancel() interrupts either await
//! ```
//!
//! # Runtime
//!
//! Errors are often reported from threads the runtime does not own.  The
//! loop remembers the runtime it was created on and spawns there when
//! `start` is called from outside any runtime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use camlink_core::{ErrorCode, WifiTarget};
use tokio::{runtime::Handle, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of a single reachability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The camera answered.  Some probes can also read the camera's name.
    Reachable { camera_name: Option<String> },
    /// Nothing answered this time.
    Unreachable,
    /// Discovery cannot continue; the loop stops.
    Terminal(ErrorCode),
}

/// Performs one reachability check against the camera.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe_reachability(&self, target: &WifiTarget) -> ProbeOutcome;
}

/// Receives reachability notifications from a running loop.
#[async_trait]
pub trait DiscoveryListener: Send + Sync {
    async fn on_reachable(&self, target: WifiTarget, camera_name: Option<String>);
}

/// Why a discovery task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryExit {
    /// A probe returned the terminal sentinel.
    Terminated { probes: u64, code: ErrorCode },
    /// `cancel()` was requested.
    Cancelled { probes: u64 },
}

impl DiscoveryExit {
    /// Number of probes the task completed before stopping.
    pub fn probes(&self) -> u64 {
        match *self {
            DiscoveryExit::Terminated { probes, .. } | DiscoveryExit::Cancelled { probes } => {
                probes
            }
        }
    }
}

struct DiscoveryTask {
    cancel: CancellationToken,
    handle: JoinHandle<DiscoveryExit>,
}

/// Supervises the single background discovery task.
pub struct DiscoveryLoop {
    probe: Arc<dyn ReachabilityProbe>,
    target: WifiTarget,
    interval: Duration,
    runtime: Option<Handle>,
    task: Mutex<Option<DiscoveryTask>>,
    total_probes: Arc<AtomicU64>,
    launches: AtomicU64,
}

impl DiscoveryLoop {
    /// Creates a stopped loop that will probe `target` every `interval`.
    ///
    /// When called inside a Tokio runtime, that runtime is remembered for
    /// later `start` calls made from foreign threads.
    pub fn new(probe: Arc<dyn ReachabilityProbe>, target: WifiTarget, interval: Duration) -> Self {
        Self {
            probe,
            target,
            interval,
            runtime: Handle::try_current().ok(),
            task: Mutex::new(None),
            total_probes: Arc::new(AtomicU64::new(0)),
            launches: AtomicU64::new(0),
        }
    }

    /// Pins the runtime discovery tasks are spawned on.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Launches the background task unless one is already running.
    ///
    /// Returns `true` if a new task was spawned.  Uses the caller's runtime if
    /// there is one, otherwise the remembered runtime; with neither the
    /// request is logged and dropped.
    pub fn start(&self, listener: Weak<dyn DiscoveryListener>) -> bool {
        let mut slot = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = slot.as_ref() {
            if !task.handle.is_finished() {
                debug!("discovery already running; not starting another");
                return false;
            }
        }

        let Some(runtime) = Handle::try_current().ok().or_else(|| self.runtime.clone()) else {
            error!("cannot start discovery: no Tokio runtime available");
            return false;
        };

        let cancel = CancellationToken::new();
        let handle = runtime.spawn(run_discovery(
            Arc::clone(&self.probe),
            self.target,
            self.interval,
            cancel.clone(),
            listener,
            Arc::clone(&self.total_probes),
        ));
        *slot = Some(DiscoveryTask { cancel, handle });
        self.launches.fetch_add(1, Ordering::Relaxed);
        info!("discovery started for {}", self.target);
        true
    }

    /// Requests termination of the running task, if any.  A probe or sleep in
    /// progress is interrupted.
    pub fn cancel(&self) {
        let slot = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = slot.as_ref() {
            debug!("discovery cancellation requested");
            task.cancel.cancel();
        }
    }

    /// Returns `true` while a task is alive.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Waits for the current task to stop and returns how it ended.
    ///
    /// Returns `None` if no task was started.  The task is detached from the
    /// loop while being awaited, so `start` may launch a new one meanwhile.
    pub async fn wait(&self) -> Option<DiscoveryExit> {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        match task.handle.await {
            Ok(exit) => Some(exit),
            Err(e) => {
                warn!("discovery task did not finish cleanly: {e}");
                None
            }
        }
    }

    /// Cancels the running task and waits for it to exit.
    pub async fn shutdown(&self) -> Option<DiscoveryExit> {
        self.cancel();
        self.wait().await
    }

    /// Total probes completed across every task this loop has launched.
    pub fn total_probes(&self) -> u64 {
        self.total_probes.load(Ordering::Relaxed)
    }

    /// Number of tasks this loop has launched.
    pub fn launch_count(&self) -> u64 {
        self.launches.load(Ordering::Relaxed)
    }

    pub fn target(&self) -> WifiTarget {
        self.target
    }
}

async fn run_discovery(
    probe: Arc<dyn ReachabilityProbe>,
    target: WifiTarget,
    interval: Duration,
    cancel: CancellationToken,
    listener: Weak<dyn DiscoveryListener>,
    total_probes: Arc<AtomicU64>,
) -> DiscoveryExit {
    let mut probes = 0u64;

    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = probe.probe_reachability(&target) => outcome,
        };
        probes += 1;
        total_probes.fetch_add(1, Ordering::Relaxed);

        match outcome {
            ProbeOutcome::Terminal(code) => {
                info!(probes, ?code, "discovery stopped by terminal probe result");
                return DiscoveryExit::Terminated { probes, code };
            }
            ProbeOutcome::Reachable { camera_name } => {
                debug!(probes, "camera reachable at {target}");
                if let Some(listener) = listener.upgrade() {
                    listener.on_reachable(target, camera_name).await;
                }
            }
            ProbeOutcome::Unreachable => {
                debug!(probes, "camera not reachable at {target}");
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = time::sleep(interval) => {}
        }
    }

    info!(probes, "discovery cancelled");
    DiscoveryExit::Cancelled { probes }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
