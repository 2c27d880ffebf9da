//! # Connectivity
//!
//! Tracks whether the server is reachable and turns raw observations into
//! edge-triggered `restored` / `lost` transitions.
//!
//! ## Monitor and Probe
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ConnectivityProbe ──probe()──► RemoteApi                               │
//! │        │                                                                │
//! │        │ report_connectivity(Online | Offline)                          │
//! │        ▼                                                                │
//! │  SyncEngine control loop ──observe()──► ConnectivityMonitor             │
//! │                                          │                              │
//! │                     Online → Offline ────┼──► Some(Lost)                │
//! │                     Offline → Online ────┼──► Some(Restored)            │
//! │                     unchanged ───────────┴──► None                      │
//! │                                                                         │
//! │  PROBE TIMING:                                                          │
//! │  • online:  every probe_interval                                        │
//! │  • offline: exponential backoff, initial_backoff .. max_backoff         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use norko_core::ConnectivityState;

use crate::config::ConnectivitySettings;
use crate::engine::SyncEngineHandle;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteApi;

// =============================================================================
// Connectivity Monitor
// =============================================================================

/// An edge in the connectivity state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityTransition {
    Restored,
    Lost,
}

/// Current connectivity; mutated only by [`ConnectivityMonitor::observe`].
#[derive(Debug)]
pub struct ConnectivityMonitor {
    online: AtomicBool,
}

impl ConnectivityMonitor {
    pub fn new(initial: ConnectivityState) -> Self {
        ConnectivityMonitor {
            online: AtomicBool::new(initial.is_online()),
        }
    }

    pub fn state(&self) -> ConnectivityState {
        ConnectivityState::from_online(self.is_online())
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Records an observation; returns the transition it caused, if any.
    pub fn observe(&self, state: ConnectivityState) -> Option<ConnectivityTransition> {
        let was_online = self.online.swap(state.is_online(), Ordering::AcqRel);
        match (was_online, state.is_online()) {
            (false, true) => Some(ConnectivityTransition::Restored),
            (true, false) => Some(ConnectivityTransition::Lost),
            _ => None,
        }
    }
}

// =============================================================================
// Connectivity Probe
// =============================================================================

/// Probes the server once and maps the answer to a state.
pub async fn probe_once(remote: &dyn RemoteApi) -> ConnectivityState {
    match remote.probe().await {
        Ok(()) => ConnectivityState::Online,
        Err(e) => {
            debug!(error = %e, "Probe failed");
            ConnectivityState::Offline
        }
    }
}

/// Polls the server and reports observations to the engine.
pub struct ConnectivityProbe {
    remote: Arc<dyn RemoteApi>,
    engine: SyncEngineHandle,
    interval: Duration,
    initial_backoff: Duration,
    max_backoff: Duration,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping a running probe.
#[derive(Clone)]
pub struct ProbeHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl ProbeHandle {
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Probe shutdown channel closed".into()))
    }
}

impl ConnectivityProbe {
    pub fn new(
        remote: Arc<dyn RemoteApi>,
        engine: SyncEngineHandle,
        settings: &ConnectivitySettings,
    ) -> (Self, ProbeHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let probe = ConnectivityProbe {
            remote,
            engine,
            interval: Duration::from_secs(settings.probe_interval_secs),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_secs(settings.max_backoff_secs),
            shutdown_rx,
        };

        (probe, ProbeHandle { shutdown_tx })
    }

    /// Creates the probe and spawns its loop.
    pub fn spawn(
        remote: Arc<dyn RemoteApi>,
        engine: SyncEngineHandle,
        settings: &ConnectivitySettings,
    ) -> ProbeHandle {
        let (probe, handle) = Self::new(remote, engine, settings);
        tokio::spawn(probe.run());
        handle
    }

    /// Runs until shutdown or until the engine goes away.
    pub async fn run(mut self) {
        info!(interval = ?self.interval, "Connectivity probe starting");

        let mut backoff = self.create_backoff();
        let mut delay = self.interval;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}

                _ = self.shutdown_rx.recv() => {
                    info!("Connectivity probe shutting down");
                    break;
                }
            }

            let state = probe_once(self.remote.as_ref()).await;

            if self.engine.report_connectivity(state).await.is_err() {
                debug!("Engine gone, stopping probe");
                break;
            }

            delay = if state.is_online() {
                backoff.reset();
                self.interval
            } else {
                backoff.next_backoff().unwrap_or(self.max_backoff)
            };
        }

        info!("Connectivity probe stopped");
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}
