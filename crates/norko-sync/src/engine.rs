//! # Sync Engine
//!
//! Orchestrator for offline sync. Owns the single-pass invariant, sequences
//! pull then push, and turns connectivity edges into notifications.
//!
//! ## Engine Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncEngine Architecture                          │
//! │                                                                         │
//! │   SyncEngineHandle ──┐   periodic tick (every interval, none at start) │
//! │   ConnectivityProbe ─┤          │                                       │
//! │   settle timer ──────┤          │                                       │
//! │                      ▼          ▼                                       │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                     control loop (one at a time)                 │  │
//! │  │                                                                  │  │
//! │  │  Trigger(t)        → online? && session.try_begin()? → spawn pass│  │
//! │  │  Connectivity(s)   → monitor.observe(s)                          │  │
//! │  │       Restored     → notify, start settle timer                  │  │
//! │  │       Lost         → session.abandon(), notify                   │  │
//! │  │  SettleElapsed(g)  → latest timer? → Trigger(Reconnect)          │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                               │                                         │
//! │                               ▼                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  run_pass: Puller (concurrent) → Pusher (FIFO) → lastSyncTime    │  │
//! │  │            → one Success | Error notification                    │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  EVENTS (to the UI collaborator):                                      │
//! │  ConnectivityChanged, SyncStarted, SyncFinished, Notification,         │
//! │  OperationsDropped                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A pass abandoned by a `lost` event keeps running until its in-flight call
//! returns, but it can no longer write `lastSyncTime`, notify, or release the
//! session of a newer pass.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use norko_core::{
    ConnectivityState, NotificationLevel, OperationType, PendingOperation, SaleDraft, SyncStatus,
    LAST_SYNC_SETTING_KEY,
};

use crate::config::SyncConfig;
use crate::connectivity::{ConnectivityMonitor, ConnectivityTransition};
use crate::error::{SyncError, SyncResult};
use crate::events::{NoOpEmitter, PassSummary, SyncEvent, SyncEventEmitter, SyncOutcome, SyncTrigger};
use crate::puller::ReconciliationPuller;
use crate::pusher::{OperationPusher, PushReport};
use crate::queue::PendingOperationQueue;
use crate::remote::RemoteApi;
use crate::session::{ActivePass, SyncSession};
use crate::status::StatusReporter;
use crate::store::LocalStore;

// =============================================================================
// Constants
// =============================================================================

const COMMAND_BUFFER: usize = 64;

pub const MSG_CONNECTION_RESTORED: &str = "Connection restored, syncing...";
pub const MSG_CONNECTION_LOST: &str = "Connection lost, switched to offline mode";
pub const MSG_SYNC_SUCCEEDED: &str = "Sync completed successfully";
pub const MSG_SYNC_FAILED: &str = "Sync failed, will retry";
pub const MSG_SALE_UPLOADING: &str = "Uploading sale to the server...";
pub const MSG_SALE_QUEUED_OFFLINE: &str = "The sale will be uploaded when the connection is available";
pub const MSG_OFFLINE_UNAVAILABLE: &str = "Local storage unavailable, offline mode disabled";

// =============================================================================
// Commands
// =============================================================================

#[derive(Debug)]
enum EngineCommand {
    Trigger(SyncTrigger),
    Connectivity(ConnectivityState),
    SettleElapsed(u64),
    Shutdown,
}

/// How [`SyncEngineHandle::record_sale`] handled a sale.
#[derive(Debug, Clone, PartialEq)]
pub enum SaleReceipt {
    /// Stored locally; the server will see it on a later push.
    Queued { operation_id: i64 },

    /// No local store; sent straight to the server.
    Submitted { response: Value },
}

// =============================================================================
// Engine Core
// =============================================================================

/// Components shared by the control loop, running passes, and handles.
struct EngineCore {
    config: Arc<SyncConfig>,
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteApi>,
    emitter: Arc<dyn SyncEventEmitter>,
    monitor: Arc<ConnectivityMonitor>,
    session: Arc<SyncSession>,
    queue: Arc<PendingOperationQueue>,
    puller: ReconciliationPuller,
    pusher: OperationPusher,
    status: StatusReporter,
}

impl EngineCore {
    async fn run_pass(self: Arc<Self>, pass: ActivePass, trigger: SyncTrigger) {
        info!(trigger = %trigger, "Sync pass started");
        self.emitter.emit(SyncEvent::SyncStarted { trigger });

        let pull = self.puller.pull(&pass).await;

        let push = if pull.discarded || !pass.is_current() {
            PushReport {
                interrupted: true,
                ..Default::default()
            }
        } else {
            self.pusher.push(&pass).await
        };

        if !push.dropped.is_empty() {
            error!(
                count = push.dropped.len(),
                "Pending operations were permanently dropped"
            );
            self.emitter.emit(SyncEvent::OperationsDropped {
                operations: push.dropped.clone(),
            });
        }

        let completed = !pull.discarded && !push.interrupted && pass.is_current();
        let last_sync_saved = completed && self.record_last_sync().await;

        let summary = PassSummary {
            collections_updated: pull.updated.len(),
            collections_failed: pull.failed.len(),
            operations_pushed: push.pushed,
            operations_failed: push.failed,
            operations_dropped: push.dropped.len(),
        };

        let succeeded =
            completed && last_sync_saved && pull.store_failures == 0 && push.is_clean();

        if !pass.is_current() {
            info!(trigger = %trigger, "Sync pass abandoned, results discarded");
            return;
        }

        let outcome = if succeeded {
            info!(trigger = %trigger, pushed = summary.operations_pushed, "Sync pass succeeded");
            self.emitter.notify(NotificationLevel::Success, MSG_SYNC_SUCCEEDED);
            SyncOutcome::Success
        } else {
            warn!(
                trigger = %trigger,
                failed = summary.operations_failed,
                dropped = summary.operations_dropped,
                "Sync pass failed"
            );
            self.emitter.notify(NotificationLevel::Error, MSG_SYNC_FAILED);
            SyncOutcome::Failure
        };

        self.emitter.emit(SyncEvent::SyncFinished {
            trigger,
            outcome,
            summary,
        });

        // The session stays held until SyncFinished is out.
        if !pass.finish() {
            debug!(trigger = %trigger, "Sync pass abandoned while reporting");
        }
    }

    /// Sets `lastSyncTime` in memory and in the store; false if persisting failed.
    async fn record_last_sync(&self) -> bool {
        let now = Utc::now();
        self.status.set_last_sync_time(now).await;

        let value = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        match self.store.set_setting(LAST_SYNC_SETTING_KEY, &value).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to persist last sync time");
                false
            }
        }
    }

    async fn load_last_sync(&self) {
        if !self.store.is_available() {
            return;
        }

        match self.store.get_setting(LAST_SYNC_SETTING_KEY).await {
            Ok(Some(raw)) => match DateTime::parse_from_rfc3339(&raw) {
                Ok(at) => {
                    debug!(last_sync = %raw, "Loaded last sync time");
                    self.status.set_last_sync_time(at.with_timezone(&Utc)).await;
                }
                Err(e) => warn!(value = %raw, error = %e, "Ignoring unreadable last sync time"),
            },
            Ok(None) => debug!("No previous sync recorded"),
            Err(e) => warn!(error = %e, "Failed to load last sync time"),
        }
    }
}

// =============================================================================
// Sync Engine
// =============================================================================

/// The control loop. Build with [`SyncEngineBuilder`], then [`SyncEngine::start`].
pub struct SyncEngine {
    core: Arc<EngineCore>,
    command_tx: mpsc::Sender<EngineCommand>,
    command_rx: mpsc::Receiver<EngineCommand>,
    settle_generation: u64,
}

impl SyncEngine {
    fn new(
        config: SyncConfig,
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteApi>,
        emitter: Arc<dyn SyncEventEmitter>,
        initial: ConnectivityState,
    ) -> Self {
        let config = Arc::new(config);
        let monitor = Arc::new(ConnectivityMonitor::new(initial));
        let session = Arc::new(SyncSession::new());
        let queue = Arc::new(PendingOperationQueue::new(
            Arc::clone(&store),
            config.sync.max_retries,
        ));

        let core = EngineCore {
            puller: ReconciliationPuller::new(
                Arc::clone(&remote),
                Arc::clone(&store),
                config.sync.collections.clone(),
            ),
            pusher: OperationPusher::new(Arc::clone(&remote), Arc::clone(&queue)),
            status: StatusReporter::new(
                Arc::clone(&monitor),
                Arc::clone(&session),
                Arc::clone(&store),
            ),
            config,
            store,
            remote,
            emitter,
            monitor,
            session,
            queue,
        };

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);

        SyncEngine {
            core: Arc::new(core),
            command_tx,
            command_rx,
            settle_generation: 0,
        }
    }

    pub fn handle(&self) -> SyncEngineHandle {
        SyncEngineHandle {
            core: Arc::clone(&self.core),
            command_tx: self.command_tx.clone(),
        }
    }

    /// Loads persisted state, spawns the control loop, and returns a handle.
    pub async fn start(self) -> SyncEngineHandle {
        self.core.load_last_sync().await;

        if !self.core.store.is_available() {
            error!("Local store unavailable, running online-only");
            self.core
                .emitter
                .notify(NotificationLevel::Error, MSG_OFFLINE_UNAVAILABLE);
        }

        info!(
            device_id = %self.core.config.device_id(),
            interval = ?self.core.config.interval(),
            state = %self.core.monitor.state(),
            "Starting sync engine"
        );

        let handle = self.handle();
        tokio::spawn(self.run());
        handle
    }

    async fn run(mut self) {
        let period = self.core.config.interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.request(SyncTrigger::Periodic);
                }

                Some(command) = self.command_rx.recv() => match command {
                    EngineCommand::Trigger(trigger) => self.request(trigger),
                    EngineCommand::Connectivity(state) => self.on_connectivity(state),
                    EngineCommand::SettleElapsed(generation) => {
                        if generation == self.settle_generation {
                            self.request(SyncTrigger::Reconnect);
                        }
                    }
                    EngineCommand::Shutdown => {
                        info!("Sync engine received shutdown");
                        break;
                    }
                },
            }
        }

        self.core.session.abandon();
        info!("Sync engine stopped");
    }

    fn request(&self, trigger: SyncTrigger) {
        let core = &self.core;

        if !core.monitor.is_online() {
            debug!(trigger = %trigger, "Offline, sync request ignored");
            return;
        }

        if !core.store.is_available() {
            debug!(trigger = %trigger, "No local store, sync request ignored");
            return;
        }

        let Some(pass) = core.session.try_begin() else {
            debug!(trigger = %trigger, "Sync already in progress, request dropped");
            return;
        };

        tokio::spawn(Arc::clone(core).run_pass(pass, trigger));
    }

    fn on_connectivity(&mut self, state: ConnectivityState) {
        let core = &self.core;

        match core.monitor.observe(state) {
            None => {}

            Some(ConnectivityTransition::Restored) => {
                info!("Connectivity restored");
                core.emitter.emit(SyncEvent::ConnectivityChanged { state });
                core.emitter
                    .notify(NotificationLevel::Success, MSG_CONNECTION_RESTORED);
                self.schedule_settle();
            }

            Some(ConnectivityTransition::Lost) => {
                let abandoned = core.session.abandon();
                warn!(abandoned_pass = abandoned, "Connectivity lost");
                core.emitter.emit(SyncEvent::ConnectivityChanged { state });
                core.emitter
                    .notify(NotificationLevel::Warning, MSG_CONNECTION_LOST);
                // Any pending reconnect timer is now obsolete.
                self.settle_generation += 1;
            }
        }
    }

    fn schedule_settle(&mut self) {
        self.settle_generation += 1;
        let generation = self.settle_generation;
        let delay = self.core.config.settle_delay();
        let tx = self.command_tx.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(EngineCommand::SettleElapsed(generation)).await;
        });
    }
}

// =============================================================================
// Engine Handle (for external control)
// =============================================================================

/// Cloneable handle used by the UI layer, the probe, and the sales path.
#[derive(Clone)]
pub struct SyncEngineHandle {
    core: Arc<EngineCore>,
    command_tx: mpsc::Sender<EngineCommand>,
}

impl SyncEngineHandle {
    async fn send(&self, command: EngineCommand) -> SyncResult<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| SyncError::ShuttingDown)
    }

    /// Asks for a sync pass. Ignored while offline or while a pass runs.
    pub async fn request_sync(&self, trigger: SyncTrigger) -> SyncResult<()> {
        self.send(EngineCommand::Trigger(trigger)).await
    }

    /// User-initiated sync.
    pub async fn sync_now(&self) -> SyncResult<()> {
        self.request_sync(SyncTrigger::Manual).await
    }

    /// Feeds a connectivity observation into the monitor.
    pub async fn report_connectivity(&self, state: ConnectivityState) -> SyncResult<()> {
        self.send(EngineCommand::Connectivity(state)).await
    }

    /// Validates and queues a sale, returning as soon as it is stored.
    ///
    /// Without a usable local store the sale goes straight to the server, and
    /// fails with [`SyncError::OfflineUnavailable`] while offline.
    pub async fn record_sale(&self, draft: SaleDraft) -> SyncResult<SaleReceipt> {
        let payload = draft.into_payload()?;
        let core = &self.core;

        if core.store.is_available() {
            match core.queue.enqueue(OperationType::CreateSale, payload.clone()).await {
                Ok(operation_id) => {
                    core.status.set_offline_capable(true);

                    if core.monitor.is_online() {
                        core.emitter.notify(NotificationLevel::Info, MSG_SALE_UPLOADING);
                        if let Err(e) = self.request_sync(SyncTrigger::PostMutation).await {
                            debug!(error = %e, "Could not request post-sale sync");
                        }
                    } else {
                        core.emitter
                            .notify(NotificationLevel::Warning, MSG_SALE_QUEUED_OFFLINE);
                    }

                    return Ok(SaleReceipt::Queued { operation_id });
                }
                Err(e) => {
                    error!(error = %e, "Failed to queue sale, offline mode disabled");
                    core.status.set_offline_capable(false);
                    core.emitter
                        .notify(NotificationLevel::Error, MSG_OFFLINE_UNAVAILABLE);
                }
            }
        }

        if !core.monitor.is_online() {
            return Err(SyncError::OfflineUnavailable);
        }

        let response = core.remote.submit_sale(&payload).await?;
        info!("Sale submitted directly to the server");
        Ok(SaleReceipt::Submitted { response })
    }

    /// Operations still waiting for the server, oldest first.
    pub async fn pending_operations(&self) -> SyncResult<Vec<PendingOperation>> {
        self.core.queue.list().await
    }

    pub async fn status(&self) -> SyncStatus {
        self.core.status.get_status().await
    }

    pub fn is_online(&self) -> bool {
        self.core.monitor.is_online()
    }

    /// Stops the control loop and abandons any running pass.
    pub async fn shutdown(&self) -> SyncResult<()> {
        info!("Shutting down sync engine");
        self.send(EngineCommand::Shutdown).await
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for creating a SyncEngine from explicitly constructed parts.
pub struct SyncEngineBuilder {
    config: SyncConfig,
    store: Option<Arc<dyn LocalStore>>,
    remote: Option<Arc<dyn RemoteApi>>,
    emitter: Option<Arc<dyn SyncEventEmitter>>,
    initial_connectivity: ConnectivityState,
}

impl SyncEngineBuilder {
    pub fn new(config: SyncConfig) -> Self {
        SyncEngineBuilder {
            config,
            store: None,
            remote: None,
            emitter: None,
            initial_connectivity: ConnectivityState::Offline,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn LocalStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteApi>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Connectivity at startup, normally the first probe result.
    pub fn with_initial_connectivity(mut self, state: ConnectivityState) -> Self {
        self.initial_connectivity = state;
        self
    }

    pub fn build(self) -> SyncResult<SyncEngine> {
        self.config.validate()?;

        let store = self
            .store
            .ok_or_else(|| SyncError::InvalidConfig("Local store required".into()))?;
        let remote = self
            .remote
            .ok_or_else(|| SyncError::InvalidConfig("Remote API required".into()))?;
        let emitter = self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter));

        Ok(SyncEngine::new(
            self.config,
            store,
            remote,
            emitter,
            self.initial_connectivity,
        ))
    }
}
