//! # norko-sync: Offline Sync Engine for Norko POS
//!
//! Lets a register keep selling while the store server is unreachable and
//! reconciles once it comes back.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Engine Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 SyncEngine (control loop)                        │  │
//! │  │                                                                  │  │
//! │  │  Triggers: periodic tick, reconnect, post-sale, manual          │  │
//! │  │  Guard:    SyncSession (at most one pass in flight)              │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ Reconciliation │  │ Operation      │  │ Connectivity           │    │
//! │  │ Puller         │  │ Pusher         │  │ Monitor + Probe        │    │
//! │  │                │  │                │  │                        │    │
//! │  │ products,      │  │ drains the     │  │ restored / lost edges  │    │
//! │  │ categories,    │  │ pending queue  │  │ settle delay           │    │
//! │  │ customers      │  │ FIFO           │  │                        │    │
//! │  └───────┬────────┘  └───────┬────────┘  └────────────────────────┘    │
//! │          │                   │                                          │
//! │          ▼                   ▼                                          │
//! │  ┌────────────────────────────────────┐  ┌────────────────────────┐    │
//! │  │ LocalStore (norko-db / degraded)   │  │ RemoteApi (reqwest)    │    │
//! │  └────────────────────────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  EVENTS (to the UI collaborator):                                      │
//! │  • ConnectivityChanged  • SyncStarted  • SyncFinished                  │
//! │  • Notification         • OperationsDropped                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`] - `SyncEngine` control loop, handle and builder
//! - [`session`] - Single in-flight pass guard
//! - [`connectivity`] - Connectivity monitor and probe
//! - [`queue`] - Pending operation queue with retry accounting
//! - [`puller`] - Reference collection reconciliation
//! - [`pusher`] - FIFO replay of pending operations
//! - [`status`] - `SyncStatus` reporter
//! - [`remote`] - Store server REST client
//! - [`store`] - Local store seam and degraded mode
//! - [`events`] - Events and emitters
//! - [`config`] - Sync configuration (TOML + env)
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use norko_sync::{HttpRemoteApi, SyncConfig, SyncEngineBuilder, TracingEmitter};
//!
//! let config = SyncConfig::load_or_default(None);
//! let remote = Arc::new(HttpRemoteApi::from_config(&config)?);
//!
//! let engine = SyncEngineBuilder::new(config)
//!     .with_store(Arc::new(database))
//!     .with_remote(remote)
//!     .with_emitter(Arc::new(TracingEmitter))
//!     .build()?
//!     .start()
//!     .await;
//!
//! engine.record_sale(draft).await?;
//! println!("Pending: {}", engine.status().await.pending_operation_count);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod events;
pub mod puller;
pub mod pusher;
pub mod queue;
pub mod remote;
pub mod session;
pub mod status;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::SyncConfig;
pub use connectivity::{
    probe_once, ConnectivityMonitor, ConnectivityProbe, ConnectivityTransition, ProbeHandle,
};
pub use engine::{SaleReceipt, SyncEngine, SyncEngineBuilder, SyncEngineHandle};
pub use error::{SyncError, SyncResult};
pub use events::{
    ChannelEmitter, NoOpEmitter, PassSummary, SyncEvent, SyncEventEmitter, SyncOutcome,
    SyncTrigger, TracingEmitter,
};
pub use queue::{FailureOutcome, PendingOperationQueue};
pub use remote::{HttpRemoteApi, RemoteApi};
pub use session::{ActivePass, SyncSession};
pub use store::{LocalStore, UnavailableStore};
