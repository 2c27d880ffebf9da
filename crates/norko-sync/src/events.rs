//! # Sync Events
//!
//! Everything the engine tells the outside world. The engine never renders
//! anything; it hands events to a [`SyncEventEmitter`] and the UI collaborator
//! decides what a status bar or toast looks like.
//!
//! ## Event Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SyncEngine ──emit()──► SyncEventEmitter                               │
//! │                          ├── NoOpEmitter      (tests, embedding)       │
//! │                          ├── TracingEmitter   (headless agent logs)    │
//! │                          └── ChannelEmitter   (broadcast to UI tasks)  │
//! │                                                                         │
//! │  ConnectivityChanged  { state }                                        │
//! │  SyncStarted          { trigger }                                      │
//! │  SyncFinished         { trigger, outcome, summary }                    │
//! │  Notification         { message, level }   ← exactly one per pass      │
//! │  OperationsDropped    { operations }                                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use norko_core::{ConnectivityState, DroppedOperation, Notification, NotificationLevel};

// =============================================================================
// Event Types
// =============================================================================

/// What asked for a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    /// The periodic interval elapsed.
    Periodic,
    /// Connectivity returned and the settle delay passed.
    Reconnect,
    /// A mutation was just queued while online.
    PostMutation,
    /// The user asked for it.
    Manual,
}

impl std::fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncTrigger::Periodic => write!(f, "periodic"),
            SyncTrigger::Reconnect => write!(f, "reconnect"),
            SyncTrigger::PostMutation => write!(f, "post_mutation"),
            SyncTrigger::Manual => write!(f, "manual"),
        }
    }
}

/// Pass-level result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Success,
    Failure,
}

/// Counters for a finished pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    pub collections_updated: usize,
    pub collections_failed: usize,
    pub operations_pushed: usize,
    pub operations_failed: usize,
    pub operations_dropped: usize,
}

/// An event produced by the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    ConnectivityChanged {
        state: ConnectivityState,
    },
    SyncStarted {
        trigger: SyncTrigger,
    },
    SyncFinished {
        trigger: SyncTrigger,
        outcome: SyncOutcome,
        summary: PassSummary,
    },
    Notification(Notification),
    OperationsDropped {
        operations: Vec<DroppedOperation>,
    },
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives engine events (implemented by the UI integration).
pub trait SyncEventEmitter: Send + Sync {
    fn emit(&self, event: SyncEvent);

    /// Convenience for a toast-level notification.
    fn notify(&self, level: NotificationLevel, message: &str) {
        self.emit(SyncEvent::Notification(Notification::new(level, message)));
    }
}

/// No-op event emitter for testing.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit(&self, _event: SyncEvent) {}
}

/// Writes every event to the log.
pub struct TracingEmitter;

impl SyncEventEmitter for TracingEmitter {
    fn emit(&self, event: SyncEvent) {
        match event {
            SyncEvent::ConnectivityChanged { state } => {
                info!(state = %state, "Connectivity changed");
            }
            SyncEvent::SyncStarted { trigger } => {
                debug!(trigger = %trigger, "Sync pass started");
            }
            SyncEvent::SyncFinished {
                trigger,
                outcome,
                summary,
            } => {
                info!(
                    trigger = %trigger,
                    ?outcome,
                    updated = summary.collections_updated,
                    pushed = summary.operations_pushed,
                    failed = summary.operations_failed,
                    dropped = summary.operations_dropped,
                    "Sync pass finished"
                );
            }
            SyncEvent::Notification(n) => match n.level {
                NotificationLevel::Info | NotificationLevel::Success => {
                    info!(message = %n.message, "Notification")
                }
                NotificationLevel::Warning => warn!(message = %n.message, "Notification"),
                NotificationLevel::Error => error!(message = %n.message, "Notification"),
            },
            SyncEvent::OperationsDropped { operations } => {
                for dropped in &operations {
                    error!(
                        id = dropped.operation.id,
                        operation_type = %dropped.operation.operation_type,
                        reason = %dropped.reason,
                        last_error = dropped.last_error.as_deref().unwrap_or(""),
                        "Pending operation permanently dropped"
                    );
                }
            }
        }
    }
}

/// Fans events out over a tokio broadcast channel.
///
/// Slow subscribers lose the oldest events rather than stalling the engine.
#[derive(Clone)]
pub struct ChannelEmitter {
    tx: broadcast::Sender<SyncEvent>,
}

impl ChannelEmitter {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<SyncEvent>) {
        let (tx, rx) = broadcast::channel(capacity);
        (ChannelEmitter { tx }, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }
}

impl SyncEventEmitter for ChannelEmitter {
    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_emitter_delivers_to_subscribers() {
        let (emitter, mut rx) = ChannelEmitter::new(8);
        let mut late = emitter.subscribe();

        emitter.notify(NotificationLevel::Warning, "offline");
        emitter.emit(SyncEvent::SyncStarted {
            trigger: SyncTrigger::Manual,
        });

        assert_eq!(
            rx.recv().await.unwrap(),
            SyncEvent::Notification(Notification::warning("offline"))
        );
        assert!(matches!(
            late.recv().await.unwrap(),
            SyncEvent::Notification(_)
        ));
        assert_eq!(
            rx.recv().await.unwrap(),
            SyncEvent::SyncStarted {
                trigger: SyncTrigger::Manual
            }
        );
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let (emitter, rx) = ChannelEmitter::new(1);
        drop(rx);
        emitter.emit(SyncEvent::ConnectivityChanged {
            state: ConnectivityState::Offline,
        });
        TracingEmitter.notify(NotificationLevel::Error, "store unavailable");
        NoOpEmitter.notify(NotificationLevel::Info, "ignored");
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_value(SyncEvent::SyncStarted {
            trigger: SyncTrigger::PostMutation,
        })
        .unwrap();
        assert_eq!(json["type"], "sync_started");
        assert_eq!(json["trigger"], "post_mutation");
    }
}
