//! # Operation Pusher
//!
//! Replays the pending queue against the server, strictly one operation at a
//! time in FIFO order.
//!
//! ## Per-Operation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  for op in queue.list():                                                │
//! │    pass stale? ───────────────────────────► stop                        │
//! │    match op.operation_type                                              │
//! │      CreateSale      ──► POST /api/sales                                │
//! │      Unsupported(_)  ──► dropped ledger, continue                       │
//! │                                                                         │
//! │    ok   ──► remove(op)              (even if the pass went stale)       │
//! │    err  ──► pass stale? stop without recording                          │
//! │             record_failure(op)      (stays queued for the next pass)    │
//! │             continue with the next operation                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Push phases are serialized by a lock so an abandoned pass still waiting on
//! a response and a fresh pass never submit at the same time.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use norko_core::{DroppedOperation, OperationType, PendingOperation};

use crate::error::SyncError;
use crate::queue::PendingOperationQueue;
use crate::remote::RemoteApi;
use crate::session::ActivePass;

/// Result of one push phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushReport {
    pub pushed: usize,
    pub failed: usize,
    pub dropped: Vec<DroppedOperation>,

    /// The local store failed and the phase stopped.
    pub store_error: Option<String>,

    /// The pass went stale before the queue was drained.
    pub interrupted: bool,
}

impl PushReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.dropped.is_empty() && self.store_error.is_none()
    }
}

pub struct OperationPusher {
    remote: Arc<dyn RemoteApi>,
    queue: Arc<PendingOperationQueue>,
    lock: Mutex<()>,
}

impl OperationPusher {
    pub fn new(remote: Arc<dyn RemoteApi>, queue: Arc<PendingOperationQueue>) -> Self {
        OperationPusher {
            remote,
            queue,
            lock: Mutex::new(()),
        }
    }

    /// Drains the queue once.
    pub async fn push(&self, pass: &ActivePass) -> PushReport {
        let _guard = self.lock.lock().await;
        let mut report = PushReport::default();

        let operations = match self.queue.list().await {
            Ok(operations) => operations,
            Err(e) => {
                error!(error = %e, "Failed to read pending operations");
                report.store_error = Some(e.to_string());
                return report;
            }
        };

        if operations.is_empty() {
            debug!("No pending operations");
            return report;
        }

        info!(count = operations.len(), "Pushing pending operations");

        for operation in operations {
            if !pass.is_current() {
                report.interrupted = true;
                break;
            }

            match self.push_one(pass, &operation, &mut report).await {
                Ok(()) => {}
                Err(PushStop::Store(message)) => {
                    report.store_error = Some(message);
                    break;
                }
                Err(PushStop::Stale) => {
                    report.interrupted = true;
                    break;
                }
            }
        }

        info!(
            pushed = report.pushed,
            failed = report.failed,
            dropped = report.dropped.len(),
            "Push phase finished"
        );

        report
    }

    async fn push_one(
        &self,
        pass: &ActivePass,
        operation: &PendingOperation,
        report: &mut PushReport,
    ) -> Result<(), PushStop> {
        let result = match operation.operation_type {
            OperationType::CreateSale => self.remote.submit_sale(&operation.payload).await,
            OperationType::Unsupported(_) => {
                let dropped = self
                    .queue
                    .drop_unsupported(operation)
                    .await
                    .map_err(PushStop::store)?;
                report.dropped.push(dropped);
                return Ok(());
            }
        };

        match result {
            Ok(_) => {
                self.queue.remove(operation.id).await.map_err(PushStop::store)?;
                debug!(id = operation.id, "Operation pushed");
                report.pushed += 1;
                Ok(())
            }
            Err(e) => {
                if !pass.is_current() {
                    debug!(id = operation.id, error = %e, "Ignoring failure from abandoned pass");
                    return Err(PushStop::Stale);
                }

                warn!(
                    id = operation.id,
                    operation_type = %operation.operation_type,
                    retry_count = operation.retry_count,
                    retryable = e.is_retryable(),
                    unreachable = e.is_connectivity_failure(),
                    error = %e,
                    "Failed to push operation"
                );
                report.failed += 1;

                match self.queue.record_failure(operation.id, &e.to_string()).await {
                    Ok(outcome) => report.dropped.extend(outcome.dropped),
                    Err(SyncError::OperationNotFound(id)) => {
                        debug!(id, "Operation left the queue before its failure was recorded");
                    }
                    Err(store_err) => return Err(PushStop::store(store_err)),
                }

                Ok(())
            }
        }
    }
}

/// Why the push loop stopped early.
enum PushStop {
    Store(String),
    Stale,
}

impl PushStop {
    fn store(e: SyncError) -> Self {
        error!(error = %e, "Local store failed during push");
        PushStop::Store(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SyncSession;
    use crate::testing::{FakeRemote, FakeStore};
    use norko_core::DropReason;
    use serde_json::json;

    fn setup(
        store: &Arc<FakeStore>,
        remote: &Arc<FakeRemote>,
    ) -> (OperationPusher, Arc<PendingOperationQueue>) {
        let queue = Arc::new(PendingOperationQueue::new(store.clone(), 3));
        (OperationPusher::new(remote.clone(), queue.clone()), queue)
    }

    #[tokio::test]
    async fn test_push_fifo_and_remove() {
        let store = Arc::new(FakeStore::new());
        let remote = Arc::new(FakeRemote::new());
        let (pusher, queue) = setup(&store, &remote);

        for total in [10, 20, 30] {
            queue.enqueue(OperationType::CreateSale, json!({"total": total})).await.unwrap();
        }

        let session = Arc::new(SyncSession::new());
        let pass = session.try_begin().unwrap();
        let report = pusher.push(&pass).await;

        assert_eq!(report.pushed, 3);
        assert!(report.is_clean());
        assert!(queue.is_empty().await.unwrap());
        let totals: Vec<_> = remote.submitted().iter().map(|p| p["total"].clone()).collect();
        assert_eq!(totals, vec![json!(10), json!(20), json!(30)]);
    }

    #[tokio::test]
    async fn test_server_error_keeps_operation_and_continues() {
        let store = Arc::new(FakeStore::new());
        let remote = Arc::new(FakeRemote::new());
        let (pusher, queue) = setup(&store, &remote);
        remote.fail_sales_with(500);

        queue.enqueue(OperationType::CreateSale, json!({"total": 1})).await.unwrap();
        queue.enqueue(OperationType::CreateSale, json!({"total": 2})).await.unwrap();

        let session = Arc::new(SyncSession::new());
        let pass = session.try_begin().unwrap();
        let report = pusher.push(&pass).await;

        assert_eq!(report.failed, 2);
        assert!(!report.is_clean());
        let ops = queue.list().await.unwrap();
        assert_eq!(ops.len(), 2);
        assert!(ops.iter().all(|o| o.retry_count == 1));
    }

    #[tokio::test]
    async fn test_unreachable_server_counts_every_operation() {
        let store = Arc::new(FakeStore::new());
        let remote = Arc::new(FakeRemote::new());
        let (pusher, queue) = setup(&store, &remote);
        remote.set_reachable(false);

        queue.enqueue(OperationType::CreateSale, json!({"total": 1})).await.unwrap();
        queue.enqueue(OperationType::CreateSale, json!({"total": 2})).await.unwrap();

        let session = Arc::new(SyncSession::new());
        let pass = session.try_begin().unwrap();
        let report = pusher.push(&pass).await;

        assert_eq!(report.failed, 2);
        let ops = queue.list().await.unwrap();
        assert_eq!(ops[0].retry_count, 1);
        assert_eq!(ops[1].retry_count, 1);
    }

    #[tokio::test]
    async fn test_operation_pushed_once_server_recovers() {
        let store = Arc::new(FakeStore::new());
        let remote = Arc::new(FakeRemote::new());
        let (pusher, queue) = setup(&store, &remote);
        remote.fail_sales_with(503);
        queue.enqueue(OperationType::CreateSale, json!({"total": 7})).await.unwrap();

        let session = Arc::new(SyncSession::new());
        let pass = session.try_begin().unwrap();
        assert_eq!(pusher.push(&pass).await.failed, 1);
        drop(pass);

        remote.accept_sales();
        let pass = session.try_begin().unwrap();
        let report = pusher.push(&pass).await;

        assert_eq!(report.pushed, 1);
        assert!(report.is_clean());
        assert!(queue.is_empty().await.unwrap());
        assert_eq!(remote.submitted().len(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_type_dropped() {
        let store = Arc::new(FakeStore::new());
        let remote = Arc::new(FakeRemote::new());
        let (pusher, queue) = setup(&store, &remote);

        queue.enqueue(OperationType::from_tag("refund"), json!({})).await.unwrap();
        queue.enqueue(OperationType::CreateSale, json!({"total": 5})).await.unwrap();

        let session = Arc::new(SyncSession::new());
        let pass = session.try_begin().unwrap();
        let report = pusher.push(&pass).await;

        assert_eq!(report.pushed, 1);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].reason, DropReason::UnsupportedType);
        assert_eq!(remote.submitted().len(), 1);
        assert_eq!(store.dropped().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_pass_pushes_nothing() {
        let store = Arc::new(FakeStore::new());
        let remote = Arc::new(FakeRemote::new());
        let (pusher, queue) = setup(&store, &remote);
        queue.enqueue(OperationType::CreateSale, json!({})).await.unwrap();

        let session = Arc::new(SyncSession::new());
        let pass = session.try_begin().unwrap();
        session.abandon();

        let report = pusher.push(&pass).await;
        assert!(report.interrupted);
        assert!(remote.submitted().is_empty());
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_reported() {
        let store = Arc::new(FakeStore::new());
        let remote = Arc::new(FakeRemote::new());
        let (pusher, _queue) = setup(&store, &remote);
        store.set_failing(true);

        let session = Arc::new(SyncSession::new());
        let pass = session.try_begin().unwrap();
        let report = pusher.push(&pass).await;

        assert!(report.store_error.is_some());
        assert!(!report.is_clean());
    }
}
