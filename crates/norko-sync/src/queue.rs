//! # Pending Operation Queue
//!
//! Durable FIFO of mutations the server has not confirmed yet.
//!
//! ## Retry Accounting
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  enqueue ──► retry_count 0                                              │
//! │                  │                                                      │
//! │   push failed    ▼                                                      │
//! │  record_failure: retry_count + 1                                        │
//! │                  │                                                      │
//! │       < max_retries ──► persisted, retried on the next pass             │
//! │      >= max_retries ──► moved to dropped_operations, reported loudly    │
//! │                                                                         │
//! │  push succeeded ──► remove (idempotent)                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

use norko_core::{DropReason, DroppedOperation, OperationType, PendingOperation};

use crate::error::{SyncError, SyncResult};
use crate::store::LocalStore;

/// What [`PendingOperationQueue::record_failure`] did.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureOutcome {
    /// Retry count after this failure.
    pub retry_count: u32,

    /// Set when the operation hit the retry limit and left the queue.
    pub dropped: Option<DroppedOperation>,
}

/// Queue of pending operations over the local store.
pub struct PendingOperationQueue {
    store: Arc<dyn LocalStore>,
    max_retries: u32,
}

impl PendingOperationQueue {
    pub fn new(store: Arc<dyn LocalStore>, max_retries: u32) -> Self {
        PendingOperationQueue { store, max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Durably appends an operation and returns its id.
    pub async fn enqueue(&self, operation_type: OperationType, payload: Value) -> SyncResult<i64> {
        let operation = self.store.append_operation(&operation_type, &payload).await?;

        info!(
            id = operation.id,
            operation_type = %operation.operation_type,
            "Operation queued"
        );

        Ok(operation.id)
    }

    /// All pending operations, oldest first.
    pub async fn list(&self) -> SyncResult<Vec<PendingOperation>> {
        self.store.list_operations().await
    }

    pub async fn len(&self) -> SyncResult<usize> {
        self.store.count_operations().await
    }

    pub async fn is_empty(&self) -> SyncResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Removes an operation. Missing ids are ignored.
    pub async fn remove(&self, id: i64) -> SyncResult<()> {
        if !self.store.remove_operation(id).await? {
            debug!(id, "Operation already removed");
        }
        Ok(())
    }

    /// Counts a failed push, retiring the operation at the retry limit.
    pub async fn record_failure(&self, id: i64, last_error: &str) -> SyncResult<FailureOutcome> {
        let operation = self
            .store
            .get_operation(id)
            .await?
            .ok_or(SyncError::OperationNotFound(id))?;

        let retry_count = operation.retry_count.saturating_add(1);

        if retry_count >= self.max_retries {
            let exhausted = PendingOperation {
                retry_count,
                ..operation
            };
            let dropped = self
                .store
                .retire_operation(&exhausted, DropReason::RetriesExhausted, Some(last_error))
                .await?;

            error!(
                id,
                operation_type = %dropped.operation.operation_type,
                retry_count,
                last_error,
                "Operation exceeded max retries and was dropped"
            );

            return Ok(FailureOutcome {
                retry_count,
                dropped: Some(dropped),
            });
        }

        if !self.store.set_retry_count(id, retry_count).await? {
            return Err(SyncError::OperationNotFound(id));
        }

        debug!(id, retry_count, max_retries = self.max_retries, "Operation failure recorded");

        Ok(FailureOutcome {
            retry_count,
            dropped: None,
        })
    }

    /// Retires an operation no handler understands.
    pub async fn drop_unsupported(&self, operation: &PendingOperation) -> SyncResult<DroppedOperation> {
        let dropped = self
            .store
            .retire_operation(operation, DropReason::UnsupportedType, None)
            .await?;

        error!(
            id = operation.id,
            operation_type = %operation.operation_type,
            "Operation type has no handler and was dropped"
        );

        Ok(dropped)
    }
}
