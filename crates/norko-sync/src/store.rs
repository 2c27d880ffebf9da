//! # Local Store Seam
//!
//! The engine talks to persistence only through [`LocalStore`], so it can run
//! against SQLite in production, an in-memory fake in tests, or nothing at all
//! when the database could not be opened.
//!
//! ```text
//! ┌──────────────────────┐      ┌──────────────────────────────────────┐
//! │  queue / puller /    │      │  impl LocalStore for                 │
//! │  engine / status     │─────►│   • norko_db::Database  (SQLite)     │
//! │                      │      │   • UnavailableStore    (degraded)   │
//! └──────────────────────┘      └──────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde_json::Value;

use norko_core::{
    DropReason, DroppedOperation, OperationType, PendingOperation, ReferenceCollection,
};
use norko_db::{Database, DbError};

use crate::error::{SyncError, SyncResult};

/// Persistence consumed by the sync engine.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Atomically replaces a reference snapshot.
    async fn replace_collection(
        &self,
        collection: ReferenceCollection,
        items: &[Value],
    ) -> SyncResult<usize>;

    /// Appends a pending operation with `retry_count` 0.
    async fn append_operation(
        &self,
        operation_type: &OperationType,
        payload: &Value,
    ) -> SyncResult<PendingOperation>;

    /// Pending operations in insertion order.
    async fn list_operations(&self) -> SyncResult<Vec<PendingOperation>>;

    async fn get_operation(&self, id: i64) -> SyncResult<Option<PendingOperation>>;

    /// Deletes an operation; `false` when it was already gone.
    async fn remove_operation(&self, id: i64) -> SyncResult<bool>;

    /// Persists a retry count; `false` when the operation is gone.
    async fn set_retry_count(&self, id: i64, retry_count: u32) -> SyncResult<bool>;

    async fn count_operations(&self) -> SyncResult<usize>;

    /// Moves an operation from the queue to the dropped ledger.
    async fn retire_operation(
        &self,
        operation: &PendingOperation,
        reason: DropReason,
        last_error: Option<&str>,
    ) -> SyncResult<DroppedOperation>;

    async fn get_setting(&self, key: &str) -> SyncResult<Option<String>>;

    async fn set_setting(&self, key: &str, value: &str) -> SyncResult<()>;

    /// False when offline work is impossible.
    fn is_available(&self) -> bool {
        true
    }
}

// =============================================================================
// SQLite
// =============================================================================

#[async_trait]
impl LocalStore for Database {
    async fn replace_collection(
        &self,
        collection: ReferenceCollection,
        items: &[Value],
    ) -> SyncResult<usize> {
        Ok(self.reference().replace_collection(collection, items).await?)
    }

    async fn append_operation(
        &self,
        operation_type: &OperationType,
        payload: &Value,
    ) -> SyncResult<PendingOperation> {
        Ok(self
            .pending_operations()
            .append(operation_type, payload)
            .await?)
    }

    async fn list_operations(&self) -> SyncResult<Vec<PendingOperation>> {
        Ok(self.pending_operations().list().await?)
    }

    async fn get_operation(&self, id: i64) -> SyncResult<Option<PendingOperation>> {
        Ok(self.pending_operations().get(id).await?)
    }

    async fn remove_operation(&self, id: i64) -> SyncResult<bool> {
        Ok(self.pending_operations().remove(id).await?)
    }

    async fn set_retry_count(&self, id: i64, retry_count: u32) -> SyncResult<bool> {
        Ok(self
            .pending_operations()
            .set_retry_count(id, retry_count)
            .await?)
    }

    async fn count_operations(&self) -> SyncResult<usize> {
        Ok(self.pending_operations().count().await?)
    }

    async fn retire_operation(
        &self,
        operation: &PendingOperation,
        reason: DropReason,
        last_error: Option<&str>,
    ) -> SyncResult<DroppedOperation> {
        Ok(self
            .dropped_operations()
            .retire(operation, reason, last_error)
            .await?)
    }

    async fn get_setting(&self, key: &str) -> SyncResult<Option<String>> {
        Ok(self.settings().get(key).await?)
    }

    async fn set_setting(&self, key: &str, value: &str) -> SyncResult<()> {
        Ok(self.settings().set(key, value).await?)
    }
}

// =============================================================================
// Degraded Mode
// =============================================================================

/// Stand-in used when the local store could not be opened.
///
/// Every call fails, so the engine runs online-only.
#[derive(Debug, Clone)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        UnavailableStore {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    fn error(&self) -> SyncError {
        SyncError::Store(DbError::ConnectionFailed(self.reason.clone()))
    }
}

#[async_trait]
impl LocalStore for UnavailableStore {
    async fn replace_collection(&self, _: ReferenceCollection, _: &[Value]) -> SyncResult<usize> {
        Err(self.error())
    }

    async fn append_operation(&self, _: &OperationType, _: &Value) -> SyncResult<PendingOperation> {
        Err(self.error())
    }

    async fn list_operations(&self) -> SyncResult<Vec<PendingOperation>> {
        Err(self.error())
    }

    async fn get_operation(&self, _: i64) -> SyncResult<Option<PendingOperation>> {
        Err(self.error())
    }

    async fn remove_operation(&self, _: i64) -> SyncResult<bool> {
        Err(self.error())
    }

    async fn set_retry_count(&self, _: i64, _: u32) -> SyncResult<bool> {
        Err(self.error())
    }

    async fn count_operations(&self) -> SyncResult<usize> {
        Err(self.error())
    }

    async fn retire_operation(
        &self,
        _: &PendingOperation,
        _: DropReason,
        _: Option<&str>,
    ) -> SyncResult<DroppedOperation> {
        Err(self.error())
    }

    async fn get_setting(&self, _: &str) -> SyncResult<Option<String>> {
        Err(self.error())
    }

    async fn set_setting(&self, _: &str, _: &str) -> SyncResult<()> {
        Err(self.error())
    }

    fn is_available(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use norko_db::DbConfig;
    use serde_json::json;

    #[tokio::test]
    async fn test_database_store_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store: &dyn LocalStore = &db;

        let op = store
            .append_operation(&OperationType::CreateSale, &json!({"total": 50}))
            .await
            .unwrap();
        assert_eq!(store.count_operations().await.unwrap(), 1);
        assert!(store.set_retry_count(op.id, 1).await.unwrap());
        assert_eq!(store.get_operation(op.id).await.unwrap().unwrap().retry_count, 1);

        store
            .replace_collection(ReferenceCollection::Products, &[json!({"id": 1})])
            .await
            .unwrap();
        assert_eq!(db.reference().count(ReferenceCollection::Products).await.unwrap(), 1);

        store.set_setting("lastSyncTime", "x").await.unwrap();
        assert_eq!(store.get_setting("lastSyncTime").await.unwrap().as_deref(), Some("x"));
        assert!(store.is_available());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_everything() {
        let store = UnavailableStore::new("disk full");
        assert!(!store.is_available());

        let err = store.list_operations().await.unwrap_err();
        assert!(err.is_store_failure());
        assert!(err.to_string().contains("disk full"));
        assert!(store
            .append_operation(&OperationType::CreateSale, &json!({}))
            .await
            .is_err());
    }
}
