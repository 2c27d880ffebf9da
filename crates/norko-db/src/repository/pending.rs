//! # Pending Operation Repository
//!
//! Durable FIFO of locally committed mutations the server has not confirmed.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Pending Operation Lifecycle                          │
//! │                                                                         │
//! │  record_sale()                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  append(create_sale, payload) ──► id (monotonic), retry_count = 0      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  list() ◄── pusher drains in id order                                  │
//! │       │                                                                 │
//! │       ├── server accepted  ──► remove(id)                              │
//! │       ├── server refused   ──► set_retry_count(id, n + 1)              │
//! │       └── n + 1 == max     ──► DroppedOperationRepository::retire()    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use norko_core::{OperationType, PendingOperation};

/// Row shape of `pending_operations`.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PendingOperationRow {
    pub id: i64,
    pub operation_type: String,
    pub payload: String,
    pub retry_count: i64,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PendingOperationRow> for PendingOperation {
    type Error = DbError;

    fn try_from(row: PendingOperationRow) -> Result<Self, Self::Error> {
        Ok(PendingOperation {
            id: row.id,
            operation_type: OperationType::from_tag(&row.operation_type),
            payload: serde_json::from_str(&row.payload)?,
            retry_count: u32::try_from(row.retry_count).map_err(|_| {
                DbError::InvalidData(format!(
                    "pending operation {} has retry_count {}",
                    row.id, row.retry_count
                ))
            })?,
            created_at: row.created_at,
        })
    }
}

/// Repository for the pending operation queue.
#[derive(Debug, Clone)]
pub struct PendingOperationRepository {
    pool: SqlitePool,
}

impl PendingOperationRepository {
    /// Creates a new PendingOperationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PendingOperationRepository { pool }
    }

    /// Appends an operation with `retry_count` 0.
    ///
    /// The returned id is usable immediately; nothing here touches the network.
    pub async fn append(
        &self,
        operation_type: &OperationType,
        payload: &Value,
    ) -> DbResult<PendingOperation> {
        let now = Utc::now();
        let payload_json = serde_json::to_string(payload)?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO pending_operations (operation_type, payload, retry_count, created_at)
            VALUES (?1, ?2, 0, ?3)
            RETURNING id
            "#,
        )
        .bind(operation_type.as_tag())
        .bind(&payload_json)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        debug!(id, operation_type = %operation_type, "Queued pending operation");

        Ok(PendingOperation {
            id,
            operation_type: operation_type.clone(),
            payload: payload.clone(),
            retry_count: 0,
            created_at: now,
        })
    }

    /// All pending operations in insertion order.
    pub async fn list(&self) -> DbResult<Vec<PendingOperation>> {
        let rows: Vec<PendingOperationRow> = sqlx::query_as(
            r#"
            SELECT id, operation_type, payload, retry_count, created_at
            FROM pending_operations
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PendingOperation::try_from).collect()
    }

    /// Fetches one operation.
    pub async fn get(&self, id: i64) -> DbResult<Option<PendingOperation>> {
        let row: Option<PendingOperationRow> = sqlx::query_as(
            r#"
            SELECT id, operation_type, payload, retry_count, created_at
            FROM pending_operations
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PendingOperation::try_from).transpose()
    }

    /// Deletes an operation. Removing a missing id is a no-op.
    ///
    /// ## Returns
    /// Whether a row was deleted.
    pub async fn remove(&self, id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM pending_operations WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Persists a new retry count.
    ///
    /// ## Returns
    /// Whether the operation still existed.
    pub async fn set_retry_count(&self, id: i64, retry_count: u32) -> DbResult<bool> {
        let result = sqlx::query("UPDATE pending_operations SET retry_count = ?2 WHERE id = ?1")
            .bind(id)
            .bind(retry_count as i64)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of pending operations.
    pub async fn count(&self) -> DbResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_operations")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use serde_json::json;

    async fn repo() -> PendingOperationRepository {
        Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .pending_operations()
    }

    #[tokio::test]
    async fn test_append_then_list_is_fifo() {
        let repo = repo().await;

        for total in [10, 20, 30] {
            repo.append(&OperationType::CreateSale, &json!({ "total": total }))
                .await
                .unwrap();
        }

        let ops = repo.list().await.unwrap();
        let totals: Vec<_> = ops.iter().map(|o| o.payload["total"].clone()).collect();
        assert_eq!(totals, vec![json!(10), json!(20), json!(30)]);
        assert!(ops.windows(2).all(|w| w[0].id < w[1].id));
        assert!(ops.iter().all(|o| o.retry_count == 0));
    }

    #[tokio::test]
    async fn test_ids_never_reused_after_removal() {
        let repo = repo().await;
        let a = repo.append(&OperationType::CreateSale, &json!({})).await.unwrap();
        assert!(repo.remove(a.id).await.unwrap());

        let b = repo.append(&OperationType::CreateSale, &json!({})).await.unwrap();
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let repo = repo().await;
        let op = repo.append(&OperationType::CreateSale, &json!({})).await.unwrap();

        assert!(repo.remove(op.id).await.unwrap());
        assert!(!repo.remove(op.id).await.unwrap());
        assert!(!repo.remove(12345).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_retry_count_and_unknown_tags_survive_storage() {
        let repo = repo().await;
        let op = repo
            .append(&OperationType::from_tag("void_sale"), &json!({"sale_id": 4}))
            .await
            .unwrap();

        assert!(repo.set_retry_count(op.id, 2).await.unwrap());
        assert!(!repo.set_retry_count(op.id + 100, 1).await.unwrap());

        let stored = repo.get(op.id).await.unwrap().unwrap();
        assert_eq!(stored.retry_count, 2);
        assert_eq!(
            stored.operation_type,
            OperationType::Unsupported("void_sale".to_string())
        );
        assert_eq!(stored.payload, json!({"sale_id": 4}));
    }
}
