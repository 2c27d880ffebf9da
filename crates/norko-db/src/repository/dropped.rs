//! # Dropped Operation Repository
//!
//! Dead-letter ledger for mutations that left the queue without reaching the
//! server. Retiring an operation moves it here in one transaction, so it is
//! never in both tables and never in neither.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::warn;

use crate::error::{DbError, DbResult};
use crate::repository::pending::PendingOperationRow;
use norko_core::{DropReason, DroppedOperation, PendingOperation};

#[derive(Debug, sqlx::FromRow)]
struct DroppedOperationRow {
    operation_id: i64,
    operation_type: String,
    payload: String,
    retry_count: i64,
    created_at: DateTime<Utc>,
    reason: String,
    last_error: Option<String>,
    dropped_at: DateTime<Utc>,
}

impl TryFrom<DroppedOperationRow> for DroppedOperation {
    type Error = DbError;

    fn try_from(row: DroppedOperationRow) -> Result<Self, Self::Error> {
        let reason = DropReason::parse(&row.reason)
            .ok_or_else(|| DbError::InvalidData(format!("unknown drop reason '{}'", row.reason)))?;

        let operation = PendingOperation::try_from(PendingOperationRow {
            id: row.operation_id,
            operation_type: row.operation_type,
            payload: row.payload,
            retry_count: row.retry_count,
            created_at: row.created_at,
        })?;

        Ok(DroppedOperation {
            operation,
            reason,
            last_error: row.last_error,
            dropped_at: row.dropped_at,
        })
    }
}

/// Repository for the dropped operation ledger.
#[derive(Debug, Clone)]
pub struct DroppedOperationRepository {
    pool: SqlitePool,
}

impl DroppedOperationRepository {
    /// Creates a new DroppedOperationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DroppedOperationRepository { pool }
    }

    /// Removes `operation` from the pending queue and records it in the ledger.
    ///
    /// `operation.retry_count` is stored as given, so callers pass the final count.
    pub async fn retire(
        &self,
        operation: &PendingOperation,
        reason: DropReason,
        last_error: Option<&str>,
    ) -> DbResult<DroppedOperation> {
        let now = Utc::now();
        let payload = serde_json::to_string(&operation.payload)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO dropped_operations (
                operation_id, operation_type, payload, retry_count, created_at,
                reason, last_error, dropped_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(operation.id)
        .bind(operation.operation_type.as_tag())
        .bind(&payload)
        .bind(operation.retry_count as i64)
        .bind(operation.created_at)
        .bind(reason.as_str())
        .bind(last_error)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM pending_operations WHERE id = ?1")
            .bind(operation.id)
            .execute(&mut *tx)
            .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        warn!(
            id = operation.id,
            operation_type = %operation.operation_type,
            reason = %reason,
            "Operation moved to dropped ledger"
        );

        Ok(DroppedOperation {
            operation: operation.clone(),
            reason,
            last_error: last_error.map(str::to_string),
            dropped_at: now,
        })
    }

    /// Every dropped operation, oldest drop first.
    pub async fn list(&self) -> DbResult<Vec<DroppedOperation>> {
        let rows: Vec<DroppedOperationRow> = sqlx::query_as(
            r#"
            SELECT operation_id, operation_type, payload, retry_count, created_at,
                   reason, last_error, dropped_at
            FROM dropped_operations
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DroppedOperation::try_from).collect()
    }

    pub async fn count(&self) -> DbResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dropped_operations")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use norko_core::{DropReason, OperationType};
    use serde_json::json;

    #[tokio::test]
    async fn test_retire_moves_operation_atomically() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let pending = db.pending_operations();
        let dropped = db.dropped_operations();

        let mut op = pending
            .append(&OperationType::CreateSale, &json!({"total": 50}))
            .await
            .unwrap();
        let keep = pending
            .append(&OperationType::CreateSale, &json!({"total": 60}))
            .await
            .unwrap();
        op.retry_count = 3;

        let record = dropped
            .retire(&op, DropReason::RetriesExhausted, Some("HTTP 500"))
            .await
            .unwrap();
        assert_eq!(record.operation.id, op.id);

        let remaining = pending.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);

        let ledger = dropped.list().await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].reason, DropReason::RetriesExhausted);
        assert_eq!(ledger[0].operation.retry_count, 3);
        assert_eq!(ledger[0].operation.payload, json!({"total": 50}));
        assert_eq!(ledger[0].last_error.as_deref(), Some("HTTP 500"));
    }

    #[tokio::test]
    async fn test_unsupported_tag_kept_verbatim() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let op = db
            .pending_operations()
            .append(&OperationType::from_tag("adjust_stock"), &json!([1, 2]))
            .await
            .unwrap();

        db.dropped_operations()
            .retire(&op, DropReason::UnsupportedType, None)
            .await
            .unwrap();

        let ledger = db.dropped_operations().list().await.unwrap();
        assert_eq!(ledger[0].operation.operation_type.as_tag(), "adjust_stock");
        assert_eq!(ledger[0].last_error, None);
        assert_eq!(db.dropped_operations().count().await.unwrap(), 1);
        assert_eq!(db.pending_operations().count().await.unwrap(), 0);
    }
}
