//! # Reference Repository
//!
//! Cached snapshots of the server's reference collections.
//!
//! ## Snapshot Replacement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  replace_collection("products", items)                 │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │                                                                 │   │
//! │  │  1. DELETE FROM reference_items WHERE collection = 'products'  │   │
//! │  │  2. INSERT one row per item, position = index in server array  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← readers see the old snapshot or the new one, never a mix    │
//! │                                                                         │
//! │  No merge: the server's array is the whole truth (last write wins).    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use norko_core::ReferenceCollection;

/// Repository for cached reference collections.
#[derive(Debug, Clone)]
pub struct ReferenceRepository {
    pool: SqlitePool,
}

impl ReferenceRepository {
    /// Creates a new ReferenceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReferenceRepository { pool }
    }

    /// Atomically replaces the local snapshot of `collection` with `items`.
    ///
    /// ## Returns
    /// Number of items stored.
    pub async fn replace_collection(
        &self,
        collection: ReferenceCollection,
        items: &[Value],
    ) -> DbResult<usize> {
        let now = Utc::now();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        sqlx::query("DELETE FROM reference_items WHERE collection = ?1")
            .bind(collection.name())
            .execute(&mut *tx)
            .await?;

        for (position, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO reference_items (collection, position, item_id, data, synced_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(collection.name())
            .bind(position as i64)
            .bind(item_id(item))
            .bind(serde_json::to_string(item)?)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(collection = %collection, count = items.len(), "Replaced reference snapshot");
        Ok(items.len())
    }

    /// Returns the cached snapshot in server order.
    pub async fn list(&self, collection: ReferenceCollection) -> DbResult<Vec<Value>> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT data FROM reference_items WHERE collection = ?1 ORDER BY position",
        )
        .bind(collection.name())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|data| serde_json::from_str(data).map_err(DbError::from))
            .collect()
    }

    /// Number of cached items in `collection`.
    pub async fn count(&self, collection: ReferenceCollection) -> DbResult<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM reference_items WHERE collection = ?1")
                .bind(collection.name())
                .fetch_one(&self.pool)
                .await?;

        Ok(count as usize)
    }

    /// Looks up a cached item by its server id.
    pub async fn get(&self, collection: ReferenceCollection, id: &str) -> DbResult<Option<Value>> {
        let data: Option<String> = sqlx::query_scalar(
            "SELECT data FROM reference_items WHERE collection = ?1 AND item_id = ?2 LIMIT 1",
        )
        .bind(collection.name())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        data.map(|d| serde_json::from_str(&d).map_err(DbError::from))
            .transpose()
    }

    /// Case-insensitive substring search over the cached items.
    ///
    /// Matches the `name`, `name_ar`, `barcode` and `phone` fields, so the
    /// register can look up products and customers while offline. An empty
    /// term returns the first `limit` items.
    pub async fn search(
        &self,
        collection: ReferenceCollection,
        term: &str,
        limit: u32,
    ) -> DbResult<Vec<Value>> {
        let term = term.trim();
        debug!(collection = %collection, term = %term, limit, "Searching reference cache");

        let pattern = format!("%{}%", escape_like(term));
        let rows: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT data FROM reference_items
            WHERE collection = ?1
            AND (
                ?2 = '%%'
                OR json_extract(data, '$.name') LIKE ?2 ESCAPE '\'
                OR json_extract(data, '$.name_ar') LIKE ?2 ESCAPE '\'
                OR json_extract(data, '$.barcode') LIKE ?2 ESCAPE '\'
                OR json_extract(data, '$.phone') LIKE ?2 ESCAPE '\'
            )
            ORDER BY position
            LIMIT ?3
            "#,
        )
        .bind(collection.name())
        .bind(pattern)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|data| serde_json::from_str(data).map_err(DbError::from))
            .collect()
    }
}

/// Server id of an item, when it carries one.
fn item_id(item: &Value) -> Option<String> {
    match item.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
