//! # Settings Repository
//!
//! String key/value settings (`lastSyncTime`, ...).

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::DbResult;

/// Repository for key/value settings.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Creates a new SettingsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    pub async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    /// Inserts or overwrites `key`.
    pub async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete(&self, key: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_set_get_overwrite() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let settings = db.settings();

        assert_eq!(settings.get("lastSyncTime").await.unwrap(), None);

        settings.set("lastSyncTime", "2024-01-01T00:00:00Z").await.unwrap();
        settings.set("lastSyncTime", "2024-02-01T00:00:00Z").await.unwrap();
        assert_eq!(
            settings.get("lastSyncTime").await.unwrap().as_deref(),
            Some("2024-02-01T00:00:00Z")
        );

        settings.delete("lastSyncTime").await.unwrap();
        assert_eq!(settings.get("lastSyncTime").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_settings_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("norko.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        db.settings().set("device", "till-2").await.unwrap();
        db.close().await;

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        assert_eq!(db.settings().get("device").await.unwrap().as_deref(), Some("till-2"));
    }
}
