//! # Status Reporter
//!
//! Read-only view composed on demand from the live components. Nothing here
//! is a source of truth; every call recomputes the snapshot.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use norko_core::SyncStatus;

use crate::connectivity::ConnectivityMonitor;
use crate::session::SyncSession;
use crate::store::LocalStore;

pub struct StatusReporter {
    monitor: Arc<ConnectivityMonitor>,
    session: Arc<SyncSession>,
    store: Arc<dyn LocalStore>,
    last_sync: RwLock<Option<DateTime<Utc>>>,
    offline_capable: AtomicBool,
}

impl StatusReporter {
    pub fn new(
        monitor: Arc<ConnectivityMonitor>,
        session: Arc<SyncSession>,
        store: Arc<dyn LocalStore>,
    ) -> Self {
        let offline_capable = store.is_available();
        StatusReporter {
            monitor,
            session,
            store,
            last_sync: RwLock::new(None),
            offline_capable: AtomicBool::new(offline_capable),
        }
    }

    /// Current snapshot.
    ///
    /// A failing count is reported as 0 and flips `offline_capable` off.
    pub async fn get_status(&self) -> SyncStatus {
        let pending_operation_count = if self.store.is_available() {
            match self.store.count_operations().await {
                Ok(count) => count,
                Err(e) => {
                    warn!(error = %e, "Failed to count pending operations");
                    self.set_offline_capable(false);
                    0
                }
            }
        } else {
            0
        };

        SyncStatus {
            is_online: self.monitor.is_online(),
            sync_in_progress: self.session.in_progress(),
            last_sync_time: *self.last_sync.read().await,
            pending_operation_count,
            offline_capable: self.offline_capable(),
        }
    }

    pub async fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.read().await
    }

    pub(crate) async fn set_last_sync_time(&self, at: DateTime<Utc>) {
        *self.last_sync.write().await = Some(at);
    }

    pub fn offline_capable(&self) -> bool {
        self.offline_capable.load(Ordering::Acquire)
    }

    pub(crate) fn set_offline_capable(&self, capable: bool) {
        self.offline_capable.store(capable, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::UnavailableStore;
    use crate::testing::FakeStore;
    use norko_core::{ConnectivityState, OperationType};
    use serde_json::json;

    #[tokio::test]
    async fn test_status_composes_components() {
        let monitor = Arc::new(ConnectivityMonitor::new(ConnectivityState::Offline));
        let session = Arc::new(SyncSession::new());
        let store = Arc::new(FakeStore::new());
        store
            .append_operation(&OperationType::CreateSale, &json!({}))
            .await
            .unwrap();

        let reporter = StatusReporter::new(monitor.clone(), session.clone(), store.clone());
        let status = reporter.get_status().await;
        assert!(!status.is_online);
        assert!(!status.sync_in_progress);
        assert_eq!(status.pending_operation_count, 1);
        assert_eq!(status.last_sync_time, None);
        assert!(status.offline_capable);

        monitor.observe(ConnectivityState::Online);
        let _pass = session.try_begin().unwrap();
        let at = Utc::now();
        reporter.set_last_sync_time(at).await;

        let status = reporter.get_status().await;
        assert!(status.is_online);
        assert!(status.sync_in_progress);
        assert_eq!(status.last_sync_time, Some(at));
    }

    #[tokio::test]
    async fn test_unavailable_store_reports_degraded() {
        let reporter = StatusReporter::new(
            Arc::new(ConnectivityMonitor::new(ConnectivityState::Online)),
            Arc::new(SyncSession::new()),
            Arc::new(UnavailableStore::new("no disk")),
        );

        let status = reporter.get_status().await;
        assert!(!status.offline_capable);
        assert_eq!(status.pending_operation_count, 0);
    }

    #[tokio::test]
    async fn test_count_failure_flips_offline_capable() {
        let store = Arc::new(FakeStore::new());
        let reporter = StatusReporter::new(
            Arc::new(ConnectivityMonitor::new(ConnectivityState::Online)),
            Arc::new(SyncSession::new()),
            store.clone(),
        );

        store.set_failing(true);
        assert!(!reporter.get_status().await.offline_capable);
    }
}
