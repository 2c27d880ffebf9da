//! # Reconciliation Puller
//!
//! Refreshes the cached reference collections from the server.
//!
//! Every configured collection is fetched concurrently and replaced as a full
//! snapshot. One collection failing never blocks the others and is only
//! logged; reference data is best effort.

use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{error, info, warn};

use norko_core::ReferenceCollection;

use crate::remote::RemoteApi;
use crate::session::ActivePass;
use crate::store::LocalStore;

/// Result of one pull phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    pub updated: Vec<ReferenceCollection>,
    pub failed: Vec<ReferenceCollection>,

    /// Collections fetched fine but not saved locally.
    pub store_failures: usize,

    /// The pass went stale and pulled data was thrown away.
    pub discarded: bool,
}

pub struct ReconciliationPuller {
    remote: Arc<dyn RemoteApi>,
    store: Arc<dyn LocalStore>,
    collections: Vec<ReferenceCollection>,
}

impl ReconciliationPuller {
    pub fn new(
        remote: Arc<dyn RemoteApi>,
        store: Arc<dyn LocalStore>,
        collections: Vec<ReferenceCollection>,
    ) -> Self {
        ReconciliationPuller {
            remote,
            store,
            collections,
        }
    }

    pub fn collections(&self) -> &[ReferenceCollection] {
        &self.collections
    }

    /// Fetches every collection, then replaces each local snapshot while the
    /// pass is still current.
    pub async fn pull(&self, pass: &ActivePass) -> PullReport {
        let fetches = self.collections.iter().map(|&collection| {
            let remote = Arc::clone(&self.remote);
            async move { (collection, remote.fetch_collection(collection).await) }
        });
        let results = join_all(fetches).await;

        let mut report = PullReport::default();

        for (collection, result) in results {
            if !pass.is_current() {
                info!("Sync pass abandoned, discarding pulled reference data");
                report.discarded = true;
                break;
            }

            let items = match result {
                Ok(items) => items,
                Err(e) => {
                    warn!(collection = %collection, error = %e, "Failed to pull reference collection");
                    report.failed.push(collection);
                    continue;
                }
            };

            match self.store.replace_collection(collection, &items).await {
                Ok(count) => {
                    info!(collection = %collection, count, "Reference collection refreshed");
                    report.updated.push(collection);
                }
                Err(e) => {
                    error!(collection = %collection, error = %e, "Failed to save reference collection");
                    report.store_failures += 1;
                    report.failed.push(collection);
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SyncSession;
    use crate::testing::{FakeRemote, FakeStore};
    use serde_json::json;

    fn puller(remote: &Arc<FakeRemote>, store: &Arc<FakeStore>) -> ReconciliationPuller {
        ReconciliationPuller::new(
            remote.clone(),
            store.clone(),
            ReferenceCollection::ALL.to_vec(),
        )
    }

    #[tokio::test]
    async fn test_pull_replaces_every_collection() {
        let remote = Arc::new(FakeRemote::new());
        let store = Arc::new(FakeStore::new());
        store.seed_collection(ReferenceCollection::Products, vec![json!({"id": 99})]);
        remote.set_collection(
            ReferenceCollection::Products,
            vec![json!({"id": 1}), json!({"id": 2})],
        );

        let session = Arc::new(SyncSession::new());
        let pass = session.try_begin().unwrap();
        let report = puller(&remote, &store).pull(&pass).await;

        assert_eq!(report.updated.len(), 3);
        assert!(report.failed.is_empty());
        assert_eq!(
            store.collection(ReferenceCollection::Products),
            vec![json!({"id": 1}), json!({"id": 2})]
        );
    }

    #[tokio::test]
    async fn test_one_failing_collection_does_not_block_others() {
        let remote = Arc::new(FakeRemote::new());
        let store = Arc::new(FakeStore::new());
        remote.fail_collection(ReferenceCollection::Categories);
        remote.set_collection(ReferenceCollection::Customers, vec![json!({"id": 7})]);

        let session = Arc::new(SyncSession::new());
        let pass = session.try_begin().unwrap();
        let report = puller(&remote, &store).pull(&pass).await;

        assert_eq!(report.failed, vec![ReferenceCollection::Categories]);
        assert_eq!(report.updated.len(), 2);
        assert_eq!(report.store_failures, 0);
        assert_eq!(store.collection(ReferenceCollection::Customers).len(), 1);
    }

    #[tokio::test]
    async fn test_stale_pass_discards_results() {
        let remote = Arc::new(FakeRemote::new());
        let store = Arc::new(FakeStore::new());
        store.seed_collection(ReferenceCollection::Products, vec![json!({"id": 99})]);

        let session = Arc::new(SyncSession::new());
        let pass = session.try_begin().unwrap();
        session.abandon();

        let report = puller(&remote, &store).pull(&pass).await;
        assert!(report.discarded);
        assert!(report.updated.is_empty());
        assert_eq!(store.collection(ReferenceCollection::Products), vec![json!({"id": 99})]);
    }
}
