//! In-memory fakes for engine tests.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use norko_core::{
    DropReason, DroppedOperation, OperationType, PendingOperation, ReferenceCollection,
};
use norko_db::DbError;

use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteApi;
use crate::store::LocalStore;

// =============================================================================
// Fake Store
// =============================================================================

#[derive(Default)]
struct StoreState {
    collections: HashMap<ReferenceCollection, Vec<Value>>,
    operations: Vec<PendingOperation>,
    dropped: Vec<DroppedOperation>,
    settings: HashMap<String, String>,
    next_id: i64,
}

/// Mutex-backed [`LocalStore`] that can be switched into a failing mode.
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<StoreState>,
    failing: AtomicBool,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn seed_collection(&self, collection: ReferenceCollection, items: Vec<Value>) {
        self.state.lock().unwrap().collections.insert(collection, items);
    }

    pub fn collection(&self, collection: ReferenceCollection) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn operations(&self) -> Vec<PendingOperation> {
        self.state.lock().unwrap().operations.clone()
    }

    pub fn dropped(&self) -> Vec<DroppedOperation> {
        self.state.lock().unwrap().dropped.clone()
    }

    pub fn setting(&self, key: &str) -> Option<String> {
        self.state.lock().unwrap().settings.get(key).cloned()
    }

    fn check(&self) -> SyncResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::Store(DbError::QueryFailed("disk I/O error".into())));
        }
        Ok(())
    }
}

#[async_trait]
impl LocalStore for FakeStore {
    async fn replace_collection(
        &self,
        collection: ReferenceCollection,
        items: &[Value],
    ) -> SyncResult<usize> {
        self.check()?;
        self.seed_collection(collection, items.to_vec());
        Ok(items.len())
    }

    async fn append_operation(
        &self,
        operation_type: &OperationType,
        payload: &Value,
    ) -> SyncResult<PendingOperation> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let operation = PendingOperation {
            id: state.next_id,
            operation_type: operation_type.clone(),
            payload: payload.clone(),
            retry_count: 0,
            created_at: Utc::now(),
        };
        state.operations.push(operation.clone());
        Ok(operation)
    }

    async fn list_operations(&self) -> SyncResult<Vec<PendingOperation>> {
        self.check()?;
        Ok(self.operations())
    }

    async fn get_operation(&self, id: i64) -> SyncResult<Option<PendingOperation>> {
        self.check()?;
        Ok(self.operations().into_iter().find(|o| o.id == id))
    }

    async fn remove_operation(&self, id: i64) -> SyncResult<bool> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        let before = state.operations.len();
        state.operations.retain(|o| o.id != id);
        Ok(state.operations.len() != before)
    }

    async fn set_retry_count(&self, id: i64, retry_count: u32) -> SyncResult<bool> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        match state.operations.iter_mut().find(|o| o.id == id) {
            Some(operation) => {
                operation.retry_count = retry_count;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_operations(&self) -> SyncResult<usize> {
        self.check()?;
        Ok(self.state.lock().unwrap().operations.len())
    }

    async fn retire_operation(
        &self,
        operation: &PendingOperation,
        reason: DropReason,
        last_error: Option<&str>,
    ) -> SyncResult<DroppedOperation> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        state.operations.retain(|o| o.id != operation.id);
        let dropped = DroppedOperation {
            operation: operation.clone(),
            reason,
            last_error: last_error.map(str::to_string),
            dropped_at: Utc::now(),
        };
        state.dropped.push(dropped.clone());
        Ok(dropped)
    }

    async fn get_setting(&self, key: &str) -> SyncResult<Option<String>> {
        self.check()?;
        Ok(self.setting(key))
    }

    async fn set_setting(&self, key: &str, value: &str) -> SyncResult<()> {
        self.check()?;
        self.state
            .lock()
            .unwrap()
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// =============================================================================
// Fake Remote
// =============================================================================

/// Scriptable [`RemoteApi`].
///
/// Collections default to empty arrays and sales succeed until told otherwise.
/// A gate holds every fetch until permits are added.
pub struct FakeRemote {
    collections: Mutex<HashMap<ReferenceCollection, Vec<Value>>>,
    failing_collections: Mutex<HashSet<ReferenceCollection>>,
    sale_failure: Mutex<Option<u16>>,
    reachable: AtomicBool,
    submitted: Mutex<Vec<Value>>,
    fetches: AtomicUsize,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl Default for FakeRemote {
    fn default() -> Self {
        FakeRemote {
            collections: Mutex::new(HashMap::new()),
            failing_collections: Mutex::new(HashSet::new()),
            sale_failure: Mutex::new(None),
            reachable: AtomicBool::new(true),
            submitted: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
            gate: Mutex::new(None),
        }
    }
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_collection(&self, collection: ReferenceCollection, items: Vec<Value>) {
        self.collections.lock().unwrap().insert(collection, items);
    }

    pub fn fail_collection(&self, collection: ReferenceCollection) {
        self.failing_collections.lock().unwrap().insert(collection);
    }

    /// Every following sale submission answers with `status`.
    pub fn fail_sales_with(&self, status: u16) {
        *self.sale_failure.lock().unwrap() = Some(status);
    }

    pub fn accept_sales(&self) {
        *self.sale_failure.lock().unwrap() = None;
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Holds fetches until the returned semaphore gets permits.
    pub fn hold_fetches(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn submitted(&self) -> Vec<Value> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> SyncResult<()> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(SyncError::ConnectionFailed("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn fetch_collection(&self, collection: ReferenceCollection) -> SyncResult<Vec<Value>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| SyncError::Internal("gate closed".into()))?;
        }

        self.check_reachable()?;
        if self.failing_collections.lock().unwrap().contains(&collection) {
            return Err(SyncError::MalformedResponse(format!(
                "{}: expected a JSON array, got an object",
                collection
            )));
        }

        Ok(self
            .collections
            .lock()
            .unwrap()
            .get(&collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn submit_sale(&self, payload: &Value) -> SyncResult<Value> {
        self.check_reachable()?;
        self.submitted.lock().unwrap().push(payload.clone());

        if let Some(status) = *self.sale_failure.lock().unwrap() {
            return Err(SyncError::ServerRejected {
                status,
                body: "Internal Server Error".into(),
            });
        }

        Ok(json!({"success": true}))
    }

    async fn probe(&self) -> SyncResult<()> {
        self.check_reachable()
    }
}
