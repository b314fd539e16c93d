use async_trait::async_trait;
use chrono::Utc;
use hearth_sync::{
    ConnectionPool, ConnectivityGate, LocalStore, MutationService, OperationStatus, OperationType,
    Outbox, PullRequest, PullResponse, PushOperationResult, PushRequest, PushResponse, ServerId,
    SqliteLocalStore, SqliteOutbox, SqliteSyncState, SyncConfig, SyncEngine, SyncStateStore,
    SyncTransport, TransportError, WatchConnectivityGate,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

type PushHandler = Box<dyn FnOnce(&PushRequest) -> Result<PushResponse, TransportError> + Send>;
type PullHandler = Box<dyn FnOnce(&PullRequest) -> Result<PullResponse, TransportError> + Send>;

/// Scripted transport double. Queued handlers answer requests in order; with
/// no handler queued, pushes succeed with echoed results and pulls come back
/// empty. All requests are recorded for assertions.
pub struct StubTransport {
    next_server_id: AtomicI64,
    push_handlers: Mutex<VecDeque<PushHandler>>,
    pull_handlers: Mutex<VecDeque<PullHandler>>,
    pushes: Mutex<Vec<PushRequest>>,
    pulls: Mutex<Vec<PullRequest>>,
}

impl StubTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_server_id: AtomicI64::new(100),
            push_handlers: Mutex::new(VecDeque::new()),
            pull_handlers: Mutex::new(VecDeque::new()),
            pushes: Mutex::new(Vec::new()),
            pulls: Mutex::new(Vec::new()),
        })
    }

    pub fn expect_push<F>(&self, handler: F)
    where
        F: FnOnce(&PushRequest) -> Result<PushResponse, TransportError> + Send + 'static,
    {
        self.push_handlers
            .lock()
            .unwrap()
            .push_back(Box::new(handler));
    }

    pub fn expect_pull<F>(&self, handler: F)
    where
        F: FnOnce(&PullRequest) -> Result<PullResponse, TransportError> + Send + 'static,
    {
        self.pull_handlers
            .lock()
            .unwrap()
            .push_back(Box::new(handler));
    }

    pub fn recorded_pushes(&self) -> Vec<PushRequest> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn recorded_pulls(&self) -> Vec<PullRequest> {
        self.pulls.lock().unwrap().clone()
    }

    fn default_push(&self, request: &PushRequest) -> PushResponse {
        let results = request
            .operations
            .iter()
            .map(|op| {
                let status = match op.operation_type {
                    OperationType::Create => OperationStatus::Created,
                    OperationType::Update => OperationStatus::Updated,
                    OperationType::Delete => OperationStatus::Deleted,
                    OperationType::Toggle => OperationStatus::Toggled,
                };
                let server_id = op.server_id.or_else(|| {
                    Some(
                        ServerId::new(self.next_server_id.fetch_add(1, Ordering::SeqCst))
                            .unwrap(),
                    )
                });
                PushOperationResult {
                    local_id: op.local_id,
                    server_id,
                    status,
                    version: op.version.or(Some(1)),
                    server_updated_at: Some(Utc::now()),
                    error: None,
                }
            })
            .collect();

        PushResponse {
            success: true,
            results,
            server_time: Utc::now(),
        }
    }
}

#[async_trait]
impl SyncTransport for StubTransport {
    async fn push(&self, request: PushRequest) -> Result<PushResponse, TransportError> {
        self.pushes.lock().unwrap().push(request.clone());
        let handler = self.push_handlers.lock().unwrap().pop_front();
        match handler {
            Some(handler) => handler(&request),
            None => Ok(self.default_push(&request)),
        }
    }

    async fn pull(&self, request: PullRequest) -> Result<PullResponse, TransportError> {
        self.pulls.lock().unwrap().push(request.clone());
        let handler = self.pull_handlers.lock().unwrap().pop_front();
        match handler {
            Some(handler) => handler(&request),
            None => Ok(PullResponse {
                success: true,
                data: Default::default(),
                server_time: Utc::now(),
            }),
        }
    }
}

pub struct TestEnv {
    pub pool: ConnectionPool,
    pub store: Arc<dyn LocalStore>,
    pub outbox: Arc<dyn Outbox>,
    pub sync_state: Arc<dyn SyncStateStore>,
    pub connectivity: Arc<WatchConnectivityGate>,
    pub transport: Arc<StubTransport>,
    pub mutations: MutationService,
    pub engine: Arc<SyncEngine>,
}

pub async fn build_env(online: bool) -> TestEnv {
    let pool = ConnectionPool::from_memory().await.unwrap();
    build_env_with_pool(pool, online).await
}

pub async fn build_env_with_pool(pool: ConnectionPool, online: bool) -> TestEnv {
    pool.migrate().await.unwrap();

    let store: Arc<dyn LocalStore> = Arc::new(SqliteLocalStore::new(pool.get_pool().clone()));
    let outbox: Arc<dyn Outbox> = Arc::new(SqliteOutbox::new(pool.get_pool().clone()));
    let sync_state: Arc<dyn SyncStateStore> =
        Arc::new(SqliteSyncState::new(pool.get_pool().clone()));
    let connectivity = Arc::new(WatchConnectivityGate::new(online));
    let transport = StubTransport::new();
    let config = SyncConfig::default();

    let mutations = MutationService::new(store.clone(), outbox.clone(), config.clone());
    let engine = SyncEngine::new(
        store.clone(),
        outbox.clone(),
        transport.clone(),
        connectivity.clone() as Arc<dyn ConnectivityGate>,
        sync_state.clone(),
        config,
    );

    TestEnv {
        pool,
        store,
        outbox,
        sync_state,
        connectivity,
        transport,
        mutations,
        engine,
    }
}
