pub mod local;
pub mod model;
pub mod reconciler;
mod sse;
mod subscription;

use std::{collections::BTreeSet, sync::Arc};

use tokio::sync::{Mutex, RwLock, watch};

use crate::{
    config::AssistantConfig,
    dao::{queue_store::QueueStore, snapshot::SnapshotStore},
    dto::state::SyncFlags,
    services::assistant_service::Assistant,
    state::{local::LocalState, model::Mode, reconciler::RemoteChange},
};

pub use self::sse::SseHub;
pub use self::subscription::Subscription;

pub type SharedState = Arc<AppState>;

const SSE_CAPACITY: usize = 32;

/// Central application state: the local queue and tables, the operating mode and the storage
/// handles that feed them.
pub struct AppState {
    local: RwLock<LocalState>,
    mode: RwLock<Mode>,
    queue_store: RwLock<Option<Arc<dyn QueueStore>>>,
    snapshots: Arc<dyn SnapshotStore>,
    subscription: Mutex<Option<Subscription>>,
    pending_changes: Mutex<Option<Vec<RemoteChange>>>,
    missing_tables: RwLock<BTreeSet<String>>,
    sse: SseHub,
    degraded: watch::Sender<bool>,
    mode_gate: Mutex<()>,
    assistant: Assistant,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// Connected mode starts degraded until a queue store is installed.
    pub fn new(
        mode: Mode,
        snapshots: Arc<dyn SnapshotStore>,
        assistant: AssistantConfig,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(mode == Mode::Connected);
        Arc::new(Self {
            local: RwLock::new(LocalState::new()),
            mode: RwLock::new(mode),
            queue_store: RwLock::new(None),
            snapshots,
            subscription: Mutex::new(None),
            pending_changes: Mutex::new(None),
            missing_tables: RwLock::new(BTreeSet::new()),
            sse: SseHub::new(SSE_CAPACITY),
            degraded: degraded_tx,
            mode_gate: Mutex::new(()),
            assistant: Assistant::new(assistant),
        })
    }

    /// The queue and tables currently shown to viewers.
    pub fn local(&self) -> &RwLock<LocalState> {
        &self.local
    }

    /// Copy of the local state.
    pub async fn local_snapshot(&self) -> LocalState {
        self.local.read().await.clone()
    }

    pub async fn mode(&self) -> Mode {
        *self.mode.read().await
    }

    pub(crate) async fn set_mode(&self, mode: Mode) {
        *self.mode.write().await = mode;
        self.refresh_degraded().await;
    }

    /// Serialises mode switches and connection (re)establishment.
    pub(crate) fn mode_gate(&self) -> &Mutex<()> {
        &self.mode_gate
    }

    /// Obtain a handle to the current queue store, if one is installed.
    pub async fn queue_store(&self) -> Option<Arc<dyn QueueStore>> {
        let guard = self.queue_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a queue store implementation and leave degraded mode.
    pub async fn install_queue_store(&self, store: Arc<dyn QueueStore>) {
        {
            let mut guard = self.queue_store.write().await;
            *guard = Some(store);
        }
        self.refresh_degraded().await;
    }

    /// Remove the current queue store; connected mode becomes degraded.
    pub async fn clear_queue_store(&self) {
        {
            let mut guard = self.queue_store.write().await;
            guard.take();
        }
        self.refresh_degraded().await;
    }

    /// Connected mode without an installed queue store.
    pub async fn is_degraded(&self) -> bool {
        self.mode().await == Mode::Connected && self.queue_store.read().await.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    async fn refresh_degraded(&self) {
        let value = self.is_degraded().await;
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }

    /// Durable store used in local-only mode.
    pub fn snapshots(&self) -> &dyn SnapshotStore {
        self.snapshots.as_ref()
    }

    /// Live change-feed forwarders, present while connected and subscribed.
    pub(crate) fn subscription(&self) -> &Mutex<Option<Subscription>> {
        &self.subscription
    }

    /// Remote changes held back while a resync fetches; `None` outside a resync.
    pub(crate) fn pending_changes(&self) -> &Mutex<Option<Vec<RemoteChange>>> {
        &self.pending_changes
    }

    /// Record a table reported missing by the store. Returns `true` when it was not known.
    pub async fn mark_table_missing(&self, table: &str) -> bool {
        self.missing_tables.write().await.insert(table.to_string())
    }

    /// Forget every missing table. Returns `true` when any was recorded.
    pub async fn clear_missing_tables(&self) -> bool {
        let mut guard = self.missing_tables.write().await;
        let had_any = !guard.is_empty();
        guard.clear();
        had_any
    }

    pub async fn setup_required(&self) -> bool {
        !self.missing_tables.read().await.is_empty()
    }

    /// Connection flags shown alongside the local collections.
    pub async fn sync_flags(&self) -> SyncFlags {
        SyncFlags {
            degraded: self.is_degraded().await,
            missing_tables: self.missing_tables.read().await.iter().cloned().collect(),
        }
    }

    /// Broadcast hub used for the state SSE stream.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }

    pub fn assistant(&self) -> &Assistant {
        &self.assistant
    }
}
