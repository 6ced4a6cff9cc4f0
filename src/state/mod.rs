//! Shared application state and the roster domain.

pub mod ban;
pub mod calendar;
pub mod clock;
pub mod commands;
pub mod invitation;
pub mod liability;
pub mod notify;
pub mod player;
pub mod promotion;
pub mod roster;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use dashmap::DashMap;
use time::OffsetDateTime;
use tokio::{
    sync::{Notify, RwLock, watch},
    task::AbortHandle,
};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::roster_store::RosterStore,
    error::ServiceError,
    services::capability::CapabilityProvider,
};

pub use self::notify::{Notification, NotificationHub, NotificationKind, NotificationTarget};
use self::{
    clock::Clock,
    commands::{CommandQueue, SnapshotFrame, spawn_worker},
    roster::{Roster, RosterError},
};

/// Handle cloned into every task and handler.
pub type SharedState = Arc<AppState>;

const NOTIFICATION_CAPACITY: usize = 64;

/// Central application state: the roster command queue, storage handle and side channels.
pub struct AppState {
    config: AppConfig,
    clock: Arc<dyn Clock>,
    commands: CommandQueue,
    snapshots: watch::Receiver<SnapshotFrame>,
    roster_store: RwLock<Option<Arc<dyn RosterStore>>>,
    capabilities: Arc<dyn CapabilityProvider>,
    notifications: NotificationHub,
    invitation_timers: DashMap<String, (Uuid, AbortHandle)>,
    degraded: watch::Sender<bool>,
    restored: AtomicBool,
    flush: Notify,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] and start the roster worker.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(
        config: AppConfig,
        capabilities: Arc<dyn CapabilityProvider>,
        clock: Arc<dyn Clock>,
    ) -> SharedState {
        let roster = Roster::new(
            config.capacity,
            config.calendar.clone(),
            config.invitation_window,
        );
        let (commands, snapshots, _worker) = spawn_worker(roster, clock.clone());
        let (degraded_tx, _rx) = watch::channel(true);

        Arc::new(Self {
            config,
            clock,
            commands,
            snapshots,
            roster_store: RwLock::new(None),
            capabilities,
            notifications: NotificationHub::new(NOTIFICATION_CAPACITY),
            invitation_timers: DashMap::new(),
            degraded: degraded_tx,
            restored: AtomicBool::new(false),
            flush: Notify::new(),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Current instant according to the configured clock.
    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    /// Handle to the roster worker.
    pub fn commands(&self) -> &CommandQueue {
        &self.commands
    }

    /// Run a roster operation through the queue, flattening worker and rule errors.
    pub async fn execute<T, F>(&self, label: &'static str, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut Roster, OffsetDateTime) -> Result<T, RosterError> + Send + 'static,
        T: Send + 'static,
    {
        Ok(self.commands.run(label, work).await??)
    }

    /// Run a read-only or infallible roster job through the queue.
    pub async fn query<T, F>(&self, label: &'static str, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut Roster, OffsetDateTime) -> T + Send + 'static,
        T: Send + 'static,
    {
        Ok(self.commands.run(label, work).await?)
    }

    /// Subscribe to roster snapshots published after each mutation.
    pub fn snapshots(&self) -> watch::Receiver<SnapshotFrame> {
        self.snapshots.clone()
    }

    /// Identity and capability oracle.
    pub fn capabilities(&self) -> &dyn CapabilityProvider {
        self.capabilities.as_ref()
    }

    /// Notification fan-out.
    pub fn notifications(&self) -> &NotificationHub {
        &self.notifications
    }

    /// Expiry timers of pending invitations keyed by username.
    pub fn invitation_timers(&self) -> &DashMap<String, (Uuid, AbortHandle)> {
        &self.invitation_timers
    }

    /// Obtain a handle to the current roster store, if one is installed.
    pub async fn roster_store(&self) -> Option<Arc<dyn RosterStore>> {
        let guard = self.roster_store.read().await;
        guard.as_ref().cloned()
    }

    /// Require a roster store or report degraded mode.
    pub async fn require_roster_store(&self) -> Result<Arc<dyn RosterStore>, ServiceError> {
        self.roster_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new roster store implementation and leave degraded mode.
    pub async fn set_roster_store(&self, store: Arc<dyn RosterStore>) {
        {
            let mut guard = self.roster_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current roster store and enter degraded mode.
    pub async fn clear_roster_store(&self) {
        {
            let mut guard = self.roster_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Mark the startup restore as done; returns `false` if it already happened.
    pub fn mark_restored(&self) -> bool {
        !self.restored.swap(true, Ordering::SeqCst)
    }

    /// Whether the startup restore already ran.
    pub fn is_restored(&self) -> bool {
        self.restored.load(Ordering::SeqCst)
    }

    /// Ask the snapshot writer to persist the latest roster state.
    pub fn request_flush(&self) {
        self.flush.notify_one();
    }

    /// Wait until a flush is requested.
    pub async fn flush_requested(&self) {
        self.flush.notified().await;
    }
}
