use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use tracing::{debug, info, warn};

use broker_auth::{SessionListener, UserProfile};
use broker_flux::{Bus, SubscriptionId};

use crate::event::{AppEvent, AppEventKind};
use crate::messages::{LiveConnection, MessageService, is_unread_message};

/// Point-in-time copy of the app state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSnapshot {
    pub is_logged_in: bool,
    pub user_info: Option<UserProfile>,
    pub unread_count: u32,
    pub live_connected: bool,
}

/// Process-wide app state, shared by `Arc`.
///
/// Login state changes go through [`set_login_status`](Self::set_login_status),
/// which updates the snapshot and notifies subscribers before returning.
/// It never navigates.
pub struct AppState {
    snapshot: RwLock<AppSnapshot>,
    bus: Bus<AppEvent>,
    messages: Arc<dyn MessageService>,
    live: Mutex<Option<Box<dyn LiveConnection>>>,
    /// Bumped on every login-state change; async follow-ups of an older
    /// change are discarded.
    generation: AtomicU64,
}

impl AppState {
    pub fn new(messages: Arc<dyn MessageService>) -> Self {
        Self {
            snapshot: RwLock::new(AppSnapshot::default()),
            bus: Bus::new(),
            messages,
            live: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    // ── Reads ──

    pub fn snapshot(&self) -> AppSnapshot {
        self.snapshot.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.snapshot.read().unwrap_or_else(|e| e.into_inner()).is_logged_in
    }

    pub fn user_info(&self) -> Option<UserProfile> {
        self.snapshot.read().unwrap_or_else(|e| e.into_inner()).user_info.clone()
    }

    pub fn unread_count(&self) -> u32 {
        self.snapshot.read().unwrap_or_else(|e| e.into_inner()).unread_count
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, AppSnapshot> {
        self.snapshot.write().unwrap_or_else(|e| e.into_inner())
    }

    // ── Events ──

    pub fn on<F>(&self, kind: AppEventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&AppEvent) + Send + Sync + 'static,
    {
        self.bus.on(kind, handler)
    }

    pub fn off(&self, id: SubscriptionId) -> bool {
        self.bus.off(id)
    }

    pub fn emit(&self, event: &AppEvent) -> usize {
        self.bus.emit(event)
    }

    // ── Mutators ──

    /// Set the login state and broadcast it.
    ///
    /// Logging in then loads the unread count and opens the live channel.
    /// Logging out resets the unread count and closes the channel.
    pub async fn set_login_status(&self, is_logged_in: bool, user_info: Option<UserProfile>) {
        let user_info = if is_logged_in { user_info } else { None };
        let generation = {
            let mut snap = self.write();
            snap.is_logged_in = is_logged_in;
            snap.user_info = user_info.clone();
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        info!("app: logged_in={}", is_logged_in);
        self.emit(&AppEvent::LoginStateChange {
            is_logged_in,
            user_info,
        });

        if is_logged_in {
            match self.messages.unread_count().await {
                Ok(n) => self.load_unread(generation, n),
                Err(e) => warn!("app: failed to load unread count: {}", e),
            }
            if self.is_current(generation) {
                self.open_live(generation).await;
            }
        } else {
            self.reset_unread();
            self.close_live();
        }
    }

    /// Replace the cached profile without notifying.
    pub fn refresh_user(&self, user_info: Option<UserProfile>) {
        let mut snap = self.write();
        if snap.is_logged_in {
            snap.user_info = user_info;
        }
    }

    pub fn set_unread_count(&self, count: u32) {
        self.write().unread_count = count;
        self.emit(&AppEvent::UnreadCountChange(count));
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Store a fetched count unless the login state changed meanwhile.
    fn load_unread(&self, generation: u64, count: u32) {
        {
            let mut snap = self.write();
            if !self.is_current(generation) {
                debug!("app: dropping unread count from a superseded login");
                return;
            }
            snap.unread_count = count;
        }
        self.emit(&AppEvent::UnreadCountChange(count));
    }

    fn reset_unread(&self) {
        let changed = {
            let mut snap = self.write();
            std::mem::replace(&mut snap.unread_count, 0) != 0
        };
        if changed {
            self.emit(&AppEvent::UnreadCountChange(0));
        }
    }

    /// Feed one frame from the live channel. Returns whether it was counted.
    pub fn handle_live_message(&self, raw: &str) -> bool {
        let frame: serde_json::Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                debug!("app: ignoring malformed live frame: {}", e);
                return false;
            }
        };
        if !is_unread_message(&frame) {
            return false;
        }
        let count = {
            let mut snap = self.write();
            snap.unread_count = snap.unread_count.saturating_add(1);
            snap.unread_count
        };
        self.emit(&AppEvent::UnreadCountChange(count));
        true
    }

    // ── Live connection ──

    async fn open_live(&self, generation: u64) {
        let conn = match self.messages.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("app: failed to open live connection: {}", e);
                return;
            }
        };
        // Lock order: live, then snapshot.
        let discard = {
            let mut live = self.live.lock().unwrap_or_else(|e| e.into_inner());
            let mut snap = self.write();
            if self.is_current(generation) {
                snap.live_connected = true;
                live.replace(conn)
            } else {
                debug!("app: closing live connection from a superseded login");
                Some(conn)
            }
        };
        if let Some(conn) = discard {
            close_quietly(conn.as_ref());
        }
    }

    fn close_live(&self) {
        let conn = {
            let mut live = self.live.lock().unwrap_or_else(|e| e.into_inner());
            self.write().live_connected = false;
            live.take()
        };
        if let Some(conn) = conn {
            close_quietly(conn.as_ref());
        }
    }
}

fn close_quietly(conn: &dyn LiveConnection) {
    if let Err(e) = conn.close() {
        warn!("app: failed to close live connection: {}", e);
    }
}

#[async_trait::async_trait]
impl SessionListener for AppState {
    async fn session_changed(&self, logged_in: bool, user_info: Option<UserProfile>) {
        self.set_login_status(logged_in, user_info).await;
    }
}
