//! In-memory fakes for tests of this crate and its dependents.
//!
//! Enabled by the `testing` feature.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use broker_client::{ApiError, ApiRequest, ApiResponse, HttpClient};
use broker_kv::{KVError, KVStore, MemoryStore};

use crate::model::UserProfile;
use crate::service::provider::IdentityProvider;
use crate::service::{AuthError, SessionListener};

// ── Identity ────────────────────────────────────────────────────────

/// Scriptable identity provider.
pub struct FakeIdentity {
    code: String,
    deny_credential: AtomicBool,
    deny_profile: AtomicBool,
    session_valid: AtomicBool,
    session_error: AtomicBool,
    session_checks: AtomicUsize,
    credential_requests: AtomicUsize,
}

impl FakeIdentity {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            deny_credential: AtomicBool::new(false),
            deny_profile: AtomicBool::new(false),
            session_valid: AtomicBool::new(true),
            session_error: AtomicBool::new(false),
            session_checks: AtomicUsize::new(0),
            credential_requests: AtomicUsize::new(0),
        }
    }

    pub fn deny_credential(&self) {
        self.deny_credential.store(true, Ordering::SeqCst);
    }

    pub fn deny_profile(&self) {
        self.deny_profile.store(true, Ordering::SeqCst);
    }

    pub fn set_session_valid(&self, valid: bool) {
        self.session_valid.store(valid, Ordering::SeqCst);
    }

    pub fn fail_session_check(&self) {
        self.session_error.store(true, Ordering::SeqCst);
    }

    pub fn session_checks(&self) -> usize {
        self.session_checks.load(Ordering::SeqCst)
    }

    pub fn credential_requests(&self) -> usize {
        self.credential_requests.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for FakeIdentity {
    async fn acquire_credential(&self) -> Result<String, AuthError> {
        self.credential_requests.fetch_add(1, Ordering::SeqCst);
        if self.deny_credential.load(Ordering::SeqCst) {
            return Err(AuthError::CredentialDenied("login refused".into()));
        }
        Ok(self.code.clone())
    }

    async fn check_session(&self) -> Result<bool, AuthError> {
        self.session_checks.fetch_add(1, Ordering::SeqCst);
        if self.session_error.load(Ordering::SeqCst) {
            return Err(AuthError::Internal("checkSession failed".into()));
        }
        Ok(self.session_valid.load(Ordering::SeqCst))
    }

    async fn user_profile(&self) -> Result<UserProfile, AuthError> {
        if self.deny_profile.load(Ordering::SeqCst) {
            return Err(AuthError::CredentialDenied("getUserProfile:fail auth deny".into()));
        }
        Ok(UserProfile {
            nick_name: Some("张三".into()),
            avatar_url: Some("https://example.com/a.png".into()),
            gender: Some(1),
            city: Some("杭州".into()),
            province: Some("浙江".into()),
            country: Some("中国".into()),
            language: Some("zh_CN".into()),
            ..Default::default()
        })
    }
}

// ── HTTP ────────────────────────────────────────────────────────────

/// Pauses a request until released.
pub struct Gate {
    entered: Notify,
    released: Notify,
}

impl Gate {
    /// Wait until a request reaches the gate.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }
}

#[derive(Default)]
struct Routes {
    replies: HashMap<String, Result<ApiResponse, ApiError>>,
    requests: Vec<ApiRequest>,
    gates: HashMap<String, Arc<Gate>>,
}

/// HTTP client answering from canned replies, keyed by path.
///
/// Unscripted paths answer `404`.
#[derive(Default)]
pub struct FakeHttp {
    routes: Mutex<Routes>,
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    fn routes(&self) -> std::sync::MutexGuard<'_, Routes> {
        self.routes.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn respond(&self, path: &str, resp: ApiResponse) {
        self.routes().replies.insert(path.to_string(), Ok(resp));
    }

    pub fn fail(&self, path: &str, err: ApiError) {
        self.routes().replies.insert(path.to_string(), Err(err));
    }

    /// Hold the next requests to `path` until the returned gate is released.
    pub fn hold(&self, path: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate {
            entered: Notify::new(),
            released: Notify::new(),
        });
        self.routes().gates.insert(path.to_string(), gate.clone());
        gate
    }

    pub fn calls(&self, path: &str) -> usize {
        self.routes().requests.iter().filter(|r| r.path == path).count()
    }

    pub fn last_request(&self, path: &str) -> Option<ApiRequest> {
        self.routes().requests.iter().rev().find(|r| r.path == path).cloned()
    }

    pub fn last_body(&self, path: &str) -> Option<serde_json::Value> {
        self.last_request(path).and_then(|r| r.body)
    }
}

#[async_trait::async_trait]
impl HttpClient for FakeHttp {
    async fn request(&self, req: ApiRequest) -> Result<ApiResponse, ApiError> {
        let (reply, gate) = {
            let mut routes = self.routes();
            routes.requests.push(req.clone());
            let reply = routes
                .replies
                .get(&req.path)
                .cloned()
                .unwrap_or_else(|| Ok(ApiResponse::new(404, serde_json::json!({"message": "not found"}))));
            (reply, routes.gates.get(&req.path).cloned())
        };
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.released.notified().await;
        }
        reply
    }
}

// ── Storage ─────────────────────────────────────────────────────────

/// Memory store whose writes to one key always fail.
pub struct FailingStore {
    inner: MemoryStore,
    failing_key: String,
}

impl FailingStore {
    pub fn failing_on(key: &str) -> Self {
        Self {
            inner: MemoryStore::new(),
            failing_key: key.to_string(),
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

impl KVStore for FailingStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        if key == self.failing_key {
            return Err(KVError::Storage(format!("quota exceeded writing {}", key)));
        }
        self.inner.set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        self.inner.delete(key)
    }
}

// ── Listener ────────────────────────────────────────────────────────

/// Records every session change.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<(bool, Option<UserProfile>)>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<(bool, Option<UserProfile>)> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait::async_trait]
impl SessionListener for RecordingListener {
    async fn session_changed(&self, logged_in: bool, user_info: Option<UserProfile>) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((logged_in, user_info));
    }
}
