use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use broker_client::{ApiError, ApiRequest, HttpClient, Method, TokenSource};
use broker_core::now_millis;
use broker_kv::{KVStore, get_json, set_json};

use crate::model::{AvatarData, RefreshData, SessionStatus, UserProfile, keys};
use crate::service::provider::IdentityProvider;
use crate::service::{AuthError, SessionListener, expect_data, expect_ok};

/// Owns the persisted session: token, cached profile and login time.
pub struct SessionManager {
    kv: Arc<dyn KVStore>,
    http: Arc<dyn HttpClient>,
    identity: Arc<dyn IdentityProvider>,
    listener: Option<Arc<dyn SessionListener>>,
}

impl SessionManager {
    pub fn new(
        kv: Arc<dyn KVStore>,
        http: Arc<dyn HttpClient>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            kv,
            http,
            identity,
            listener: None,
        }
    }

    /// Notify `listener` of every login-state change.
    pub fn with_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    pub fn http(&self) -> &Arc<dyn HttpClient> {
        &self.http
    }

    // ── Reads ──

    /// Current session. Never fails; unreadable keys read as absent.
    pub fn status(&self) -> SessionStatus {
        let Some(token) = self.token() else {
            return SessionStatus::logged_out();
        };
        let user_info = self.read::<UserProfile>(keys::USER_INFO);
        SessionStatus {
            is_logged_in: true,
            token: Some(token),
            user_info,
        }
    }

    pub fn token(&self) -> Option<String> {
        self.read::<String>(keys::ACCESS_TOKEN).filter(|t| !t.is_empty())
    }

    /// Time of the last successful login, if recorded.
    ///
    /// Accepts epoch milliseconds or an RFC 3339 string.
    pub fn last_login_time(&self) -> Option<DateTime<Utc>> {
        match self.read::<serde_json::Value>(keys::LAST_LOGIN_TIME)? {
            serde_json::Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
            serde_json::Value::String(s) => DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            _ => None,
        }
    }

    fn read<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        match get_json::<T>(self.kv.as_ref(), key) {
            Ok(v) => v,
            Err(e) => {
                warn!("session: failed to read {}: {}", key, e);
                None
            }
        }
    }

    // ── Writes ──

    /// Store a new session. A failed write purges whatever was written.
    pub fn persist(&self, token: &str, user_info: &UserProfile) -> Result<(), AuthError> {
        if let Err(e) = self.write_session(token, user_info) {
            warn!("session: persist failed, purging partial session: {}", e);
            self.clear();
            return Err(e);
        }
        debug!("session: persisted token for {}", user_info.identity_fields());
        Ok(())
    }

    fn write_session(&self, token: &str, user_info: &UserProfile) -> Result<(), AuthError> {
        let kv = self.kv.as_ref();
        set_json(kv, keys::ACCESS_TOKEN, token)?;
        set_json(kv, keys::USER_INFO, user_info)?;
        self.write_platform_ids(user_info)?;
        let login_time = user_info.login_time.unwrap_or_else(now_millis);
        set_json(kv, keys::LAST_LOGIN_TIME, &login_time)?;
        Ok(())
    }

    /// `openid` / `unionid` mirror the profile; absent ids are deleted.
    fn write_platform_ids(&self, user_info: &UserProfile) -> Result<(), AuthError> {
        let kv = self.kv.as_ref();
        match &user_info.open_id {
            Some(openid) => set_json(kv, keys::OPENID, openid)?,
            None => kv.delete(keys::OPENID)?,
        }
        match &user_info.union_id {
            Some(unionid) => set_json(kv, keys::UNIONID, unionid)?,
            None => kv.delete(keys::UNIONID)?,
        }
        Ok(())
    }

    /// Shallow-merge a JSON object into the cached profile and store it.
    pub fn update(&self, patch: &serde_json::Value) -> Result<UserProfile, AuthError> {
        if self.token().is_none() {
            return Err(AuthError::NotAuthenticated);
        }
        if !patch.is_object() {
            return Err(AuthError::Internal(format!("profile patch must be an object, got {}", patch)));
        }
        let current = self.read::<UserProfile>(keys::USER_INFO).unwrap_or_default();
        let updated = current
            .merged(patch)
            .map_err(|e| AuthError::Internal(format!("profile merge: {}", e)))?;
        set_json(self.kv.as_ref(), keys::USER_INFO, &updated)?;
        if current.open_id != updated.open_id || current.union_id != updated.union_id {
            self.write_platform_ids(&updated)?;
        }
        Ok(updated)
    }

    /// Send a profile change to the backend, then apply it locally.
    pub async fn sync_profile(&self, patch: serde_json::Value) -> Result<UserProfile, AuthError> {
        if self.token().is_none() {
            return Err(AuthError::NotAuthenticated);
        }
        let resp = self
            .http
            .request(ApiRequest::post("/auth/user/update", patch.clone()))
            .await?;
        expect_ok(resp)?;
        self.update(&patch)
    }

    /// Upload a new avatar image and store the returned URL in the profile.
    pub async fn upload_avatar(&self, file: &Path) -> Result<String, AuthError> {
        if self.token().is_none() {
            return Err(AuthError::NotAuthenticated);
        }
        let resp = self
            .http
            .request(ApiRequest::upload("/auth/avatar/upload", "avatar", file))
            .await?;
        let data: AvatarData = expect_data(resp)?;
        self.update(&serde_json::json!({ "avatarUrl": data.avatar_url }))?;
        info!("session: avatar updated");
        Ok(data.avatar_url)
    }

    /// Remove every session key. Idempotent; failures are logged.
    pub fn clear(&self) {
        for key in keys::ALL {
            if let Err(e) = self.kv.delete(key) {
                warn!("session: failed to delete {}: {}", key, e);
            }
        }
    }

    // ── Lifecycle ──

    /// Whether the stored session is still usable.
    ///
    /// Without a token any orphaned keys are purged. An invalid session or
    /// a provider error clears the session.
    pub async fn check_validity(&self) -> bool {
        if self.token().is_none() {
            self.clear();
            return false;
        }
        match self.identity.check_session().await {
            Ok(true) => true,
            Ok(false) => {
                info!("session: provider session expired, clearing");
                self.clear();
                false
            }
            Err(e) => {
                warn!("session: provider check failed, clearing: {}", e);
                self.clear();
                false
            }
        }
    }

    /// Exchange the current token for a new one. Any failure logs out.
    pub async fn refresh(&self) -> Result<String, AuthError> {
        match self.try_refresh().await {
            Ok(token) => {
                info!("session: token refreshed");
                Ok(token)
            }
            Err(e) => {
                warn!("session: refresh failed, logging out: {}", e);
                self.logout().await;
                Err(e)
            }
        }
    }

    async fn try_refresh(&self) -> Result<String, AuthError> {
        if self.token().is_none() {
            return Err(AuthError::NotAuthenticated);
        }
        let resp = self
            .http
            .request(ApiRequest::new(Method::Post, "/auth/token/refresh"))
            .await?;
        let data: RefreshData = expect_data(resp)?;
        set_json(self.kv.as_ref(), keys::ACCESS_TOKEN, &data.token)?;
        Ok(data.token)
    }

    pub async fn logout(&self) {
        self.clear();
        info!("session: logged out");
        self.notify(false, None).await;
    }

    pub(crate) async fn notify(&self, logged_in: bool, user_info: Option<UserProfile>) {
        if let Some(listener) = &self.listener {
            listener.session_changed(logged_in, user_info).await;
        }
    }
}

/// Bearer token read from the session store on every request.
pub struct SessionToken {
    kv: Arc<dyn KVStore>,
}

impl SessionToken {
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self { kv }
    }
}

#[async_trait::async_trait]
impl TokenSource for SessionToken {
    async fn token(&self) -> Result<Option<String>, ApiError> {
        get_json::<String>(self.kv.as_ref(), keys::ACCESS_TOKEN)
            .map(|t| t.filter(|t| !t.is_empty()))
            .map_err(|e| ApiError::Auth(e.to_string()))
    }
}
