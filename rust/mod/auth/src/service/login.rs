use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use broker_client::ApiRequest;
use broker_core::now_millis;

use crate::model::{Credential, LoginData, LoginRequest, UserProfile};
use crate::service::provider::{
    CredentialProvider, IdentityProvider, MockCredentials, PlatformCredentials, fallback_session,
};
use crate::service::session::SessionManager;
use crate::service::{AuthConfig, AuthError, expect_data};

/// Where the login currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginPhase {
    Idle,
    CredentialAcquisition,
    BackendExchange,
    LocalFallback,
    SessionEstablished,
}

/// How a successful login got its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginPath {
    /// A valid session was already stored.
    Existing,
    /// Exchanged with the backend.
    Verified,
    /// Synthesized locally because the backend was unreachable.
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    pub path: LoginPath,
    pub token: String,
    pub user_info: Option<UserProfile>,
}

/// Drives the credential → backend → session login sequence.
pub struct LoginOrchestrator {
    session: Arc<SessionManager>,
    credentials: Arc<dyn CredentialProvider>,
    config: AuthConfig,
    phase: Mutex<LoginPhase>,
    in_flight: AtomicBool,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl LoginOrchestrator {
    pub fn new(
        session: Arc<SessionManager>,
        credentials: Arc<dyn CredentialProvider>,
        config: AuthConfig,
    ) -> Self {
        Self {
            session,
            credentials,
            config,
            phase: Mutex::new(LoginPhase::Idle),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Pick the credential strategy from `config.mock_credentials`.
    pub fn from_config(
        session: Arc<SessionManager>,
        identity: Arc<dyn IdentityProvider>,
        config: AuthConfig,
    ) -> Self {
        let credentials: Arc<dyn CredentialProvider> = if config.mock_credentials {
            Arc::new(MockCredentials::new())
        } else {
            Arc::new(PlatformCredentials::new(identity))
        };
        Self::new(session, credentials, config)
    }

    pub fn phase(&self) -> LoginPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    fn set_phase(&self, phase: LoginPhase) {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = phase;
    }

    /// Log in, reusing a valid stored session unless a profile is requested.
    ///
    /// Nothing is persisted until the session is established. A second call
    /// while one is running fails with `LoginInProgress`.
    pub async fn login(&self, need_profile: bool) -> Result<LoginOutcome, AuthError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(AuthError::LoginInProgress);
        }
        let _guard = InFlight(&self.in_flight);

        let result = self.run(need_profile).await;
        if let Err(e) = &result {
            warn!("login: failed: {}", e);
            self.set_phase(LoginPhase::Idle);
        }
        result
    }

    async fn run(&self, need_profile: bool) -> Result<LoginOutcome, AuthError> {
        let valid = self.session.check_validity().await;
        if valid && !need_profile {
            let status = self.session.status();
            if let Some(token) = status.token {
                info!("login: reusing stored session");
                return Ok(LoginOutcome {
                    path: LoginPath::Existing,
                    token,
                    user_info: status.user_info,
                });
            }
        }

        self.set_phase(LoginPhase::CredentialAcquisition);
        let credential = self.credentials.credential(need_profile).await?;
        info!("login: credential from {} provider", self.credentials.name());

        self.set_phase(LoginPhase::BackendExchange);
        let (path, token, profile) = match self.exchange(&credential).await {
            Ok((token, profile)) => (LoginPath::Verified, token, profile),
            Err(AuthError::BackendUnavailable(reason)) if self.config.dev_fallback => {
                warn!("login: backend unavailable ({}), falling back", reason);
                self.set_phase(LoginPhase::LocalFallback);
                let (token, profile) = fallback_session(credential.profile);
                (LoginPath::Fallback, token, profile)
            }
            Err(e) => return Err(e),
        };

        self.session.persist(&token, &profile)?;
        self.set_phase(LoginPhase::SessionEstablished);
        self.session.notify(true, Some(profile.clone())).await;
        info!("login: session established ({:?})", path);

        Ok(LoginOutcome {
            path,
            token,
            user_info: Some(profile),
        })
    }

    async fn exchange(&self, credential: &Credential) -> Result<(String, UserProfile), AuthError> {
        let body = serde_json::to_value(LoginRequest::new(credential))
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        let resp = self
            .session
            .http()
            .request(ApiRequest::post("/auth/wechat/login", body).anonymous())
            .await?;
        let data: LoginData = expect_data(resp)?;

        let mut profile = credential.profile.clone();
        profile.login_time = Some(now_millis());
        data.user.apply_to(&mut profile);
        Ok((data.token, profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LoginType, UserId, keys};
    use crate::testing::{FakeHttp, FakeIdentity, RecordingListener};
    use broker_client::{ApiError, ApiResponse};
    use broker_kv::{KVStore, MemoryStore};
    use serde_json::json;

    struct Fixture {
        kv: Arc<MemoryStore>,
        http: Arc<FakeHttp>,
        identity: Arc<FakeIdentity>,
        listener: Arc<RecordingListener>,
        login: LoginOrchestrator,
    }

    fn fixture(config: AuthConfig) -> Fixture {
        let kv = Arc::new(MemoryStore::new());
        let http = Arc::new(FakeHttp::new());
        let identity = Arc::new(FakeIdentity::new("abc"));
        let listener = Arc::new(RecordingListener::default());
        let session = Arc::new(
            SessionManager::new(kv.clone(), http.clone(), identity.clone())
                .with_listener(listener.clone()),
        );
        let login = LoginOrchestrator::from_config(session, identity.clone(), config);
        Fixture {
            kv,
            http,
            identity,
            listener,
            login,
        }
    }

    fn platform() -> AuthConfig {
        AuthConfig {
            dev_fallback: true,
            mock_credentials: false,
        }
    }

    fn login_ok(token: &str, id: i64) -> ApiResponse {
        ApiResponse::new(
            200,
            json!({
                "code": 200,
                "message": "登录成功",
                "data": {
                    "token": token,
                    "user": {
                        "id": id,
                        "platform": "wechat_miniprogram",
                        "status": "active",
                        "loginCount": 1,
                        "lastLoginAt": "2024-05-01T08:00:00Z"
                    }
                }
            }),
        )
    }

    #[tokio::test]
    async fn fresh_login_exchanges_credential() {
        let f = fixture(platform());
        f.http.respond("/auth/wechat/login", login_ok("T1", 42));

        let outcome = f.login.login(false).await.unwrap();
        assert_eq!(outcome.path, LoginPath::Verified);
        assert_eq!(outcome.token, "T1");

        let status = f.login.session().status();
        assert!(status.is_logged_in);
        assert_eq!(status.token.as_deref(), Some("T1"));
        let user = status.user_info.unwrap();
        assert_eq!(user.user_id, Some(UserId::Num(42)));
        assert_eq!(user.login_type, Some(LoginType::Wechat));

        let sent = f.http.last_body("/auth/wechat/login").unwrap();
        assert_eq!(sent["code"], "abc");
        assert_eq!(f.login.phase(), LoginPhase::SessionEstablished);

        let events = f.listener.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].0);
        assert_eq!(events[0].1.as_ref().and_then(|u| u.numeric_id()), Some(42));
    }

    #[tokio::test]
    async fn login_request_is_anonymous() {
        let f = fixture(platform());
        f.http.respond("/auth/wechat/login", login_ok("T1", 42));
        f.login.login(false).await.unwrap();
        assert_eq!(f.http.last_request("/auth/wechat/login").map(|r| r.auth), Some(false));
    }

    #[tokio::test]
    async fn backend_unreachable_falls_back() {
        let f = fixture(platform());
        f.http.fail("/auth/wechat/login", ApiError::Network("connection refused".into()));

        let outcome = f.login.login(false).await.unwrap();
        assert_eq!(outcome.path, LoginPath::Fallback);
        assert!(outcome.token.starts_with("mock_token_"));

        let status = f.login.session().status();
        assert!(status.is_logged_in);
        let user = status.user_info.unwrap();
        assert_eq!(user.login_type, Some(LoginType::MockWechat));
        assert!(user.user_id.unwrap().to_string().starts_with("mock_user_"));
        assert_eq!(f.listener.events().len(), 1);
    }

    #[tokio::test]
    async fn server_error_falls_back() {
        let f = fixture(platform());
        f.http.respond("/auth/wechat/login", ApiResponse::new(502, json!("bad gateway")));

        let outcome = f.login.login(false).await.unwrap();
        assert_eq!(outcome.path, LoginPath::Fallback);
    }

    #[tokio::test]
    async fn fallback_disabled_surfaces_error() {
        let f = fixture(AuthConfig {
            dev_fallback: false,
            mock_credentials: false,
        });
        f.http.fail("/auth/wechat/login", ApiError::Network("timeout".into()));

        let err = f.login.login(false).await.unwrap_err();
        assert!(matches!(err, AuthError::BackendUnavailable(_)));
        assert!(f.kv.is_empty());
        assert!(f.listener.events().is_empty());
        assert_eq!(f.login.phase(), LoginPhase::Idle);
    }

    #[tokio::test]
    async fn rejection_does_not_fall_back() {
        let f = fixture(platform());
        f.http.respond(
            "/auth/wechat/login",
            ApiResponse::new(200, json!({"code": 400, "message": "code 已使用"})),
        );

        let err = f.login.login(false).await.unwrap_err();
        assert_eq!(
            err,
            AuthError::BackendRejected { code: 400, message: "code 已使用".into() }
        );
        assert!(!f.login.session().status().is_logged_in);
        assert_eq!(f.login.phase(), LoginPhase::Idle);
    }

    #[tokio::test]
    async fn denied_credential_persists_nothing() {
        let f = fixture(platform());
        f.identity.deny_credential();

        let err = f.login.login(false).await.unwrap_err();
        assert!(matches!(err, AuthError::CredentialDenied(_)));
        assert!(f.kv.is_empty());
        assert_eq!(f.http.calls("/auth/wechat/login"), 0);
    }

    #[tokio::test]
    async fn valid_session_is_reused() {
        let f = fixture(platform());
        f.http.respond("/auth/wechat/login", login_ok("T1", 42));
        f.login.login(false).await.unwrap();

        let outcome = f.login.login(false).await.unwrap();
        assert_eq!(outcome.path, LoginPath::Existing);
        assert_eq!(outcome.token, "T1");
        assert_eq!(f.http.calls("/auth/wechat/login"), 1);
    }

    #[tokio::test]
    async fn need_profile_always_logs_in_again() {
        let f = fixture(platform());
        f.http.respond("/auth/wechat/login", login_ok("T1", 42));
        f.login.login(false).await.unwrap();

        f.http.respond("/auth/wechat/login", login_ok("T2", 42));
        let outcome = f.login.login(true).await.unwrap();
        assert_eq!(outcome.path, LoginPath::Verified);
        assert_eq!(outcome.user_info.unwrap().nick_name.as_deref(), Some("张三"));
        assert_eq!(f.login.session().token().as_deref(), Some("T2"));
    }

    #[tokio::test]
    async fn mock_credentials_register_generated_user() {
        let f = fixture(AuthConfig::default());
        f.http.respond("/auth/wechat/login", login_ok("T9", 7));

        let outcome = f.login.login(false).await.unwrap();
        let user = outcome.user_info.unwrap();
        assert!(user.is_mock());
        assert_eq!(user.numeric_id(), Some(7));
        assert!(f.kv.contains(keys::OPENID).unwrap());

        let sent = f.http.last_body("/auth/wechat/login").unwrap();
        assert!(sent["code"].as_str().unwrap().starts_with("mock_code_"));
        assert_eq!(f.identity.credential_requests(), 0);
    }

    #[tokio::test]
    async fn concurrent_login_is_rejected() {
        let f = fixture(platform());
        f.http.respond("/auth/wechat/login", login_ok("T1", 42));
        let gate = f.http.hold("/auth/wechat/login");

        let (first, second) = tokio::join!(f.login.login(false), async {
            gate.wait_entered().await;
            let second = f.login.login(false).await;
            gate.release();
            second
        });

        assert_eq!(second.unwrap_err(), AuthError::LoginInProgress);
        assert_eq!(first.unwrap().path, LoginPath::Verified);
        assert_eq!(f.http.calls("/auth/wechat/login"), 1);
    }
}
