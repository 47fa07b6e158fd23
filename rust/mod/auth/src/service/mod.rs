pub mod login;
pub mod provider;
pub mod session;

use serde::de::DeserializeOwned;
use thiserror::Error;

use broker_client::{ApiError, ApiResponse};
use broker_kv::KVError;

use crate::model::UserProfile;

/// Auth error type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    /// The user or the identity provider refused to issue a credential.
    #[error("credential denied: {0}")]
    CredentialDenied(String),

    /// Transport failure or a 5xx response.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("backend rejected ({code}): {message}")]
    BackendRejected { code: i64, message: String },

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("login already in progress")]
    LoginInProgress,

    #[error("storage: {0}")]
    Storage(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl From<KVError> for AuthError {
    fn from(e: KVError) -> Self {
        AuthError::Storage(e.to_string())
    }
}

impl From<ApiError> for AuthError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Network(m) => AuthError::BackendUnavailable(m),
            ApiError::Decode(m) => AuthError::BackendRejected { code: 0, message: m },
            ApiError::Auth(m) | ApiError::Io(m) => AuthError::Internal(m),
        }
    }
}

impl AuthError {
    /// Title and body for the toast/modal shown to the user.
    pub fn user_message(&self) -> (&'static str, String) {
        match self {
            AuthError::CredentialDenied(_) => ("登录失败", "需要授权才能登录".into()),
            AuthError::BackendUnavailable(_) => ("网络错误", "网络连接失败，请检查网络后重试".into()),
            AuthError::BackendRejected { message, .. } => ("登录失败", message.clone()),
            AuthError::NotAuthenticated => ("请先登录", "登录后才能继续操作".into()),
            AuthError::InvalidIdentity(_) => ("用户信息异常", "用户ID无效，请重新登录".into()),
            AuthError::LoginInProgress => ("请稍候", "正在登录中".into()),
            AuthError::Storage(_) | AuthError::Internal(_) => ("登录失败", "登录失败，请重试".into()),
        }
    }
}

/// Check a `{code, message, data}` response and return its payload.
///
/// 5xx is `BackendUnavailable`; any other non-200 status or business code
/// is `BackendRejected` carrying the server message.
pub(crate) fn expect_ok(resp: ApiResponse) -> Result<Option<serde_json::Value>, AuthError> {
    if resp.status_code >= 500 {
        return Err(AuthError::BackendUnavailable(format!("HTTP {}", resp.status_code)));
    }
    if resp.status_code != 200 {
        return Err(AuthError::BackendRejected {
            code: resp.status_code as i64,
            message: resp
                .message()
                .unwrap_or_else(|| format!("HTTP {}", resp.status_code)),
        });
    }
    let env = resp.envelope::<serde_json::Value>()?;
    if !env.is_ok() {
        return Err(AuthError::BackendRejected {
            code: env.code,
            message: env.message.unwrap_or_else(|| "request failed".into()),
        });
    }
    Ok(env.data)
}

/// Like [`expect_ok`], decoding a required payload.
pub(crate) fn expect_data<T: DeserializeOwned>(resp: ApiResponse) -> Result<T, AuthError> {
    let data = expect_ok(resp)?.ok_or_else(|| AuthError::BackendRejected {
        code: 200,
        message: "response without data".into(),
    })?;
    serde_json::from_value(data).map_err(|e| AuthError::BackendRejected {
        code: 200,
        message: format!("malformed response: {}", e),
    })
}

/// Configuration for login.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Synthesize a local session when the backend is unreachable.
    pub dev_fallback: bool,
    /// Use generated mock credentials instead of the platform provider.
    pub mock_credentials: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            dev_fallback: true,
            mock_credentials: true,
        }
    }
}

/// Receives login-state changes from the session manager and orchestrator.
#[async_trait::async_trait]
pub trait SessionListener: Send + Sync {
    async fn session_changed(&self, logged_in: bool, user_info: Option<UserProfile>);
}
