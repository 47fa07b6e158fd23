use serde::{Deserialize, Serialize};

use super::user::{UserId, UserProfile};

/// Storage keys owned by the session.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const USER_INFO: &str = "user_info";
    pub const OPENID: &str = "openid";
    pub const UNIONID: &str = "unionid";
    pub const LAST_LOGIN_TIME: &str = "last_login_time";

    /// Every session key, in persist order.
    pub const ALL: [&str; 5] = [ACCESS_TOKEN, USER_INFO, OPENID, UNIONID, LAST_LOGIN_TIME];
}

/// Snapshot of the persisted session.
///
/// `user_info` is never set without a token.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub is_logged_in: bool,
    pub token: Option<String>,
    pub user_info: Option<UserProfile>,
}

impl SessionStatus {
    pub fn logged_out() -> Self {
        Self::default()
    }
}

/// A credential obtained from a [`CredentialProvider`](crate::CredentialProvider).
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    /// One-time login code exchanged with the backend.
    pub code: String,
    /// Profile to register with; may be mostly empty.
    pub profile: UserProfile,
}

// ── Wire types ──────────────────────────────────────────────────────

/// Body of `POST /auth/wechat/login`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub code: String,
    pub nick_name: Option<String>,
    pub avatar_url: Option<String>,
    pub phone_number: String,
    pub gender: Option<u8>,
    pub country: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub language: Option<String>,
}

impl LoginRequest {
    pub fn new(credential: &Credential) -> Self {
        let p = &credential.profile;
        Self {
            code: credential.code.clone(),
            nick_name: p.nick_name.clone(),
            avatar_url: p.avatar_url.clone(),
            phone_number: p.phone_number.clone().unwrap_or_default(),
            gender: p.gender,
            country: p.country.clone(),
            province: p.province.clone(),
            city: p.city.clone(),
            language: p.language.clone(),
        }
    }
}

/// `data` of a successful login response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginData {
    pub token: String,
    pub user: BackendUser,
}

/// Account record returned by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendUser {
    pub id: UserId,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub login_count: Option<u64>,
    #[serde(default)]
    pub last_login_at: Option<String>,
}

impl BackendUser {
    /// Overlay the backend account onto the registration profile.
    pub fn apply_to(&self, profile: &mut UserProfile) {
        profile.user_id = Some(self.id.clone());
        profile.registered_user_id = Some(self.id.clone());
        if self.platform.is_some() {
            profile.platform = self.platform.clone();
        }
        if self.status.is_some() {
            profile.status = self.status.clone();
        }
        if self.login_count.is_some() {
            profile.login_count = self.login_count;
        }
        if self.last_login_at.is_some() {
            profile.last_login_at = self.last_login_at.clone();
        }
    }
}

/// `data` of `POST /auth/avatar/upload`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarData {
    pub avatar_url: String,
}

/// `data` of `POST /auth/token/refresh`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RefreshData {
    pub token: String,
}
