use std::fmt;

use serde::{Deserialize, Serialize};

/// A user identifier as the backend sends it: a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Num(i64),
    Text(String),
}

impl UserId {
    /// Integer value of the identifier, if it is positive.
    ///
    /// Strings use leading-digit parsing: `"42abc"` is 42, `"abc"` is none.
    pub fn as_positive_int(&self) -> Option<u64> {
        match self {
            UserId::Num(n) if *n > 0 => Some(*n as u64),
            UserId::Num(_) => None,
            UserId::Text(s) => leading_int(s).filter(|n| *n > 0).map(|n| n as u64),
        }
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Num(n) => write!(f, "{}", n),
            UserId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for UserId {
    fn from(n: i64) -> Self {
        UserId::Num(n)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId::Text(s.to_string())
    }
}

/// Parse an optional sign followed by leading digits, ignoring the rest.
fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<i64>().ok().map(|n| n * sign)
}

/// How the session was established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LoginType {
    /// Verified by the platform identity provider.
    Wechat,
    /// Development mock user.
    MockWechat,
    Other(String),
}

impl LoginType {
    pub fn as_str(&self) -> &str {
        match self {
            LoginType::Wechat => "wechat",
            LoginType::MockWechat => "mock_wechat",
            LoginType::Other(s) => s,
        }
    }
}

impl From<String> for LoginType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "wechat" => LoginType::Wechat,
            "mock_wechat" => LoginType::MockWechat,
            _ => LoginType::Other(s),
        }
    }
}

impl From<LoginType> for String {
    fn from(t: LoginType) -> Self {
        t.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Unknown,
    Male,
    Female,
}

impl Gender {
    pub fn from_code(code: Option<u8>) -> Self {
        match code {
            Some(1) => Gender::Male,
            Some(2) => Gender::Female,
            _ => Gender::Unknown,
        }
    }
}

/// Cached user profile. camelCase in storage and on the wire.
///
/// Keys this struct does not model are kept in `extra` and survive merges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,

    /// Id assigned by the backend at registration (older clients).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_user_id: Option<UserId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,

    /// 0 unknown, 1 male, 2 female.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, alias = "openid", skip_serializing_if = "Option::is_none")]
    pub open_id: Option<String>,

    #[serde(default, alias = "unionid", skip_serializing_if = "Option::is_none")]
    pub union_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_count: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_type: Option<LoginType>,

    /// Epoch milliseconds of the local login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_time: Option<i64>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserProfile {
    /// Profile used when the user declines to share theirs.
    pub fn basic() -> Self {
        Self {
            nick_name: Some("微信用户".into()),
            avatar_url: Some("/static/head/avatar1.png".into()),
            gender: Some(0),
            login_type: Some(LoginType::Wechat),
            ..Default::default()
        }
    }

    pub fn gender(&self) -> Gender {
        Gender::from_code(self.gender)
    }

    /// Resolve the numeric user id: `userId`, then `registeredUserId`, then `id`.
    pub fn numeric_id(&self) -> Option<u64> {
        [&self.user_id, &self.registered_user_id, &self.id]
            .into_iter()
            .flatten()
            .find_map(UserId::as_positive_int)
    }

    /// The identifier fields present, for error reports.
    pub fn identity_fields(&self) -> String {
        let fields: Vec<String> = [
            ("userId", &self.user_id),
            ("registeredUserId", &self.registered_user_id),
            ("id", &self.id),
        ]
        .into_iter()
        .filter_map(|(name, v)| v.as_ref().map(|v| format!("{}={}", name, v)))
        .collect();
        if fields.is_empty() {
            "no identifier fields".to_string()
        } else {
            fields.join(", ")
        }
    }

    pub fn is_mock(&self) -> bool {
        self.login_type == Some(LoginType::MockWechat)
    }

    /// Shallow-merge a JSON object into this profile.
    pub fn merged(&self, patch: &serde_json::Value) -> Result<UserProfile, serde_json::Error> {
        let mut base = serde_json::to_value(self)?;
        broker_core::merge_fields(&mut base, patch);
        serde_json::from_value(base)
    }
}
