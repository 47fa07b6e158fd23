//! Display formatting for the "my" page.

use chrono::{DateTime, Utc};
use serde::Serialize;

use broker_auth::{Gender, LoginType, UserProfile};

/// Profile fields rendered as display text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub nick_name: String,
    pub avatar_url: Option<String>,
    pub phone_number: Option<String>,
    pub gender_text: &'static str,
    pub location_text: String,
    pub login_type_text: &'static str,
    pub user_tag: &'static str,
    /// Empty when no login time is recorded.
    pub last_login_text: String,
}

impl ProfileView {
    pub fn new(user: &UserProfile, last_login: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        Self {
            nick_name: user.nick_name.clone().unwrap_or_else(|| "微信用户".into()),
            avatar_url: user.avatar_url.clone(),
            phone_number: user.phone_number.clone(),
            gender_text: gender_text(user.gender()),
            location_text: location_text(user),
            login_type_text: login_type_text(user.login_type.as_ref()),
            user_tag: if user.is_mock() { "开发测试用户" } else { "微信用户" },
            last_login_text: last_login
                .map(|t| relative_time(t, now))
                .unwrap_or_default(),
        }
    }
}

pub fn gender_text(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "男",
        Gender::Female => "女",
        Gender::Unknown => "未知",
    }
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

pub fn location_text(user: &UserProfile) -> String {
    match (non_empty(&user.province), non_empty(&user.city)) {
        (Some(province), Some(city)) => format!("{} {}", province, city),
        (None, Some(city)) => city.to_string(),
        (Some(province), None) => province.to_string(),
        (None, None) => "未知".to_string(),
    }
}

pub fn login_type_text(login_type: Option<&LoginType>) -> &'static str {
    match login_type {
        Some(LoginType::MockWechat) => "伪微信登录",
        Some(LoginType::Wechat) => "微信登录",
        _ => "未知登录方式",
    }
}

/// "刚刚登录", "N分钟前", "N小时前" or "N天前".
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    if secs < 60 {
        "刚刚登录".to_string()
    } else if secs < 3600 {
        format!("{}分钟前", secs / 60)
    } else if secs < 86400 {
        format!("{}小时前", secs / 3600)
    } else {
        format!("{}天前", secs / 86400)
    }
}
