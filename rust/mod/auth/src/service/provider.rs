use std::sync::Arc;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use broker_core::now_millis;

use crate::model::{Credential, LoginType, UserId, UserProfile};
use crate::service::AuthError;

/// Platform identity provider (the mini-program runtime or a stand-in).
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// One-time login code. Refusal is `CredentialDenied`.
    async fn acquire_credential(&self) -> Result<String, AuthError>;

    /// Whether the platform session behind the stored token is still valid.
    async fn check_session(&self) -> Result<bool, AuthError>;

    /// Ask the user to share their profile. Refusal is `CredentialDenied`.
    async fn user_profile(&self) -> Result<UserProfile, AuthError>;
}

/// Source of the credential and registration profile used for login.
#[async_trait::async_trait]
pub trait CredentialProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn credential(&self, need_profile: bool) -> Result<Credential, AuthError>;
}

// ── Platform ────────────────────────────────────────────────────────

/// Credentials from the platform identity provider.
pub struct PlatformCredentials {
    identity: Arc<dyn IdentityProvider>,
}

impl PlatformCredentials {
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self { identity }
    }
}

#[async_trait::async_trait]
impl CredentialProvider for PlatformCredentials {
    fn name(&self) -> &'static str {
        "platform"
    }

    async fn credential(&self, need_profile: bool) -> Result<Credential, AuthError> {
        let code = self.identity.acquire_credential().await?;
        let mut profile = if need_profile {
            match self.identity.user_profile().await {
                Ok(profile) => profile,
                Err(e) => {
                    info!("login: profile not shared ({}), using basic profile", e);
                    UserProfile::basic()
                }
            }
        } else {
            UserProfile::default()
        };
        profile.login_type = Some(LoginType::Wechat);
        Ok(Credential { code, profile })
    }
}

// ── Mock ────────────────────────────────────────────────────────────

const AVATARS: [&str; 5] = [
    "/static/head/avatar1.png",
    "/static/head/avatar2.png",
    "/static/head/avatar3.png",
    "/static/head/avatar4.png",
    "/static/head/avatar5.png",
];

const CITIES: [&str; 8] = ["北京", "上海", "广州", "深圳", "杭州", "成都", "武汉", "西安"];

const PHONE_PREFIXES: [&str; 8] = ["138", "139", "158", "159", "188", "189", "178", "198"];

/// Generated development users; no platform round trip.
#[derive(Default)]
pub struct MockCredentials;

impl MockCredentials {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl CredentialProvider for MockCredentials {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn credential(&self, _need_profile: bool) -> Result<Credential, AuthError> {
        let profile = mock_profile(now_millis());
        let code = mock_code(now_millis());
        info!("login: generated mock user {:?}", profile.nick_name);
        Ok(Credential { code, profile })
    }
}

/// A plausible development user.
pub fn mock_profile(timestamp: i64) -> UserProfile {
    let mut rng = rand::thread_rng();
    let random: u32 = rng.gen_range(1000..=10998);
    let ts = timestamp.to_string();
    let serial = format!("{}{}", tail(&ts, 3), tail(&random.to_string(), 2));

    let city = CITIES.choose(&mut rng).copied().unwrap_or(CITIES[0]);
    let province = match city {
        "北京" | "上海" => city,
        _ => "广东",
    };
    let prefix = PHONE_PREFIXES.choose(&mut rng).copied().unwrap_or(PHONE_PREFIXES[0]);
    let suffix: String = (0..8).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect();

    UserProfile {
        nick_name: Some(format!("微信用户{}", serial)),
        avatar_url: AVATARS.choose(&mut rng).map(|a| a.to_string()),
        phone_number: Some(format!("{}{}", prefix, suffix)),
        gender: Some(rng.gen_range(1..=2)),
        city: Some(city.to_string()),
        province: Some(province.to_string()),
        country: Some("中国".into()),
        language: Some("zh_CN".into()),
        open_id: Some(format!("mock_openid_{}_{}", tail(&ts, 4), random)),
        union_id: Some(format!("mock_unionid_{}_{}", tail(&ts, 4), random)),
        login_time: Some(timestamp),
        login_type: Some(LoginType::MockWechat),
        ..Default::default()
    }
}

/// A one-time code in the platform's shape.
pub fn mock_code(timestamp: i64) -> String {
    format!("mock_code_{}_{}", timestamp, base36(11))
}

/// Local session used when the backend cannot be reached.
pub fn fallback_session(mut profile: UserProfile) -> (String, UserProfile) {
    let now = now_millis();
    let mut rng = rand::thread_rng();
    let user_id = format!("mock_user_{}_{}", now, rng.gen_range(0..1000));
    let token = format!("mock_token_{}_{}", now, base36(11));
    warn!("login: backend unreachable, using local session {}", user_id);

    profile.user_id = Some(UserId::Text(user_id.clone()));
    profile.registered_user_id = Some(UserId::Text(user_id));
    profile.platform = Some("wechat_miniprogram".into());
    profile.status = Some("active".into());
    profile.login_type = Some(LoginType::MockWechat);
    profile.login_time.get_or_insert(now);
    profile.extra.insert("registrationTime".into(), now.into());
    profile.extra.insert("isVip".into(), false.into());
    profile.extra.insert("level".into(), 1.into());
    profile.extra.insert("points".into(), 100.into());
    (token, profile)
}

fn tail(s: &str, n: usize) -> &str {
    &s[s.len().saturating_sub(n)..]
}

fn base36(len: usize) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeIdentity;

    #[test]
    fn mock_profile_shape() {
        let p = mock_profile(1_700_000_123_456);
        let nick = p.nick_name.clone().unwrap();
        assert!(nick.starts_with("微信用户456"), "{}", nick);
        assert_eq!(nick.chars().count(), "微信用户".chars().count() + 5);

        let phone = p.phone_number.clone().unwrap();
        assert_eq!(phone.len(), 11);
        assert!(PHONE_PREFIXES.contains(&&phone[..3]));

        let city = p.city.clone().unwrap();
        let province = p.province.clone().unwrap();
        match city.as_str() {
            "北京" | "上海" => assert_eq!(province, city),
            _ => assert_eq!(province, "广东"),
        }
        assert!(matches!(p.gender, Some(1) | Some(2)));
        assert!(p.open_id.as_deref().unwrap().starts_with("mock_openid_3456_"));
        assert!(p.is_mock());
        assert_eq!(p.login_time, Some(1_700_000_123_456));
    }

    #[test]
    fn mock_code_shape() {
        let code = mock_code(42);
        assert!(code.starts_with("mock_code_42_"));
        assert_eq!(code.len(), "mock_code_42_".len() + 11);
    }

    #[test]
    fn fallback_session_synthesizes_identity() {
        let (token, p) = fallback_session(UserProfile::basic());
        assert!(token.starts_with("mock_token_"));
        assert!(p.user_id.unwrap().to_string().starts_with("mock_user_"));
        assert_eq!(p.login_type, Some(LoginType::MockWechat));
        assert_eq!(p.platform.as_deref(), Some("wechat_miniprogram"));
        assert_eq!(p.extra.get("points"), Some(&serde_json::json!(100)));
        assert_eq!(p.nick_name.as_deref(), Some("微信用户"));
    }

    #[tokio::test]
    async fn platform_credential_with_profile() {
        let identity = Arc::new(FakeIdentity::new("abc"));
        let provider = PlatformCredentials::new(identity.clone());

        let cred = provider.credential(true).await.unwrap();
        assert_eq!(cred.code, "abc");
        assert_eq!(cred.profile.nick_name.as_deref(), Some("张三"));
        assert_eq!(cred.profile.login_type, Some(LoginType::Wechat));
    }

    #[tokio::test]
    async fn refused_profile_degrades_to_basic() {
        let identity = Arc::new(FakeIdentity::new("abc"));
        identity.deny_profile();
        let provider = PlatformCredentials::new(identity);

        let cred = provider.credential(true).await.unwrap();
        assert_eq!(cred.profile, UserProfile::basic());
    }

    #[tokio::test]
    async fn refused_code_is_denied() {
        let identity = Arc::new(FakeIdentity::new("abc"));
        identity.deny_credential();
        let provider = PlatformCredentials::new(identity);

        let err = provider.credential(false).await.unwrap_err();
        assert!(matches!(err, AuthError::CredentialDenied(_)));
    }
}
