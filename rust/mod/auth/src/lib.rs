//! Client-side authentication for the broker assistant.
//!
//! - **SessionManager**: persisted token, cached profile, validity checks,
//!   refresh and logout
//! - **LoginOrchestrator**: credential → backend exchange → session, with a
//!   local fallback when the backend is unreachable
//! - **CredentialProvider**: platform or generated development credentials
//!
//! Login-state changes are pushed to a [`SessionListener`] (the app state).
//!
//! # Usage
//!
//! ```ignore
//! use broker_auth::{AuthConfig, LoginOrchestrator, SessionManager, SessionToken};
//!
//! let http = Arc::new(RestClient::new(server, Arc::new(SessionToken::new(kv.clone())))?);
//! let session = Arc::new(SessionManager::new(kv, http, identity.clone()).with_listener(app));
//! let login = LoginOrchestrator::from_config(session, identity, AuthConfig::default());
//! let outcome = login.login(false).await?;
//! ```

pub mod model;
pub mod service;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use model::{Gender, LoginType, SessionStatus, UserId, UserProfile};
pub use service::login::{LoginOrchestrator, LoginOutcome, LoginPath, LoginPhase};
pub use service::provider::{
    CredentialProvider, IdentityProvider, MockCredentials, PlatformCredentials,
};
pub use service::session::{SessionManager, SessionToken};
pub use service::{AuthConfig, AuthError, SessionListener};
