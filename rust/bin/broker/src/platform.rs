//! Terminal stand-ins for the mini-program platform.

use std::sync::Mutex;

use tracing::debug;

use broker_app::{AppError, Navigator, Route};
use broker_auth::service::provider::mock_code;
use broker_auth::{AuthError, IdentityProvider, UserProfile};

/// Identity from command-line flags.
pub struct CliIdentity {
    code: Option<String>,
    profile: Option<UserProfile>,
}

impl CliIdentity {
    pub fn new(code: Option<String>, profile: Option<UserProfile>) -> Self {
        Self { code, profile }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for CliIdentity {
    async fn acquire_credential(&self) -> Result<String, AuthError> {
        Ok(self
            .code
            .clone()
            .unwrap_or_else(|| mock_code(broker_core::now_millis())))
    }

    /// A terminal has no platform session to expire.
    async fn check_session(&self) -> Result<bool, AuthError> {
        Ok(true)
    }

    async fn user_profile(&self) -> Result<UserProfile, AuthError> {
        self.profile
            .clone()
            .ok_or_else(|| AuthError::CredentialDenied("no profile given (use --nick)".into()))
    }
}

/// Records the current page; navigation is only logged.
#[derive(Default)]
pub struct ConsoleNavigator {
    current: Mutex<Option<Route>>,
}

impl ConsoleNavigator {
    fn go(&self, how: &str, route: &Route) {
        debug!("nav: {} {}", how, route);
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(route.clone());
    }
}

impl Navigator for ConsoleNavigator {
    fn redirect(&self, route: &Route) -> Result<(), AppError> {
        self.go("redirect", route);
        Ok(())
    }

    fn switch_tab(&self, route: &Route) -> Result<(), AppError> {
        if !route.is_tab() {
            return Err(AppError::Navigation(format!("{} is not a tab", route)));
        }
        self.go("switch", route);
        Ok(())
    }

    fn go_back(&self) -> Result<(), AppError> {
        debug!("nav: back");
        Ok(())
    }

    fn current_route(&self) -> Option<Route> {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
