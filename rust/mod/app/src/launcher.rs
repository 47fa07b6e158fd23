use std::sync::Arc;

use tracing::{info, warn};

use broker_auth::SessionManager;

use crate::nav::{Navigator, Route};
use crate::state::AppState;

/// Navigation taken at launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchDecision {
    Stay,
    /// Logged in on the login page: go to the home tab.
    EnterHome,
    /// Logged out outside the login page.
    RedirectLogin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabDecision {
    Switched,
    RedirectLogin,
}

/// Launch, show and tab-bar policy.
pub struct Launcher {
    session: Arc<SessionManager>,
    app: Arc<AppState>,
    nav: Arc<dyn Navigator>,
}

impl Launcher {
    pub fn new(session: Arc<SessionManager>, app: Arc<AppState>, nav: Arc<dyn Navigator>) -> Self {
        Self { session, app, nav }
    }

    /// Load the session into the app state and route accordingly.
    pub async fn on_launch(&self) -> LaunchDecision {
        let valid = self.session.check_validity().await;
        let status = self.session.status();
        self.app
            .set_login_status(valid && status.is_logged_in, status.user_info)
            .await;

        let on_login = self.nav.current_route() == Some(Route::Login);
        let decision = match (self.app.is_logged_in(), on_login) {
            (true, true) => LaunchDecision::EnterHome,
            (false, false) => LaunchDecision::RedirectLogin,
            _ => LaunchDecision::Stay,
        };
        info!("launch: {:?}", decision);

        let result = match decision {
            LaunchDecision::EnterHome => self.nav.switch_tab(&Route::Home),
            LaunchDecision::RedirectLogin => self.nav.redirect(&Route::Login),
            LaunchDecision::Stay => Ok(()),
        };
        if let Err(e) = result {
            warn!("launch: navigation failed: {}", e);
        }
        decision
    }

    /// Re-read the session when the app comes to the foreground.
    ///
    /// Notifies only when the login state flipped; never navigates.
    /// Returns whether it flipped.
    pub async fn on_show(&self) -> bool {
        let valid = self.session.check_validity().await;
        let status = self.session.status();
        let logged_in = valid && status.is_logged_in;

        if logged_in != self.app.is_logged_in() {
            self.app.set_login_status(logged_in, status.user_info).await;
            true
        } else {
            self.app.refresh_user(status.user_info);
            false
        }
    }

    /// Background check: a session that went invalid forces logout.
    ///
    /// Returns whether the user was logged out.
    pub async fn enforce_session(&self) -> bool {
        if !self.app.is_logged_in() || self.session.check_validity().await {
            return false;
        }
        warn!("launch: session no longer valid, logging out");
        self.session.logout().await;
        if self.app.is_logged_in() {
            self.app.set_login_status(false, None).await;
        }
        if let Err(e) = self.nav.redirect(&Route::Login) {
            warn!("launch: redirect to login failed: {}", e);
        }
        true
    }

    /// Tab-bar selection: logged-out users go to the login page.
    pub fn select_tab(&self, tab: &Route) -> TabDecision {
        if !self.app.is_logged_in() {
            if let Err(e) = self.nav.redirect(&Route::Login) {
                warn!("tab: redirect to login failed: {}", e);
            }
            return TabDecision::RedirectLogin;
        }
        if let Err(e) = self.nav.switch_tab(tab) {
            warn!("tab: switch to {} failed: {}", tab, e);
        }
        TabDecision::Switched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppError;
    use crate::messages::NullMessageService;
    use broker_auth::testing::{FakeHttp, FakeIdentity};
    use broker_auth::{SessionListener, UserProfile};
    use broker_kv::MemoryStore;
    use std::sync::Mutex;

    struct FakeNav {
        current: Mutex<Option<Route>>,
        log: Mutex<Vec<String>>,
    }

    impl FakeNav {
        fn at(route: Route) -> Arc<Self> {
            Arc::new(Self {
                current: Mutex::new(Some(route)),
                log: Mutex::new(Vec::new()),
            })
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl Navigator for FakeNav {
        fn redirect(&self, route: &Route) -> Result<(), AppError> {
            self.log.lock().unwrap().push(format!("redirect {}", route));
            *self.current.lock().unwrap() = Some(route.clone());
            Ok(())
        }

        fn switch_tab(&self, route: &Route) -> Result<(), AppError> {
            self.log.lock().unwrap().push(format!("switch {}", route));
            *self.current.lock().unwrap() = Some(route.clone());
            Ok(())
        }

        fn go_back(&self) -> Result<(), AppError> {
            self.log.lock().unwrap().push("back".into());
            Ok(())
        }

        fn current_route(&self) -> Option<Route> {
            self.current.lock().unwrap().clone()
        }
    }

    struct Fixture {
        identity: Arc<FakeIdentity>,
        session: Arc<SessionManager>,
        app: Arc<AppState>,
        nav: Arc<FakeNav>,
        launcher: Launcher,
    }

    fn fixture(at: Route) -> Fixture {
        let app = Arc::new(AppState::new(Arc::new(NullMessageService)));
        let identity = Arc::new(FakeIdentity::new("abc"));
        let listener: Arc<dyn SessionListener> = app.clone();
        let session = Arc::new(
            SessionManager::new(Arc::new(MemoryStore::new()), Arc::new(FakeHttp::new()), identity.clone())
                .with_listener(listener),
        );
        let nav = FakeNav::at(at);
        let launcher = Launcher::new(session.clone(), app.clone(), nav.clone());
        Fixture {
            identity,
            session,
            app,
            nav,
            launcher,
        }
    }

    fn user() -> UserProfile {
        UserProfile {
            nick_name: Some("微信用户12345".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn fresh_launch_redirects_to_login() {
        let f = fixture(Route::Home);
        assert_eq!(f.launcher.on_launch().await, LaunchDecision::RedirectLogin);
        assert_eq!(f.nav.log(), vec!["redirect /pages/login/login"]);
        assert!(!f.app.is_logged_in());
    }

    #[tokio::test]
    async fn fresh_launch_on_login_page_stays() {
        let f = fixture(Route::Login);
        assert_eq!(f.launcher.on_launch().await, LaunchDecision::Stay);
        assert!(f.nav.log().is_empty());
    }

    #[tokio::test]
    async fn stored_session_on_login_page_enters_home() {
        let f = fixture(Route::Login);
        f.session.persist("T1", &user()).unwrap();

        assert_eq!(f.launcher.on_launch().await, LaunchDecision::EnterHome);
        assert_eq!(f.nav.log(), vec!["switch /pages/home/index"]);
        assert!(f.app.is_logged_in());
        assert_eq!(f.app.user_info(), Some(user()));
    }

    #[tokio::test]
    async fn expired_session_at_launch_redirects() {
        let f = fixture(Route::My);
        f.session.persist("T1", &user()).unwrap();
        f.identity.set_session_valid(false);

        assert_eq!(f.launcher.on_launch().await, LaunchDecision::RedirectLogin);
        assert!(!f.session.status().is_logged_in);
    }

    #[tokio::test]
    async fn on_show_never_navigates() {
        let f = fixture(Route::My);
        assert!(!f.launcher.on_show().await);

        f.session.persist("T1", &user()).unwrap();
        assert!(f.launcher.on_show().await);
        assert!(f.app.is_logged_in());
        assert!(!f.launcher.on_show().await);
        assert!(f.nav.log().is_empty());
    }

    #[tokio::test]
    async fn enforce_session_logs_out_invalid_session() {
        let f = fixture(Route::Home);
        f.session.persist("T1", &user()).unwrap();
        f.launcher.on_launch().await;
        assert!(!f.launcher.enforce_session().await);

        f.identity.set_session_valid(false);
        assert!(f.launcher.enforce_session().await);
        assert!(!f.app.is_logged_in());
        assert_eq!(f.nav.log(), vec!["redirect /pages/login/login"]);
    }

    #[tokio::test]
    async fn tab_requires_login() {
        let f = fixture(Route::Home);
        assert_eq!(f.launcher.select_tab(&Route::My), TabDecision::RedirectLogin);

        f.app.set_login_status(true, Some(user())).await;
        assert_eq!(f.launcher.select_tab(&Route::My), TabDecision::Switched);
        assert_eq!(
            f.nav.log(),
            vec!["redirect /pages/login/login", "switch /pages/my/index"]
        );
    }
}
