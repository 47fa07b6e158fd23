use std::fmt;

use tracing::warn;

use crate::AppError;

/// Pages of the mini-program.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Home,
    Message,
    Statis,
    My,
    BrokerApply,
    Other(String),
}

impl Route {
    pub fn path(&self) -> &str {
        match self {
            Route::Login => "pages/login/login",
            Route::Home => "pages/home/index",
            Route::Message => "pages/message/index",
            Route::Statis => "pages/statis/index",
            Route::My => "pages/my/index",
            Route::BrokerApply => "pages/broker/apply/index",
            Route::Other(path) => path,
        }
    }

    /// Tab-bar pages, reached with `switch_tab`.
    pub fn is_tab(&self) -> bool {
        matches!(self, Route::Home | Route::Message | Route::Statis | Route::My)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.path())
    }
}

/// Navigation facility of the host platform.
pub trait Navigator: Send + Sync {
    /// Close every page and open `route` (`reLaunch`).
    fn redirect(&self, route: &Route) -> Result<(), AppError>;

    fn switch_tab(&self, route: &Route) -> Result<(), AppError>;

    fn go_back(&self) -> Result<(), AppError>;

    fn current_route(&self) -> Option<Route>;
}

/// Switch to a tab, going back when the switch fails.
pub fn return_to_tab(nav: &dyn Navigator, tab: &Route) {
    if let Err(e) = nav.switch_tab(tab) {
        warn!("nav: switch to {} failed ({}), going back", tab, e);
        if let Err(e) = nav.go_back() {
            warn!("nav: go back failed: {}", e);
        }
    }
}

/// Switch to the home tab, relaunching into it when the switch fails.
pub fn navigate_home(nav: &dyn Navigator) {
    if let Err(e) = nav.switch_tab(&Route::Home) {
        warn!("nav: switch to home failed ({}), relaunching", e);
        if let Err(e) = nav.redirect(&Route::Home) {
            warn!("nav: relaunch home failed: {}", e);
        }
    }
}
