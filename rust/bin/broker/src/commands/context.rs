//! Wiring shared by every command.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use broker_app::{AppEvent, AppEventKind, AppState, Launcher, Navigator, NullMessageService};
use broker_apply::ApplyController;
use broker_auth::{
    AuthConfig, IdentityProvider, LoginOrchestrator, SessionListener, SessionManager,
    SessionToken, UserProfile,
};
use broker_client::{HttpClient, RestClient, RestConfig};
use broker_core::ClientConfig;
use broker_kv::{KVStore, RedbStore};

use crate::platform::{CliIdentity, ConsoleNavigator};

/// Everything a command needs, built from the client config.
pub struct Context {
    pub config: ClientConfig,
    pub app: Arc<AppState>,
    pub session: Arc<SessionManager>,
    pub login: LoginOrchestrator,
    pub launcher: Launcher,
    pub apply: ApplyController,
    pub nav: Arc<dyn Navigator>,
}

impl Context {
    /// `code` selects platform credentials for login; `profile` is what the
    /// user shares when asked.
    pub fn open(config_path: &Path, code: Option<String>, profile: Option<UserProfile>) -> Result<Self> {
        let config = ClientConfig::load(config_path)?;
        let db_path = config.resolve_db_path(config_path);
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let kv: Arc<dyn KVStore> = Arc::new(
            RedbStore::open(&db_path)
                .map_err(|e| anyhow::anyhow!("failed to open {}: {}", db_path.display(), e))?,
        );

        let rest = RestConfig {
            base_url: config.server.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        };
        let http: Arc<dyn HttpClient> = Arc::new(RestClient::from_config(
            &rest,
            Arc::new(SessionToken::new(kv.clone())),
        )?);

        let app = Arc::new(AppState::new(Arc::new(NullMessageService)));
        app.on(AppEventKind::LoginStateChange, |event| {
            if let AppEvent::LoginStateChange { is_logged_in, .. } = event {
                info!("app: logged in = {}", is_logged_in);
            }
        });

        let auth = AuthConfig {
            dev_fallback: config.dev_fallback,
            mock_credentials: config.mock_credentials && code.is_none(),
        };
        let identity: Arc<dyn IdentityProvider> = Arc::new(CliIdentity::new(code, profile));
        let listener: Arc<dyn SessionListener> = app.clone();
        let session = Arc::new(
            SessionManager::new(kv, http.clone(), identity.clone()).with_listener(listener),
        );
        let nav: Arc<dyn Navigator> = Arc::new(ConsoleNavigator::default());

        Ok(Self {
            login: LoginOrchestrator::from_config(session.clone(), identity, auth),
            launcher: Launcher::new(session.clone(), app.clone(), nav.clone()),
            apply: ApplyController::new(session.clone(), http, nav.clone()),
            config,
            app,
            session,
            nav,
        })
    }
}
