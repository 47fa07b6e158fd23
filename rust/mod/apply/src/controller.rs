use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use broker_app::{Navigator, Route, return_to_tab};
use broker_auth::SessionManager;
use broker_client::{ApiRequest, ApiResponse, HttpClient};

use crate::ApplyError;
use crate::building::{Building, BuildingPicker};
use crate::form::{ApplicationForm, ApplicationRequest, Field};

/// Business code for a repeated application.
const CODE_CONFLICT: i64 = 409;

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Not submittable yet, or a submission is already running.
    Ignored,
    Submitted { message: Option<String> },
}

/// Drives the application page: building list, form and submission.
pub struct ApplyController {
    session: Arc<SessionManager>,
    http: Arc<dyn HttpClient>,
    nav: Arc<dyn Navigator>,
    form: Mutex<ApplicationForm>,
    picker: Mutex<BuildingPicker>,
    submitting: AtomicBool,
}

struct Submitting<'a>(&'a AtomicBool);

impl Drop for Submitting<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ApplyController {
    pub fn new(session: Arc<SessionManager>, http: Arc<dyn HttpClient>, nav: Arc<dyn Navigator>) -> Self {
        Self {
            session,
            http,
            nav,
            form: Mutex::new(ApplicationForm::new()),
            picker: Mutex::new(BuildingPicker::new()),
            submitting: AtomicBool::new(false),
        }
    }

    fn form_mut(&self) -> MutexGuard<'_, ApplicationForm> {
        self.form.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn picker_mut(&self) -> MutexGuard<'_, BuildingPicker> {
        self.picker.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Form ──

    pub fn form(&self) -> ApplicationForm {
        self.form_mut().clone()
    }

    pub fn set_field(&self, field: Field, value: impl Into<String>) {
        self.form_mut().set_field(field, value);
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    // ── Buildings ──

    pub fn picker(&self) -> BuildingPicker {
        self.picker_mut().clone()
    }

    /// Fetch the buildings open for application. Returns how many loaded.
    pub async fn load_buildings(&self) -> Result<usize, ApplyError> {
        let resp = self
            .http
            .request(ApiRequest::get("/buildings-for-application"))
            .await?;
        let buildings: Vec<Building> = match classify(&resp, "获取楼盘列表失败")? {
            Some(data) => serde_json::from_value(data).map_err(|e| ApplyError::BackendRejected {
                code: 200,
                message: format!("malformed building list: {}", e),
            })?,
            None => Vec::new(),
        };
        let count = buildings.len();
        self.picker_mut().load(buildings);
        info!("apply: loaded {} buildings", count);
        Ok(count)
    }

    pub fn open_picker(&self) {
        self.picker_mut().open();
    }

    pub fn close_picker(&self) {
        self.picker_mut().close();
    }

    pub fn select_district(&self, name: &str) -> bool {
        self.picker_mut().select_district(name)
    }

    pub fn select_building(&self, id: i64) -> bool {
        self.picker_mut().select_building(id)
    }

    /// Move the picked building into the form.
    pub fn confirm_building(&self) -> Result<Building, ApplyError> {
        let building = self.picker_mut().confirm()?;
        self.form_mut().set_building(&building);
        Ok(building)
    }

    // ── Submit ──

    /// Submit the application once.
    ///
    /// A duplicate (`409`) and a success both return the user to the "my" tab.
    /// Failures are not retried.
    pub async fn submit(&self) -> Result<SubmitOutcome, ApplyError> {
        let form = self.form();
        if !form.can_submit() || self.submitting.swap(true, Ordering::SeqCst) {
            return Ok(SubmitOutcome::Ignored);
        }
        let _guard = Submitting(&self.submitting);

        form.check()?;

        let status = self.session.status();
        let user = match (status.is_logged_in, status.user_info) {
            (true, Some(user)) => user,
            _ => return Err(ApplyError::NotAuthenticated),
        };
        let user_id = user
            .numeric_id()
            .ok_or_else(|| ApplyError::InvalidIdentity(user.identity_fields()))?;

        let body = ApplicationRequest::new(user_id, &form)?;
        let body = serde_json::to_value(&body).map_err(|e| ApplyError::BackendRejected {
            code: 0,
            message: e.to_string(),
        })?;
        info!("apply: submitting application for user {}", user_id);
        let resp = self
            .http
            .request(ApiRequest::post("/broker-applications", body))
            .await?;

        match classify(&resp, "提交申请失败") {
            Ok(_) => {
                self.form_mut().reset();
                info!("apply: application submitted");
                return_to_tab(self.nav.as_ref(), &Route::My);
                Ok(SubmitOutcome::Submitted {
                    message: resp.message(),
                })
            }
            Err(e @ ApplyError::DuplicateSubmission(_)) => {
                warn!("apply: duplicate application");
                return_to_tab(self.nav.as_ref(), &Route::My);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

/// Check status and business code; returns the payload on success.
fn classify(resp: &ApiResponse, fallback: &str) -> Result<Option<serde_json::Value>, ApplyError> {
    let code = resp.data.get("code").and_then(|c| c.as_i64());
    let message = || resp.message().unwrap_or_else(|| fallback.to_string());

    if resp.status_code == 409 || code == Some(CODE_CONFLICT) {
        return Err(ApplyError::DuplicateSubmission(message()));
    }
    if resp.status_code >= 500 {
        return Err(ApplyError::BackendUnavailable(format!("HTTP {}", resp.status_code)));
    }
    if resp.status_code != 200 {
        return Err(ApplyError::BackendRejected {
            code: resp.status_code as i64,
            message: message(),
        });
    }
    let env = resp.envelope::<serde_json::Value>()?;
    if !env.is_ok() {
        return Err(ApplyError::BackendRejected {
            code: env.code,
            message: message(),
        });
    }
    Ok(env.data)
}
