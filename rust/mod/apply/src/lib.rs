//! Broker application form.
//!
//! - [`BuildingPicker`]: district → building cascading selection
//! - [`ApplicationForm`]: field state, `can_submit` and ordered field checks
//! - [`ApplyController`]: loads buildings and submits the application once

pub mod building;
pub mod controller;
pub mod form;

use thiserror::Error;

use broker_client::ApiError;

pub use building::{Building, BuildingPicker, District};
pub use controller::{ApplyController, SubmitOutcome};
pub use form::{ApplicationForm, ApplicationRequest, Field, is_valid_phone};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApplyError {
    /// A field check failed; the message is shown as is.
    #[error("validation: {0}")]
    ValidationFailed(String),

    #[error("not authenticated")]
    NotAuthenticated,

    /// No identifier field resolves to a positive integer.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("duplicate submission: {0}")]
    DuplicateSubmission(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("backend rejected ({code}): {message}")]
    BackendRejected { code: i64, message: String },
}

impl From<ApiError> for ApplyError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Network(m) => ApplyError::BackendUnavailable(m),
            ApiError::Decode(m) | ApiError::Auth(m) | ApiError::Io(m) => ApplyError::BackendRejected { code: 0, message: m },
        }
    }
}

impl ApplyError {
    /// Title and body for the toast/modal shown to the user.
    pub fn user_message(&self) -> (&'static str, String) {
        match self {
            ApplyError::ValidationFailed(m) => ("提交失败", m.clone()),
            ApplyError::NotAuthenticated => ("提交失败", "用户未登录".into()),
            ApplyError::InvalidIdentity(fields) => (
                "提交失败",
                format!("用户ID无效，请重新登录。可用字段：{}", fields),
            ),
            ApplyError::DuplicateSubmission(_) => (
                "已有申请",
                "您已提交过申请，请等待审核结果。我们将在1-3个工作日内完成审核。".into(),
            ),
            ApplyError::BackendUnavailable(_) => ("提交失败", "网络连接失败，请重试".into()),
            ApplyError::BackendRejected { message, .. } => ("提交失败", message.clone()),
        }
    }
}
