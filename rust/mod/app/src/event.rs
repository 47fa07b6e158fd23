use broker_auth::UserProfile;
use broker_flux::Event;

/// Change notifications published by [`AppState`](crate::AppState).
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    LoginStateChange {
        is_logged_in: bool,
        user_info: Option<UserProfile>,
    },
    UnreadCountChange(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppEventKind {
    LoginStateChange,
    UnreadCountChange,
}

impl Event for AppEvent {
    type Kind = AppEventKind;

    fn kind(&self) -> AppEventKind {
        match self {
            AppEvent::LoginStateChange { .. } => AppEventKind::LoginStateChange,
            AppEvent::UnreadCountChange(_) => AppEventKind::UnreadCountChange,
        }
    }
}
