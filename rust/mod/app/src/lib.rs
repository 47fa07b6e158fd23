//! Application-level state for the broker assistant.
//!
//! [`AppState`] is the process-wide context: login snapshot, unread count
//! and live message connection, with a typed event bus for subscribers.
//! [`Launcher`] applies the start-up and tab-bar login policy through the
//! [`Navigator`] seam.

pub mod event;
pub mod launcher;
pub mod messages;
pub mod nav;
pub mod profile;
pub mod state;

use thiserror::Error;

pub use event::{AppEvent, AppEventKind};
pub use launcher::{LaunchDecision, Launcher, TabDecision};
pub use messages::{LiveConnection, MessageService, NullMessageService};
pub use nav::{Navigator, Route, navigate_home, return_to_tab};
pub use profile::ProfileView;
pub use state::{AppSnapshot, AppState};

pub use broker_flux::SubscriptionId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AppError {
    #[error("navigation: {0}")]
    Navigation(String),

    #[error("messages: {0}")]
    Messages(String),
}
