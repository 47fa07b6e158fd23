//! Flux: typed publish/subscribe for client state changes.
//!
//! Events are a closed enum chosen by the application. Each event reports its
//! [`Event::Kind`]; subscribers register either for one kind or for every
//! event, and are called synchronously in registration order.
//!
//! # Example
//!
//! ```ignore
//! use broker_flux::{Bus, Event};
//!
//! #[derive(Debug, Clone)]
//! enum AppEvent { UnreadCountChange(u32) }
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! enum AppEventKind { UnreadCountChange }
//!
//! impl Event for AppEvent {
//!     type Kind = AppEventKind;
//!     fn kind(&self) -> AppEventKind { AppEventKind::UnreadCountChange }
//! }
//!
//! let bus = Bus::new();
//! let id = bus.on(AppEventKind::UnreadCountChange, |e| println!("{:?}", e));
//! bus.emit(&AppEvent::UnreadCountChange(3));
//! bus.off(id);
//! ```

pub mod bus;

pub use bus::{Bus, Event, Handler, SubscriptionId};
