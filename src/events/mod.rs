//! Push notifications to connected observers.

pub mod http;
pub mod hub;
pub mod wire;

pub use hub::{NotificationHub, Subscription};
pub use wire::format_event;
