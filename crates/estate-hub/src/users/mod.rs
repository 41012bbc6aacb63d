//! Platform users, the blocked set and per-user notification inboxes.

pub mod directory;
pub mod notifications;

pub use directory::{BlockedUser, User, UserContact, UserDirectory};
pub use notifications::{Notification, NotificationFeed, NotificationKind};
