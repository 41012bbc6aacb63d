//! Listing moderation: the pending/active/rejected state machine, user blocking, and the
//! outbound notifier boundary.

pub mod notifier;
pub mod workflow;

pub use notifier::{DeadlineNotifier, Notifier, NotifierError};
pub use workflow::{BlockOutcome, Decision, ModerationWorkflow, TransitionOutcome};
