//! Session handoff for matched pairs
//!
//! This module turns pairs claimed by the pairing scheduler into persisted
//! sessions and best-effort notifications, outside the pool lock.

pub mod handoff;
pub mod notifier;
pub mod storage;

// Re-export commonly used types
pub use handoff::{HandoffOutcome, SessionHandoff};
pub use notifier::{CompositeNotifier, MatchNotifier, MockMatchNotifier};
pub use storage::{InMemorySessionStore, SessionStore};
