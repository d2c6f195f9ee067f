//! Session-scoped credential and scope state.
//!
//! This module provides:
//! - `Session`: the per-session API key, resolved scope, and active client
//! - `SessionEvent`: the invalidation channel consumed by the coordinator
//!
//! Nothing here is persisted - credentials live in memory for one session
//! and are gone on logout or process exit.

pub mod session;

pub use session::{Scope, Session, SessionEvent, ACCOUNT_SCOPE_KEY};
