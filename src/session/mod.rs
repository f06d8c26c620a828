//! Session management module.
//!
//! This module provides the pieces both engines share: user identification,
//! the per-engine registry with its per-session guard, tracked session
//! state, and lexical path resolution for emulated `cd`.

mod context;
mod id;
pub mod path;
mod registry;

pub use context::{SessionContext, StateProbe};
pub use id::UserId;
pub use registry::{teardown, ManagedSession, SessionRegistry, SessionSlot};
