//! Exec-channel session engine.
//!
//! Provides a persistent-shell illusion over a primitive that starts a
//! fresh remote process per command:
//! - per-user sessions with an engine-tracked working directory
//! - `cd` emulation confirmed by the host
//! - per-call timeouts that never mutate session state
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use remote_shell::exec::ExecEngine;
//! use remote_shell::{SshTransport, UserId};
//! # async fn demo(transport: SshTransport) {
//! let engine = ExecEngine::new(Arc::new(transport));
//! let user = UserId::new(42);
//!
//! engine.execute(user, "cd /var/log", Duration::from_secs(30)).await;
//! let outcome = engine.execute(user, "ls", Duration::from_secs(30)).await;
//! println!("{}", outcome.text);
//! # }
//! ```

mod command;
mod engine;
mod outcome;

pub(crate) use command::run_bounded;
pub use command::{directory_probe, in_directory, ShellRequest};
pub use engine::{ExecEngine, ExecSession, DEFAULT_TIMEOUT};
pub use outcome::{CommandOutcome, FailureKind};
