//! # remote-shell
//!
//! Stateful remote shell sessions over SSH.
//!
//! Two engines give each user of a command router something that behaves
//! like their own shell on one managed host:
//!
//! - **Exec-channel engine** ([`ExecEngine`]): every command runs in a
//!   fresh remote process; the working directory is tracked by the engine,
//!   replayed into each command and confirmed by the host on `cd`.
//! - **PTY engine** ([`PtyEngine`]): a real interactive shell per user,
//!   with heuristic end-of-output detection.
//!
//! A shared [`SingleShotConnection`] serves one-off commands that need no
//! per-user state.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use remote_shell::{Config, ExecEngine, SshTransport, UserId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     remote_shell::logging::try_init().ok();
//!
//!     let config = Config::from_env();
//!     config.validate()?;
//!
//!     let engine = ExecEngine::new(Arc::new(SshTransport::new(config.ssh_target()?)));
//!     let user = UserId::new(1);
//!
//!     let outcome = engine.execute(user, "cd /tmp", Duration::from_secs(30)).await;
//!     println!("{}", outcome);
//!
//!     engine.close_all_sessions().await;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod pty;
pub mod session;
pub mod single_shot;
pub mod transport;

// Re-export commonly used types
pub use config::Config;
pub use error::{RemoteShellError, Result};
pub use exec::{CommandOutcome, ExecEngine, FailureKind};
pub use pty::{CompletionPolicy, PtyEngine, ShellTuning};
pub use session::{SessionContext, UserId};
pub use single_shot::SingleShotConnection;
pub use transport::{
    Connection, Credential, PtySize, RemoteOutput, ShellHandle, SshTarget, SshTransport, Transport,
};
