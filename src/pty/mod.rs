//! Interactive shell engine.
//!
//! Each user gets a real shell attached to a pseudo-terminal, so the shell
//! itself keeps the working directory, environment and history. The cost
//! is that nothing marks the end of a command's output: completion is
//! decided by a [`CompletionPolicy`], and every parameter of that decision
//! lives in [`ShellTuning`]. All of it is best-effort.

mod cleaner;
mod completion;
mod engine;
mod sanitizer;

pub use cleaner::{clean_output, EMPTY_OUTPUT_TEXT};
pub use completion::{
    AdaptiveCompletion, CompletionPolicy, FramedCommand, MarkerCompletion, ReadDecision,
    ReadEvent, ReadProgress,
};
pub use engine::{PtyEngine, PtySession};
pub use sanitizer::OutputSanitizer;

use std::time::Duration;

use crate::transport::PtySize;

/// Terminal and timing parameters of the interactive engine.
///
/// The defaults suit a responsive host and short commands. None of the
/// timing values guarantee complete output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellTuning {
    /// Terminal type requested for the pseudo-terminal.
    pub term: String,
    /// Terminal dimensions.
    pub size: PtySize,
    /// Pause after the shell starts, before output is drained and the
    /// session counts as ready.
    pub settle: Duration,
    /// Bound on one read attempt.
    pub poll_interval: Duration,
    /// Output must exceed this many bytes to finish early.
    pub min_output_bytes: usize,
    /// Overall bound on reading one command's output.
    pub max_wait: Duration,
    /// Strip terminal control sequences from output.
    pub strip_ansi: bool,
}

impl Default for ShellTuning {
    fn default() -> Self {
        Self {
            term: "xterm-256color".to_string(),
            size: PtySize::default(),
            settle: Duration::from_millis(500),
            poll_interval: Duration::from_millis(100),
            min_output_bytes: 10,
            max_wait: Duration::from_secs(3),
            strip_ansi: true,
        }
    }
}

impl ShellTuning {
    /// The timing heuristic configured by these parameters.
    pub fn adaptive_completion(&self) -> AdaptiveCompletion {
        AdaptiveCompletion {
            poll_interval: self.poll_interval,
            min_output_bytes: self.min_output_bytes,
            max_wait: self.max_wait,
        }
    }
}
