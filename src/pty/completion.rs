//! Deciding when an interactive command has finished producing output.
//!
//! A shell attached to a terminal never says "done". The read loop in the
//! engine therefore asks a [`CompletionPolicy`] after every read attempt
//! whether to keep waiting. Both policies here are best-effort.

use std::fmt;
use std::time::Duration;

use crate::session::StateProbe;

/// What the last read attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEvent {
    /// New bytes arrived.
    Data,
    /// The poll interval passed with nothing to read.
    Idle,
}

/// Verdict of a completion policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadDecision {
    /// Keep reading.
    Continue,
    /// The output is complete.
    Done,
    /// Give up; nothing usable arrived in time.
    TimedOut,
}

/// Snapshot handed to [`CompletionPolicy::decide`].
#[derive(Debug, Clone, Copy)]
pub struct ReadProgress<'a> {
    /// Everything read since the command was written.
    pub accumulated: &'a [u8],
    /// Time since the command was written.
    pub elapsed: Duration,
    /// Result of the most recent read attempt.
    pub event: ReadEvent,
    /// Terminator the framed command is expected to print, if any.
    pub terminator: Option<&'a str>,
}

/// The line actually written to the shell for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedCommand {
    /// Text to write, without the trailing newline. May span several
    /// lines; the first is the user's command.
    pub line: String,
    /// Output that marks the end of the command's output.
    pub terminator: Option<String>,
}

impl FramedCommand {
    /// Frame a command as-is, with no terminator.
    pub fn plain(command: &str) -> Self {
        Self {
            line: command.to_string(),
            terminator: None,
        }
    }
}

/// Pluggable end-of-output detection.
pub trait CompletionPolicy: Send + Sync + fmt::Debug {
    /// How long a single read attempt waits for data.
    fn poll_interval(&self) -> Duration;

    /// Turn a user command into the line to write.
    fn frame(&self, command: &str) -> FramedCommand {
        FramedCommand::plain(command)
    }

    /// Decide after each read attempt.
    fn decide(&self, progress: &ReadProgress<'_>) -> ReadDecision;
}

/// Timing heuristic: stop once enough output containing a line break has
/// arrived, or once the shell goes quiet after producing something.
///
/// Slow commands that pause longer than `poll_interval` get truncated, and
/// unrelated shell activity such as a prompt redraw can end up in the
/// output.
#[derive(Debug, Clone)]
pub struct AdaptiveCompletion {
    /// Bound on one read attempt.
    pub poll_interval: Duration,
    /// Output must exceed this many bytes to finish on arrival.
    pub min_output_bytes: usize,
    /// Overall bound on the read loop.
    pub max_wait: Duration,
}

impl Default for AdaptiveCompletion {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            min_output_bytes: 10,
            max_wait: Duration::from_secs(3),
        }
    }
}

impl CompletionPolicy for AdaptiveCompletion {
    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn decide(&self, progress: &ReadProgress<'_>) -> ReadDecision {
        let have_output = !progress.accumulated.is_empty();

        if progress.elapsed >= self.max_wait {
            return if have_output {
                ReadDecision::Done
            } else {
                ReadDecision::TimedOut
            };
        }

        match progress.event {
            ReadEvent::Data
                if progress.accumulated.len() > self.min_output_bytes
                    && progress.accumulated.contains(&b'\n') =>
            {
                ReadDecision::Done
            }
            ReadEvent::Idle if have_output => ReadDecision::Done,
            _ => ReadDecision::Continue,
        }
    }
}

/// Sentinel framing: each command is followed by an `echo` of a unique
/// marker on its own line, and output is complete when the marker comes
/// back.
///
/// The separate line keeps the `echo` out of reach of a trailing comment,
/// a background `&` or an empty command. The echoed line shows the marker
/// split by an empty quoted string, so only the `echo` itself can produce
/// the terminator.
#[derive(Debug, Clone)]
pub struct MarkerCompletion {
    /// Bound on one read attempt.
    pub poll_interval: Duration,
    /// Overall bound on the read loop.
    pub max_wait: Duration,
}

impl Default for MarkerCompletion {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            max_wait: Duration::from_secs(30),
        }
    }
}

impl CompletionPolicy for MarkerCompletion {
    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn frame(&self, command: &str) -> FramedCommand {
        let marker = StateProbe::marker("DONE");
        FramedCommand {
            line: format!("{}\n{}", command, StateProbe::echo_marker(&marker)),
            terminator: Some(marker),
        }
    }

    fn decide(&self, progress: &ReadProgress<'_>) -> ReadDecision {
        let finished = progress.terminator.is_some_and(|marker| {
            progress
                .accumulated
                .windows(marker.len())
                .any(|window| window == marker.as_bytes())
        });

        if finished {
            ReadDecision::Done
        } else if progress.elapsed >= self.max_wait {
            if progress.accumulated.is_empty() {
                ReadDecision::TimedOut
            } else {
                ReadDecision::Done
            }
        } else {
            ReadDecision::Continue
        }
    }
}
