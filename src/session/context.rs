//! Engine-side session state and remote state probing.

use std::sync::atomic::{AtomicU64, Ordering};

/// Tracked state of an exec-channel session.
///
/// `cwd` is the authoritative record of the emulated working directory.
/// It is only replaced with a path the host itself reported.
#[derive(Debug, Clone)]
pub struct SessionContext {
    cwd: String,
}

impl SessionContext {
    /// Create a context seeded with the host-reported starting directory.
    pub fn new(cwd: impl Into<String>) -> Self {
        Self { cwd: cwd.into() }
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Record a directory change the host confirmed.
    pub fn confirm_cwd(&mut self, cwd: impl Into<String>) {
        self.cwd = cwd.into();
    }
}

static MARKER_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Commands and parsers for querying remote shell state.
pub struct StateProbe;

impl StateProbe {
    /// The command that reports the working directory.
    pub fn cwd_command() -> &'static str {
        "pwd"
    }

    /// Parse the working directory from `pwd` output.
    ///
    /// Takes the last non-empty line so a login banner printed by the
    /// remote shell does not end up as the directory.
    pub fn parse_cwd(output: &str) -> Option<String> {
        output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .filter(|line| line.starts_with('/'))
            .map(str::to_string)
    }

    /// Generate a unique marker for output detection.
    pub fn marker(prefix: &str) -> String {
        use std::time::{SystemTime, UNIX_EPOCH};
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let seq = MARKER_COUNTER.fetch_add(1, Ordering::Relaxed);
        format!("__{}_{}_{}_MARKER__", prefix, timestamp, seq)
    }

    /// Generate an echo command that prints `marker` without the echoed
    /// command line containing it verbatim.
    ///
    /// The marker is split by an empty quoted string, so the terminal echo
    /// shows `__X""_...` while the output shows `__X_...`.
    pub fn echo_marker(marker: &str) -> String {
        let split = marker.len().min(2);
        format!("echo {}\"\"{}", &marker[..split], &marker[split..])
    }
}
