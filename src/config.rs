//! Configuration management for remote-shell.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::pty::ShellTuning;
use crate::transport::{Credential, PtySize, SshTarget};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Managed host and credentials.
    pub ssh: SshSection,
    /// Session behaviour shared by both engines.
    pub session: SessionSection,
    /// Interactive shell tuning.
    pub pty: PtySection,
}

/// SSH connection section.
///
/// Secrets are never serialized back out.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSection {
    /// Host name or address.
    pub host: String,
    /// Port number.
    pub port: u16,
    /// Login user.
    pub username: String,
    /// Password, if authenticating by password.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Private key file, if authenticating by key.
    pub key_path: Option<PathBuf>,
    /// Passphrase for the key file.
    #[serde(skip_serializing)]
    pub key_passphrase: Option<String>,
    /// Bound on connecting and authenticating, in seconds.
    pub connect_timeout_secs: u64,
    /// Pinned SHA-256 host key fingerprint.
    pub host_key_fingerprint: Option<String>,
}

impl Default for SshSection {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 22,
            username: "root".to_string(),
            password: None,
            key_path: None,
            key_passphrase: None,
            connect_timeout_secs: 15,
            host_key_fingerprint: None,
        }
    }
}

impl fmt::Debug for SshSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshSection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key_path", &self.key_path)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("host_key_fingerprint", &self.host_key_fingerprint)
            .finish()
    }
}

/// Session section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Default per-command timeout, in seconds.
    pub command_timeout_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            command_timeout_secs: 30,
        }
    }
}

/// Interactive shell section. Every value here is a best-effort heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PtySection {
    /// Terminal type.
    pub term: String,
    /// Terminal width.
    pub cols: u16,
    /// Terminal height.
    pub rows: u16,
    /// Pause after the shell starts, in milliseconds.
    pub settle_ms: u64,
    /// Bound on one read attempt, in milliseconds.
    pub poll_interval_ms: u64,
    /// Output must exceed this many bytes to finish early.
    pub min_output_bytes: usize,
    /// Overall bound on reading one command's output, in milliseconds.
    pub max_wait_ms: u64,
    /// Strip terminal control sequences from output.
    pub strip_ansi: bool,
}

impl Default for PtySection {
    fn default() -> Self {
        let tuning = ShellTuning::default();
        Self {
            term: tuning.term,
            cols: tuning.size.cols,
            rows: tuning.size.rows,
            settle_ms: tuning.settle.as_millis() as u64,
            poll_interval_ms: tuning.poll_interval.as_millis() as u64,
            min_output_bytes: tuning.min_output_bytes,
            max_wait_ms: tuning.max_wait.as_millis() as u64,
            strip_ansi: tuning.strip_ansi,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from any variable source.
    ///
    /// Empty values count as unset. An unparsable port is ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());

        if let Some(host) = var("SSH_HOST") {
            self.ssh.host = host;
        }

        if let Some(port) = var("SSH_PORT") {
            if let Ok(port) = port.parse() {
                self.ssh.port = port;
            }
        }

        if let Some(username) = var("SSH_USERNAME") {
            self.ssh.username = username;
        }

        if let Some(password) = var("SSH_PASSWORD") {
            self.ssh.password = Some(password);
        }

        if let Some(path) = var("SSH_KEY_PATH") {
            self.ssh.key_path = Some(PathBuf::from(path));
        }

        if let Some(passphrase) = var("SSH_KEY_PASSPHRASE") {
            self.ssh.key_passphrase = Some(passphrase);
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref host) = args.host {
            self.ssh.host = host.clone();
        }

        if let Some(port) = args.port {
            self.ssh.port = port;
        }

        if let Some(ref username) = args.username {
            self.ssh.username = username.clone();
        }

        // A key given on the command line wins over a configured password
        if let Some(ref path) = args.key_path {
            self.ssh.key_path = Some(path.clone());
            self.ssh.password = None;
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut config = Config::default();

        // Load from config file if specified
        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        // Apply environment variable overrides
        config.apply_env();

        // Apply CLI argument overrides (highest priority)
        config.apply_args(args);

        Ok(config)
    }

    /// Check that a connection can be attempted at all.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssh.host.trim().is_empty() {
            return Err(ConfigError::MissingField("ssh.host"));
        }
        if self.ssh.username.trim().is_empty() {
            return Err(ConfigError::MissingField("ssh.username"));
        }
        if self.session.command_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "session.command_timeout_secs",
                "0".to_string(),
            ));
        }
        self.credential().map(|_| ())
    }

    fn credential(&self) -> Result<Credential, ConfigError> {
        let password = self.ssh.password.as_ref().filter(|p| !p.is_empty());
        let key_path = self
            .ssh
            .key_path
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty());

        match (password, key_path) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingCredentials),
            (None, None) => Err(ConfigError::MissingCredential),
            (Some(password), None) => Ok(Credential::Password(password.clone())),
            (None, Some(path)) => Ok(Credential::KeyFile {
                path: path.clone(),
                passphrase: self.ssh.key_passphrase.clone(),
            }),
        }
    }

    /// Build the connection target.
    pub fn ssh_target(&self) -> Result<SshTarget, ConfigError> {
        Ok(SshTarget {
            host: self.ssh.host.clone(),
            port: self.ssh.port,
            username: self.ssh.username.clone(),
            credential: self.credential()?,
            connect_timeout: Duration::from_secs(self.ssh.connect_timeout_secs),
            host_key_fingerprint: self.ssh.host_key_fingerprint.clone(),
        })
    }

    /// Build the interactive engine's tuning.
    pub fn shell_tuning(&self) -> ShellTuning {
        ShellTuning {
            term: self.pty.term.clone(),
            size: PtySize::new(self.pty.rows, self.pty.cols),
            settle: Duration::from_millis(self.pty.settle_ms),
            poll_interval: Duration::from_millis(self.pty.poll_interval_ms),
            min_output_bytes: self.pty.min_output_bytes,
            max_wait: Duration::from_millis(self.pty.max_wait_ms),
            strip_ansi: self.pty.strip_ansi,
        }
    }

    /// Default per-command timeout.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.session.command_timeout_secs)
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// A required value is empty.
    MissingField(&'static str),
    /// A value is out of range.
    InvalidValue(&'static str, String),
    /// Neither a password nor a key file is configured.
    MissingCredential,
    /// Both a password and a key file are configured.
    ConflictingCredentials,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::MissingField(name) => write!(f, "{} is required", name),
            Self::InvalidValue(name, value) => write!(f, "invalid value for {}: '{}'", name, value),
            Self::MissingCredential => {
                write!(f, "either SSH_PASSWORD or SSH_KEY_PATH is required")
            }
            Self::ConflictingCredentials => {
                write!(f, "set only one of SSH_PASSWORD and SSH_KEY_PATH")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
