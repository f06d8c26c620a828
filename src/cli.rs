//! Command-line interface for the remote-shell driver.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Which engine the driver runs commands through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EngineKind {
    /// Exec channel per command, engine-tracked directory.
    #[default]
    Exec,
    /// Interactive shell on a pseudo-terminal.
    Pty,
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exec" => Ok(Self::Exec),
            "pty" => Ok(Self::Pty),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exec => f.write_str("exec"),
            Self::Pty => f.write_str("pty"),
        }
    }
}

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// SSH host (overrides config).
    pub host: Option<String>,
    /// SSH port (overrides config).
    pub port: Option<u16>,
    /// Login user (overrides config).
    pub username: Option<String>,
    /// Private key file (overrides config).
    pub key_path: Option<PathBuf>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Engine to drive.
    pub engine: EngineKind,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('H') | Long("host") => {
                result.host = Some(parser.value()?.parse()?);
            }
            Short('p') | Long("port") => {
                let value: String = parser.value()?.parse()?;
                result.port = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("port", value))?,
                );
            }
            Short('u') | Long("username") => {
                result.username = Some(parser.value()?.parse()?);
            }
            Short('i') | Long("identity") => {
                result.key_path = Some(parser.value()?.parse()?);
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('e') | Long("engine") => {
                let value: String = parser.value()?.parse()?;
                result.engine = value
                    .parse()
                    .map_err(|_| ArgsError::InvalidValue("engine", value))?;
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"remote-shell {version}
Stateful remote shell sessions over SSH

USAGE:
    remote-shell [OPTIONS]

Reads commands from stdin, one per line, and runs them in a session on
the configured host.

OPTIONS:
    -H, --host <HOST>       SSH host [default: localhost]
    -p, --port <PORT>       SSH port [default: 22]
    -u, --username <USER>   Login user [default: root]
    -i, --identity <FILE>   Private key file
    -c, --config <FILE>     Path to configuration file (JSON)
    -e, --engine <KIND>     Session engine: exec or pty [default: exec]
    -h, --help              Print help
    -V, --version           Print version

SESSION COMMANDS:
    :pwd                    Show the tracked directory (exec engine)
    :once <COMMAND>         Run on the shared single-shot connection
    :close                  Close this user's session
    :quit                   Close everything and exit

ENVIRONMENT VARIABLES:
    SSH_HOST                Host (overrides config)
    SSH_PORT                Port (overrides config)
    SSH_USERNAME            Login user (overrides config)
    SSH_PASSWORD            Password (overrides config)
    SSH_KEY_PATH            Private key file (overrides config)
    SSH_KEY_PASSPHRASE      Passphrase for the key file
    RUST_LOG                Log filter [default: remote_shell=info]

EXAMPLES:
    # Password from the environment
    SSH_PASSWORD=secret remote-shell -H 10.0.0.5

    # Key authentication with an interactive shell
    remote-shell -H build-box -u deploy -i ~/.ssh/id_ed25519 -e pty

    # Start with config file
    remote-shell -c /etc/remote-shell/config.json
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("remote-shell {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
