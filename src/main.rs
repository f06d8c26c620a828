//! remote-shell binary entry point.
//!
//! A line-oriented driver: each stdin line is routed to the chosen engine
//! as a single session owner, and the outcome is printed.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use remote_shell::cli::{self, Args, EngineKind};
use remote_shell::{
    logging, CommandOutcome, Config, ExecEngine, PtyEngine, SingleShotConnection, SshTransport,
    Transport, UserId,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

/// Session owner for every line read from stdin.
const DRIVER_USER: UserId = UserId::new(1);

/// The engine the driver routes to.
enum Driver {
    Exec(ExecEngine),
    Pty {
        engine: PtyEngine,
        single_shot: SingleShotConnection,
    },
}

impl Driver {
    fn new(kind: EngineKind, transport: Arc<dyn Transport>, config: &Config) -> Self {
        match kind {
            EngineKind::Exec => {
                Driver::Exec(ExecEngine::new(transport).with_probe_timeout(config.command_timeout()))
            }
            EngineKind::Pty => Driver::Pty {
                single_shot: SingleShotConnection::new(Arc::clone(&transport)),
                engine: PtyEngine::with_tuning(transport, config.shell_tuning()),
            },
        }
    }

    fn single_shot(&self) -> &SingleShotConnection {
        match self {
            Driver::Exec(engine) => engine.single_shot(),
            Driver::Pty { single_shot, .. } => single_shot,
        }
    }

    async fn create_session(&self, user: UserId) -> bool {
        match self {
            Driver::Exec(engine) => engine.create_session(user).await,
            Driver::Pty { engine, .. } => engine.create_session(user).await,
        }
    }

    async fn execute(&self, user: UserId, command: &str, timeout: Duration) -> CommandOutcome {
        match self {
            Driver::Exec(engine) => engine.execute(user, command, timeout).await,
            Driver::Pty { engine, .. } => engine.execute(user, command, timeout).await,
        }
    }

    async fn current_directory(&self, user: UserId, timeout: Duration) -> CommandOutcome {
        match self {
            Driver::Exec(engine) => engine.get_current_directory(user).await,
            // The interactive shell tracks its own directory
            Driver::Pty { engine, .. } => engine.execute(user, "pwd", timeout).await,
        }
    }

    async fn close_session(&self, user: UserId) {
        match self {
            Driver::Exec(engine) => engine.close_session(user).await,
            Driver::Pty { engine, .. } => engine.close_session(user).await,
        }
    }

    async fn close_all(&self) {
        match self {
            Driver::Exec(engine) => engine.close_all_sessions().await,
            Driver::Pty {
                engine,
                single_shot,
            } => {
                engine.close_all_sessions().await;
                single_shot.close().await;
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Try 'remote-shell --help' for more information.");
            return ExitCode::FAILURE;
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }

    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args).and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::try_init() {
        eprintln!("warning: logging already initialized: {}", e);
    }

    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let target = config.ssh_target()?;
    info!(
        "remote-shell v{} targeting {} ({} engine)",
        env!("CARGO_PKG_VERSION"),
        target.display_name(),
        args.engine
    );

    let transport: Arc<dyn Transport> = Arc::new(SshTransport::new(target));
    let driver = Driver::new(args.engine, transport, &config);
    let user = DRIVER_USER;
    let timeout = config.command_timeout();

    info!("Testing SSH connection...");
    if driver.single_shot().connect().await {
        info!("SSH connection test successful");
    } else {
        warn!("SSH connection test failed");
    }

    if !driver.create_session(user).await {
        driver.close_all().await;
        return Err(format!("failed to start session for user {}", user).into());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        };

        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let outcome = match line {
            ":quit" => break,
            ":pwd" => driver.current_directory(user, timeout).await,
            ":close" => {
                driver.close_session(user).await;
                CommandOutcome::success(format!("session for user {} closed", user))
            }
            _ => match line.strip_prefix(":once ") {
                Some(command) => driver.single_shot().execute_command(command, timeout).await,
                None => driver.execute(user, line, timeout).await,
            },
        };

        print_outcome(&outcome);
    }

    driver.close_all().await;
    info!("shutdown complete");
    Ok(())
}

fn print_outcome(outcome: &CommandOutcome) {
    if outcome.success {
        println!("{}", outcome.text);
    } else {
        println!("error: {}", outcome.text);
    }
}
