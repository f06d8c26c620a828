//! In-memory stand-in for a managed host.
//!
//! Simulates a small directory tree with symlinks and unreadable
//! directories, a handful of shell builtins, exit statuses, stderr, slow
//! commands, a directory that is slow to enter and broken connections. Interactive shells echo each line the
//! way a terminal does and keep their own working directory.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use remote_shell::transport::{Connection, PtySize, RemoteOutput, ShellHandle, Transport};
use remote_shell::{RemoteShellError, Result};
use tokio::sync::mpsc;

/// Where every fresh process starts.
pub const HOME: &str = "/home/user";

/// Sent when an interactive shell starts.
pub const BANNER: &str = "Last login: Mon Oct 19 09:12:44 2026 from 10.0.0.2\r\n";

#[derive(Default)]
struct HostState {
    dirs: BTreeSet<String>,
    symlinks: HashMap<String, String>,
    denied: HashSet<String>,
    slow: HashSet<String>,
    commands: Vec<String>,
}

/// The simulated host. Share it between a transport and the test.
pub struct FakeHost {
    state: Mutex<HostState>,
    unreachable: AtomicBool,
    connects: AtomicUsize,
    open: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    next_id: AtomicUsize,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        let host = FakeHost {
            state: Mutex::new(HostState::default()),
            unreachable: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
            open: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
        };

        for dir in [
            "/",
            "/home",
            HOME,
            "/home/user/projects",
            "/home/user/my docs",
            "/home/user/R&D",
            "/home/other",
            "/root",
            "/srv",
            "/srv/releases",
            "/srv/releases/v2",
            "/var/slow",
            "/tmp",
            "/var",
            "/var/log",
        ] {
            host.add_dir(dir);
        }
        host.add_symlink("/srv/current", "/srv/releases/v2");
        host.deny("/root");
        host.slow_to_enter("/var/slow");

        Arc::new(host)
    }

    pub fn add_dir(&self, path: &str) {
        self.state.lock().unwrap().dirs.insert(path.to_string());
    }

    pub fn add_symlink(&self, link: &str, target: &str) {
        self.state
            .lock()
            .unwrap()
            .symlinks
            .insert(link.to_string(), target.to_string());
    }

    pub fn deny(&self, path: &str) {
        self.state.lock().unwrap().denied.insert(path.to_string());
    }

    /// Make `cd` into `path` take two seconds.
    pub fn slow_to_enter(&self, path: &str) {
        self.state.lock().unwrap().slow.insert(path.to_string());
    }

    fn is_slow(&self, path: &str) -> bool {
        self.state.lock().unwrap().slow.contains(path)
    }

    /// Make every following connection attempt fail.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Successful connection attempts so far.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Connections neither closed nor dropped.
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Most exec-channel commands ever running at once since the last
    /// reset.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn reset_peak(&self) {
        self.peak_in_flight.store(0, Ordering::SeqCst);
    }

    /// Every command line received, in order.
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn last_command(&self) -> Option<String> {
        self.state.lock().unwrap().commands.last().cloned()
    }

    pub fn transport(self: &Arc<Self>) -> Arc<dyn Transport> {
        Arc::new(FakeTransport {
            host: Arc::clone(self),
        })
    }

    fn log(&self, command: &str) {
        self.state.lock().unwrap().commands.push(command.to_string());
    }

    /// Physical resolution of a `cd` argument, as the host sees it.
    fn resolve(&self, cwd: &str, arg: &str) -> std::result::Result<String, &'static str> {
        let expanded = if arg == "~" {
            HOME.to_string()
        } else if let Some(rest) = arg.strip_prefix("~/") {
            format!("{}/{}", HOME, rest)
        } else if arg.starts_with('/') {
            arg.to_string()
        } else {
            format!("{}/{}", cwd, arg)
        };

        let state = self.state.lock().unwrap();
        let mut parts: Vec<String> = Vec::new();

        for segment in expanded.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                name => {
                    let candidate = format!("/{}", {
                        let mut joined = parts.clone();
                        joined.push(name.to_string());
                        joined.join("/")
                    });
                    let physical = state
                        .symlinks
                        .get(&candidate)
                        .cloned()
                        .unwrap_or(candidate);

                    if !state.dirs.contains(&physical) {
                        return Err("No such file or directory");
                    }
                    if state.denied.contains(&physical) {
                        return Err("Permission denied");
                    }
                    parts = physical
                        .split('/')
                        .filter(|p| !p.is_empty())
                        .map(str::to_string)
                        .collect();
                }
            }
        }

        Ok(format!("/{}", parts.join("/")))
    }

    fn list(&self, cwd: &str) -> String {
        let state = self.state.lock().unwrap();
        let prefix = if cwd == "/" {
            "/".to_string()
        } else {
            format!("{}/", cwd)
        };

        let mut names: Vec<&str> = state
            .dirs
            .iter()
            .chain(state.symlinks.keys())
            .filter_map(|path| path.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .collect();
        names.sort_unstable();

        names
            .into_iter()
            .map(|name| format!("{}\n", name))
            .collect()
    }
}

/// Outcome of one simulated command line.
#[derive(Debug, Default)]
pub struct Exit {
    pub stdout: String,
    pub stderr: String,
    pub status: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Separator {
    Start,
    And,
    Then,
}

fn segments(line: &str) -> Option<Vec<(Separator, Vec<String>)>> {
    let mut result = Vec::new();
    let mut current = Vec::new();
    let mut separator = Separator::Start;

    for token in shlex::split(line)? {
        let (word, next) = match token.as_str() {
            "&&" => (None, Some(Separator::And)),
            ";" => (None, Some(Separator::Then)),
            t if t.ends_with(';') => (
                Some(t.trim_end_matches(';').to_string()),
                Some(Separator::Then),
            ),
            _ => (Some(token.clone()), None),
        };

        if let Some(word) = word {
            current.push(word);
        }
        if let Some(next) = next {
            result.push((separator, std::mem::take(&mut current)));
            separator = next;
        }
    }
    if !current.is_empty() {
        result.push((separator, current));
    }

    Some(result)
}

/// Run a command line with `cwd` as the shell's directory.
async fn run_line(host: &FakeHost, cwd: &mut String, line: &str) -> Result<Exit> {
    let mut exit = Exit::default();

    let Some(segments) = segments(line) else {
        exit.stderr = "bash: syntax error: unexpected end of file\n".into();
        exit.status = 2;
        return Ok(exit);
    };

    let mut skipping = false;
    for (separator, words) in segments {
        match separator {
            Separator::And if exit.status != 0 => skipping = true,
            Separator::Then => skipping = false,
            _ => {}
        }
        if skipping || words.is_empty() {
            continue;
        }
        let status = run_simple(host, cwd, &words, &mut exit).await?;
        exit.status = status;
    }

    Ok(exit)
}

async fn run_simple(
    host: &FakeHost,
    cwd: &mut String,
    words: &[String],
    exit: &mut Exit,
) -> Result<u32> {
    let args = &words[1..];

    let status = match words[0].as_str() {
        "cd" => {
            let target = args.first().map(String::as_str).unwrap_or("~");
            match host.resolve(cwd, target) {
                Ok(resolved) => {
                    if host.is_slow(&resolved) {
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                    *cwd = resolved;
                    0
                }
                Err(reason) => {
                    exit.stderr.push_str(&format!("bash: cd: {}: {}\n", target, reason));
                    1
                }
            }
        }
        "pwd" => {
            exit.stdout.push_str(&format!("{}\n", cwd));
            0
        }
        "echo" => {
            match args.split_last() {
                Some((last, rest)) if last == ">&2" => {
                    exit.stderr.push_str(&format!("{}\n", rest.join(" ")));
                }
                _ => exit.stdout.push_str(&format!("{}\n", args.join(" "))),
            }
            0
        }
        "ls" => {
            exit.stdout.push_str(&host.list(cwd));
            0
        }
        "true" => 0,
        "false" => 1,
        "exit" => args.first().and_then(|a| a.parse().ok()).unwrap_or(0),
        "sleep" => {
            let secs: f64 = args.first().and_then(|a| a.parse().ok()).unwrap_or(1.0);
            tokio::time::sleep(Duration::from_secs_f64(secs)).await;
            0
        }
        "reset-connection" => {
            return Err(RemoteShellError::Transport("connection reset by peer".into()));
        }
        other => {
            exit.stderr.push_str(&format!("bash: {}: command not found\n", other));
            127
        }
    };

    Ok(status)
}

pub struct FakeTransport {
    host: Arc<FakeHost>,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        tokio::task::yield_now().await;

        if self.host.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteShellError::Connect("connection refused".into()));
        }

        self.host.connects.fetch_add(1, Ordering::SeqCst);
        self.host.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            host: Arc::clone(&self.host),
            id: self.host.next_id.fetch_add(1, Ordering::SeqCst),
            closed: false,
        }))
    }
}

pub struct FakeConnection {
    host: Arc<FakeHost>,
    id: usize,
    closed: bool,
}

/// Counts a command as running until dropped, including when the caller
/// gives up on it.
struct InFlight<'a>(&'a FakeHost);

impl<'a> InFlight<'a> {
    fn enter(host: &'a FakeHost) -> Self {
        let now = host.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        host.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(host)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connection for FakeConnection {
    async fn run(&mut self, command: &str) -> Result<RemoteOutput> {
        if self.closed {
            return Err(RemoteShellError::Transport("connection closed".into()));
        }
        self.host.log(command);

        let _guard = InFlight::enter(&self.host);
        let mut cwd = HOME.to_string();
        let exit = run_line(&self.host, &mut cwd, command).await?;

        Ok(RemoteOutput::new(exit.status, exit.stdout, exit.stderr))
    }

    async fn spawn_shell(&mut self, term: &str, size: PtySize) -> Result<ShellHandle> {
        if self.closed {
            return Err(RemoteShellError::Transport("connection closed".into()));
        }
        self.host
            .log(&format!("<shell {} {}x{} #{}>", term, size.cols, size.rows, self.id));

        let (input_tx, input_rx) = mpsc::channel(64);
        let (output_tx, output_rx) = mpsc::channel(64);
        let (error_tx, error_rx) = mpsc::channel(64);

        let task = tokio::spawn(fake_shell(
            Arc::clone(&self.host),
            input_rx,
            output_tx,
            error_tx,
        ));

        Ok(ShellHandle::new(input_tx, output_rx, error_rx, Some(task)))
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.host.open.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.host.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

fn prompt(cwd: &str) -> String {
    let shown = if cwd == HOME { "~" } else { cwd };
    format!("\x1b[01;32muser@fake\x1b[0m:\x1b[01;34m{}\x1b[0m$ ", shown)
}

fn crlf(text: &str) -> String {
    text.replace('\n', "\r\n")
}

/// Interactive shell loop.
///
/// Each line's echo, output and next prompt go out as one chunk. A line
/// that sleeps gets its echo flushed first, as a terminal shows the typed
/// line while the command runs. `hang` freezes the shell; `exit` ends it.
async fn fake_shell(
    host: Arc<FakeHost>,
    mut input: mpsc::Receiver<Vec<u8>>,
    output: mpsc::Sender<Vec<u8>>,
    _error: mpsc::Sender<Vec<u8>>,
) {
    let mut cwd = HOME.to_string();
    let mut pending = String::new();
    let mut frozen = false;

    let greeting = format!("{}{}", BANNER, prompt(&cwd));
    if output.send(greeting.into_bytes()).await.is_err() {
        return;
    }

    while let Some(data) = input.recv().await {
        pending.push_str(&String::from_utf8_lossy(&data));

        while let Some(newline) = pending.find('\n') {
            let line: String = pending.drain(..=newline).collect();
            let line = line.trim_end_matches(['\r', '\n']).to_string();

            if frozen {
                continue;
            }
            host.log(&line);

            let mut response = format!("{}\r\n", line);
            match line.trim() {
                "hang" => {
                    frozen = true;
                    continue;
                }
                "exit" => {
                    response.push_str("logout\r\n");
                    let _ = output.send(response.into_bytes()).await;
                    return;
                }
                _ => {}
            }

            if line.contains("sleep") {
                if output.send(response.into_bytes()).await.is_err() {
                    return;
                }
                response = String::new();
            }

            match run_line(&host, &mut cwd, &line).await {
                Ok(exit) => {
                    response.push_str(&crlf(&exit.stdout));
                    response.push_str(&crlf(&exit.stderr));
                }
                Err(_) => return,
            }
            response.push_str(&prompt(&cwd));

            if output.send(response.into_bytes()).await.is_err() {
                return;
            }
        }
    }
}
