//! PTY engine tests against the in-memory host's interactive shell.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{FakeHost, BANNER, HOME};
use remote_shell::pty::{MarkerCompletion, EMPTY_OUTPUT_TEXT};
use remote_shell::{FailureKind, PtyEngine, PtySize, ShellTuning, UserId};

const TIMEOUT: Duration = Duration::from_secs(5);

fn fast_tuning() -> ShellTuning {
    ShellTuning {
        settle: Duration::from_millis(50),
        poll_interval: Duration::from_millis(50),
        max_wait: Duration::from_millis(500),
        ..Default::default()
    }
}

fn setup() -> (Arc<FakeHost>, PtyEngine) {
    let host = FakeHost::new();
    let engine = PtyEngine::with_tuning(host.transport(), fast_tuning());
    (host, engine)
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

#[tokio::test]
async fn test_create_session_requests_terminal() {
    let (host, engine) = setup();
    let user = UserId::new(1);

    assert!(engine.create_session(user).await);
    assert!(engine.has_session(user));

    let shell = host.commands().into_iter().next().unwrap();
    assert!(shell.starts_with("<shell xterm-256color 80x24"));
}

#[tokio::test]
async fn test_custom_terminal_size() {
    let host = FakeHost::new();
    let tuning = ShellTuning {
        size: PtySize::new(50, 200),
        ..fast_tuning()
    };
    let engine = PtyEngine::with_tuning(host.transport(), tuning);

    assert!(engine.create_session(UserId::new(1)).await);
    assert!(host.commands()[0].contains("200x50"));
}

#[tokio::test]
async fn test_create_session_unreachable_host() {
    let (host, engine) = setup();
    host.set_unreachable(true);

    assert!(!engine.create_session(UserId::new(1)).await);
    assert_eq!(engine.session_count(), 0);
}

#[tokio::test]
async fn test_execute_without_session_fails() {
    let (host, engine) = setup();

    let outcome = engine.execute(UserId::new(4), "ls", TIMEOUT).await;
    assert!(!outcome.success);
    assert!(outcome.failed_with(FailureKind::NoActiveSession));
    assert_eq!(host.connects(), 0);
}

#[tokio::test]
async fn test_output_excludes_echo_banner_and_escapes() {
    let (_host, engine) = setup();
    let user = UserId::new(1);
    assert!(engine.create_session(user).await);

    let outcome = engine.execute(user, "echo hello world", TIMEOUT).await;
    assert!(outcome.success, "{}", outcome.text);
    assert_eq!(first_line(&outcome.text), "hello world");
    assert!(!outcome.text.contains("echo hello world"));
    assert!(!outcome.text.contains(BANNER.trim()));
    assert!(!outcome.text.contains('\x1b'));
    assert!(!outcome.text.contains('\r'));
}

#[tokio::test]
async fn test_shell_keeps_its_own_directory() {
    let (_host, engine) = setup();
    let user = UserId::new(1);
    assert!(engine.create_session(user).await);

    let outcome = engine.execute(user, "pwd", TIMEOUT).await;
    assert_eq!(first_line(&outcome.text), HOME);

    engine.execute(user, "cd /var/log", TIMEOUT).await;
    let outcome = engine.execute(user, "pwd", TIMEOUT).await;
    assert_eq!(first_line(&outcome.text), "/var/log");
}

#[tokio::test]
async fn test_silent_command_leaves_only_prompt() {
    let (_host, engine) = setup();
    let user = UserId::new(1);
    assert!(engine.create_session(user).await);

    // Echo plus a prompt: only the prompt survives cleaning
    let outcome = engine.execute(user, "true", TIMEOUT).await;
    assert!(outcome.success);
    assert!(!outcome.text.contains("true"));
    assert!(outcome.text.ends_with('$'));
}

#[tokio::test]
async fn test_raw_output_keeps_escapes() {
    let host = FakeHost::new();
    let tuning = ShellTuning {
        strip_ansi: false,
        ..fast_tuning()
    };
    let engine = PtyEngine::with_tuning(host.transport(), tuning);
    let user = UserId::new(1);
    assert!(engine.create_session(user).await);

    let outcome = engine.execute(user, "echo plain", TIMEOUT).await;
    assert_eq!(first_line(&outcome.text), "plain");
    assert!(outcome.text.contains("\x1b[01;32m"));
}

#[tokio::test]
async fn test_hung_shell_times_out() {
    let (_host, engine) = setup();
    let user = UserId::new(1);
    assert!(engine.create_session(user).await);

    assert!(engine.execute(user, "hang", TIMEOUT).await.failed_with(FailureKind::Timeout));

    let outcome = engine.execute(user, "echo anyone", TIMEOUT).await;
    assert!(!outcome.success);
    assert!(outcome.failed_with(FailureKind::Timeout));
}

fn marker_engine(host: &Arc<FakeHost>) -> PtyEngine {
    PtyEngine::with_tuning(host.transport(), fast_tuning())
        .with_policy(Arc::new(MarkerCompletion::default()))
}

#[tokio::test]
async fn test_call_timeout_returns_partial_output() {
    let host = FakeHost::new();
    let engine = marker_engine(&host);
    let user = UserId::new(1);
    assert!(engine.create_session(user).await);

    // The echo arrives, the marker does not: what was read is the result
    let started = Instant::now();
    let outcome = engine
        .execute(user, "sleep 2", Duration::from_millis(300))
        .await;
    assert!(outcome.success, "{}", outcome.text);
    assert_eq!(outcome.text, EMPTY_OUTPUT_TEXT);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_call_timeout_without_output_is_timeout() {
    let host = FakeHost::new();
    let engine = marker_engine(&host);
    let user = UserId::new(1);
    assert!(engine.create_session(user).await);

    let started = Instant::now();
    let outcome = engine
        .execute(user, "hang", Duration::from_millis(300))
        .await;
    assert!(outcome.failed_with(FailureKind::Timeout));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_marker_policy_survives_trailing_comment() {
    let host = FakeHost::new();
    let engine = marker_engine(&host);
    let user = UserId::new(1);
    assert!(engine.create_session(user).await);

    let outcome = engine
        .execute(user, "echo hi # note", Duration::from_secs(2))
        .await;
    assert!(outcome.success, "{}", outcome.text);
    assert_eq!(outcome.text, "hi");

    let commands = host.commands();
    assert!(commands.contains(&"echo hi # note".to_string()));
    assert!(commands.last().unwrap().starts_with("echo __"));
}

#[tokio::test]
async fn test_marker_policy_empty_command() {
    let host = FakeHost::new();
    let engine = marker_engine(&host);
    let user = UserId::new(1);
    assert!(engine.create_session(user).await);

    let outcome = engine.execute(user, "", Duration::from_secs(2)).await;
    assert!(outcome.success, "{}", outcome.text);
    assert_eq!(outcome.text, EMPTY_OUTPUT_TEXT);
}

#[tokio::test]
async fn test_adaptive_policy_truncates_slow_command() {
    let (_host, engine) = setup();
    let user = UserId::new(1);
    assert!(engine.create_session(user).await);

    // Only the echo arrives before the shell goes quiet
    let outcome = engine
        .execute(user, "sleep 0.3; echo finished", TIMEOUT)
        .await;
    assert!(outcome.success);
    assert_eq!(outcome.text, EMPTY_OUTPUT_TEXT);

    // The late output is discarded before the next command
    tokio::time::sleep(Duration::from_millis(500)).await;
    let outcome = engine.execute(user, "echo next", TIMEOUT).await;
    assert_eq!(first_line(&outcome.text), "next");
    assert!(!outcome.text.contains("finished"));
}

#[tokio::test]
async fn test_marker_policy_waits_for_slow_command() {
    let host = FakeHost::new();
    let engine = marker_engine(&host);
    let user = UserId::new(1);
    assert!(engine.create_session(user).await);

    let outcome = engine
        .execute(user, "sleep 0.3; echo finished", TIMEOUT)
        .await;
    assert!(outcome.success, "{}", outcome.text);
    assert_eq!(outcome.text, "finished");

    let outcome = engine.execute(user, "cd /tmp; pwd", TIMEOUT).await;
    assert_eq!(outcome.text, "/tmp");
}

#[tokio::test]
async fn test_closed_shell_fails_next_command() {
    let (_host, engine) = setup();
    let user = UserId::new(1);
    assert!(engine.create_session(user).await);

    let outcome = engine.execute(user, "exit", TIMEOUT).await;
    assert_eq!(outcome.text, "logout");

    let outcome = engine.execute(user, "ls", TIMEOUT).await;
    assert!(!outcome.success);
    assert!(outcome.failed_with(FailureKind::Transport));
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let (_host, engine) = setup();
    let alice = UserId::new(1);
    let bob = UserId::new(2);
    assert!(engine.create_session(alice).await);
    assert!(engine.create_session(bob).await);

    engine.execute(alice, "cd /srv", TIMEOUT).await;

    let outcome = engine.execute(bob, "pwd", TIMEOUT).await;
    assert_eq!(first_line(&outcome.text), HOME);
    let outcome = engine.execute(alice, "pwd", TIMEOUT).await;
    assert_eq!(first_line(&outcome.text), "/srv");
}

#[tokio::test]
async fn test_close_session_is_idempotent() {
    let (host, engine) = setup();
    let user = UserId::new(1);

    engine.close_session(user).await;

    assert!(engine.create_session(user).await);
    engine.close_session(user).await;
    engine.close_session(user).await;

    assert!(!engine.has_session(user));
    assert_eq!(host.open_connections(), 0);
    assert!(engine
        .execute(user, "ls", TIMEOUT)
        .await
        .failed_with(FailureKind::NoActiveSession));
}

#[tokio::test]
async fn test_close_all_sessions() {
    let (host, engine) = setup();
    for id in 1..=3 {
        assert!(engine.create_session(UserId::new(id)).await);
    }

    engine.close_all_sessions().await;

    assert_eq!(engine.session_count(), 0);
    assert_eq!(host.open_connections(), 0);
}

#[tokio::test]
async fn test_recreate_session_starts_fresh_shell() {
    let (host, engine) = setup();
    let user = UserId::new(1);
    assert!(engine.create_session(user).await);
    engine.execute(user, "cd /tmp", TIMEOUT).await;

    assert!(engine.create_session(user).await);
    let outcome = engine.execute(user, "pwd", TIMEOUT).await;
    assert_eq!(first_line(&outcome.text), HOME);
    assert_eq!(host.open_connections(), 1);
}
