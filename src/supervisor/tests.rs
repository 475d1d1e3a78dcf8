use super::launch::{self, SpawnOutcome};
use super::readiness::{wait_until_ready, ReadyOutcome};
use super::*;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

static SCRIPT_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Loopback /health endpoint whose readiness is controlled by the test:
/// answers 200 starting from the `healthy_after`-th hit (0 = immediately,
/// `u32::MAX` = never), 503 before that.
struct HealthServer {
    addr: SocketAddr,
    healthy_after: Arc<AtomicU32>,
    hits: Arc<AtomicU32>,
}

async fn start_health_server(healthy_after: u32) -> HealthServer {
    let healthy_after = Arc::new(AtomicU32::new(healthy_after));
    let hits = Arc::new(AtomicU32::new(0));

    let handler_threshold = Arc::clone(&healthy_after);
    let handler_hits = Arc::clone(&hits);
    let app = axum::Router::new().route(
        "/health",
        axum::routing::get(move || {
            let threshold = Arc::clone(&handler_threshold);
            let hits = Arc::clone(&handler_hits);
            async move {
                let hit = hits.fetch_add(1, Ordering::SeqCst) + 1;
                if hit >= threshold.load(Ordering::SeqCst) {
                    axum::http::StatusCode::OK
                } else {
                    axum::http::StatusCode::SERVICE_UNAVAILABLE
                }
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind health server");
    let addr = listener.local_addr().expect("health server addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    HealthServer {
        addr,
        healthy_after,
        hits,
    }
}

/// A port that nothing listens on.
async fn dead_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind probe port");
    let port = listener.local_addr().expect("probe port").port();
    drop(listener);
    port
}

/// Temp shell script standing in for the gateway entry point; the file is
/// removed again when the guard drops.
#[cfg(unix)]
struct ScratchScript {
    path: std::path::PathBuf,
}

#[cfg(unix)]
impl ScratchScript {
    fn path(&self) -> std::path::PathBuf {
        self.path.clone()
    }
}

#[cfg(unix)]
impl Drop for ScratchScript {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(unix)]
fn scratch_script(contents: &str) -> ScratchScript {
    let path = std::env::temp_dir().join(format!(
        "openclaw-gateway-test-{}-{}.sh",
        std::process::id(),
        SCRIPT_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::write(&path, contents).expect("write scratch script");
    ScratchScript { path }
}

fn fast_config(port: u16, node_binary: &str, entry: std::path::PathBuf) -> SupervisorConfig {
    let mut config = SupervisorConfig::new(node_binary.into(), entry, port);
    config.max_readiness_attempts = 5;
    config.poll_interval = Duration::from_millis(40);
    config.probe_timeout = Duration::from_millis(300);
    config
}

#[cfg(unix)]
fn unix_config(port: u16) -> (SupervisorConfig, ScratchScript) {
    let script = scratch_script("sleep 30\n");
    (fast_config(port, "/bin/sh", script.path()), script)
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[tokio::test]
async fn probe_normalizes_all_failures_to_false() {
    let client = reqwest::Client::new();
    let timeout = Duration::from_millis(300);

    let unhealthy = start_health_server(u32::MAX).await;
    let base_url = format!("http://127.0.0.1:{}", unhealthy.addr.port());
    assert!(!probe::is_alive(&client, &base_url, timeout).await);

    let port = dead_port().await;
    let base_url = format!("http://127.0.0.1:{port}");
    assert!(!probe::is_alive(&client, &base_url, timeout).await);
}

#[tokio::test]
async fn probe_reports_true_on_success_status() {
    let server = start_health_server(0).await;
    let client = reqwest::Client::new();
    let base_url = format!("http://127.0.0.1:{}", server.addr.port());
    assert!(probe::is_alive(&client, &base_url, Duration::from_millis(300)).await);
}

#[tokio::test]
async fn probe_times_out_against_a_stalled_server() {
    let app = axum::Router::new().route(
        "/health",
        axum::routing::get(|| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            axum::http::StatusCode::OK
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stalled server");
    let addr = listener.local_addr().expect("stalled server addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let client = reqwest::Client::new();
    let base_url = format!("http://127.0.0.1:{}", addr.port());
    let started = Instant::now();
    assert!(!probe::is_alive(&client, &base_url, Duration::from_millis(200)).await);
    // The hard timeout bounds the wait; the handler never answers in time.
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn status_returns_exactly_the_probe_boolean() {
    let server = start_health_server(0).await;
    let supervisor = GatewaySupervisor::new(fast_config(
        server.addr.port(),
        "unused",
        "unused.js".into(),
    ));

    assert!(supervisor.status().await);

    server.healthy_after.store(u32::MAX, Ordering::SeqCst);
    assert!(!supervisor.status().await);
}

#[tokio::test]
async fn readiness_succeeds_on_first_attempt_after_one_sleep() {
    let calls = Arc::new(AtomicU32::new(0));
    let probe_calls = Arc::clone(&calls);
    let outcome = wait_until_ready(5, Duration::from_millis(10), move || {
        let calls = Arc::clone(&probe_calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            true
        }
    })
    .await;

    assert_eq!(outcome, ReadyOutcome::Ready);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn readiness_exhausts_attempts_within_the_wall_clock_bound() {
    let calls = Arc::new(AtomicU32::new(0));
    let probe_calls = Arc::clone(&calls);
    let started = Instant::now();
    let outcome = wait_until_ready(3, Duration::from_millis(20), move || {
        let calls = Arc::clone(&probe_calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            false
        }
    })
    .await;

    assert_eq!(outcome, ReadyOutcome::TimedOut);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(60), "elapsed={elapsed:?}");
    assert!(elapsed < Duration::from_millis(600), "elapsed={elapsed:?}");
}

// Scenario B: gateway already alive, nothing is spawned.
#[tokio::test]
async fn ensure_running_reuses_an_already_alive_gateway() {
    let server = start_health_server(0).await;
    let supervisor = GatewaySupervisor::new(fast_config(
        server.addr.port(),
        "/definitely/not/a/binary",
        "missing.js".into(),
    ));

    let outcome = supervisor.ensure_running().await.expect("ensure_running");
    assert_eq!(outcome, EnsureOutcome::AlreadyRunning);
    assert_eq!(supervisor.owned_pid(), None);
    assert_eq!(server.hits.load(Ordering::SeqCst), 1);
}

// Scenario C: spawn rejected by the OS surfaces as LaunchFailure, slot stays empty.
#[tokio::test]
async fn ensure_running_surfaces_launch_failure() {
    let server = start_health_server(u32::MAX).await;
    let supervisor = GatewaySupervisor::new(fast_config(
        server.addr.port(),
        "/definitely/not/a/binary",
        "missing.js".into(),
    ));

    let err = supervisor.ensure_running().await.expect_err("spawn must fail");
    assert!(err.starts_with("GW_SPAWN:"), "{err}");
    assert_eq!(supervisor.owned_pid(), None);

    // The failure is not sticky: a later call may retry the launch.
    let err = supervisor.ensure_running().await.expect_err("still failing");
    assert!(err.starts_with("GW_SPAWN:"), "{err}");
}

// Scenario A: dead before launch, ready on the 3rd poll, exactly one child.
#[cfg(unix)]
#[tokio::test]
async fn ensure_running_launches_and_reports_ready_on_third_poll() {
    // Hit 1 is the pre-launch probe; hits 2-4 are polls. Healthy from hit 4
    // means the 3rd poll is the first success.
    let server = start_health_server(4).await;
    let (config, _script) = unix_config(server.addr.port());
    let supervisor = GatewaySupervisor::new(config);

    let outcome = supervisor.ensure_running().await.expect("ensure_running");
    assert_eq!(outcome, EnsureOutcome::Ready);
    assert_eq!(server.hits.load(Ordering::SeqCst), 4);

    let pid = supervisor.owned_pid().expect("child handle held");
    assert!(process_alive(pid));

    // Idempotence: the gateway now answers, so a second call is a no-op.
    server.healthy_after.store(0, Ordering::SeqCst);
    let outcome = supervisor.ensure_running().await.expect("second call");
    assert_eq!(outcome, EnsureOutcome::AlreadyRunning);
    assert_eq!(supervisor.owned_pid(), Some(pid));

    supervisor.shutdown();
    // Let the watcher deliver the kill before the runtime is torn down.
    tokio::time::sleep(Duration::from_millis(100)).await;
}

// Scenario D: never ready within the budget; the child is presumed running.
#[cfg(unix)]
#[tokio::test]
async fn ensure_running_times_out_but_keeps_the_child() {
    let server = start_health_server(u32::MAX).await;
    let (mut config, _script) = unix_config(server.addr.port());
    config.max_readiness_attempts = 3;
    let supervisor = GatewaySupervisor::new(config);

    let outcome = supervisor.ensure_running().await.expect("ensure_running");
    assert_eq!(outcome, EnsureOutcome::TimedOut);
    // 1 pre-launch probe + 3 polls.
    assert_eq!(server.hits.load(Ordering::SeqCst), 4);

    let pid = supervisor.owned_pid().expect("child handle kept on timeout");
    assert!(process_alive(pid));

    supervisor.shutdown();
    tokio::time::sleep(Duration::from_millis(100)).await;
}

// Scenario E: shutdown terminates a live child; later status reports false.
#[cfg(unix)]
#[tokio::test]
async fn shutdown_terminates_a_live_child() {
    let port = dead_port().await;
    let (mut config, _script) = unix_config(port);
    config.max_readiness_attempts = 1;
    let supervisor = GatewaySupervisor::new(config);

    let outcome = supervisor.ensure_running().await.expect("ensure_running");
    assert_eq!(outcome, EnsureOutcome::TimedOut);
    let pid = supervisor.owned_pid().expect("child handle held");
    assert!(process_alive(pid));

    supervisor.shutdown();
    assert_eq!(supervisor.owned_pid(), None);

    // Exit is observed asynchronously; give the watcher a moment to reap.
    for _ in 0..50 {
        if !process_alive(pid) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!process_alive(pid));
    assert!(!supervisor.status().await);
}

// Shutdown while the readiness wait is still polling: the child dies right
// away and the in-flight ensure_running still completes with TimedOut.
#[cfg(unix)]
#[tokio::test]
async fn shutdown_during_readiness_wait_terminates_the_child() {
    let server = start_health_server(u32::MAX).await;
    let (mut config, _script) = unix_config(server.addr.port());
    config.max_readiness_attempts = 10;
    let supervisor = Arc::new(GatewaySupervisor::new(config));

    let waiter = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.ensure_running().await })
    };

    // Wait for the pre-launch probe to fail and the spawn to land.
    for _ in 0..50 {
        if supervisor.owned_pid().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let pid = supervisor.owned_pid().expect("child spawned mid-wait");
    assert!(process_alive(pid));

    supervisor.shutdown();
    assert_eq!(supervisor.owned_pid(), None);

    for _ in 0..50 {
        if !process_alive(pid) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!process_alive(pid));

    // The wait keeps polling a gateway that will never answer and then
    // reports the timeout; shutdown does not error it out.
    let outcome = waiter.await.expect("join waiter").expect("ensure_running");
    assert_eq!(outcome, EnsureOutcome::TimedOut);
}

// Scenario F: shutdown with no live handle is a no-op.
#[tokio::test]
async fn shutdown_without_a_child_is_a_noop() {
    let port = dead_port().await;
    let supervisor = GatewaySupervisor::new(fast_config(port, "unused", "unused.js".into()));

    supervisor.shutdown();
    supervisor.shutdown();
    assert_eq!(supervisor.owned_pid(), None);
}

// An exit observed mid-wait clears the slot and allows a later relaunch.
#[cfg(unix)]
#[tokio::test]
async fn child_exit_clears_the_handle_for_relaunch() {
    let port = dead_port().await;
    let script = scratch_script("exit 7\n");
    let mut config = fast_config(port, "/bin/sh", script.path());
    config.max_readiness_attempts = 2;
    let supervisor = GatewaySupervisor::new(config);

    let outcome = supervisor.ensure_running().await.expect("ensure_running");
    assert_eq!(outcome, EnsureOutcome::TimedOut);

    // The script exits immediately; the watcher clears the slot.
    for _ in 0..50 {
        if supervisor.owned_pid().is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(supervisor.owned_pid(), None);

    // Relaunch works after the clear.
    let outcome = supervisor.ensure_running().await.expect("relaunch");
    assert_eq!(outcome, EnsureOutcome::TimedOut);
    supervisor.shutdown();
    tokio::time::sleep(Duration::from_millis(100)).await;
}

// A second spawn request while a handle is live does not create a second child.
#[cfg(unix)]
#[tokio::test]
async fn spawn_is_refused_while_a_handle_is_live() {
    let (config, _script) = unix_config(dead_port().await);
    let slot = Arc::new(std::sync::Mutex::new(None));

    let first = launch::spawn_gateway(&config, Arc::clone(&slot)).expect("first spawn");
    assert!(matches!(first, SpawnOutcome::Spawned { .. }));

    let second = launch::spawn_gateway(&config, Arc::clone(&slot)).expect("second spawn");
    assert_eq!(second, SpawnOutcome::AlreadyPending);

    let handle = slot.lock().expect("slot").take().expect("handle");
    handle.terminate();
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[test]
fn port_env_override_rules() {
    // Only exercises the parse helper, not the env var itself, to avoid
    // cross-test env mutation.
    assert_eq!(port_from_env_or(DEFAULT_GATEWAY_PORT), DEFAULT_GATEWAY_PORT);
}

#[test]
fn base_url_is_host_and_port() {
    let config = SupervisorConfig::new("node".into(), "index.js".into(), 18789);
    assert_eq!(config.base_url(), "http://127.0.0.1:18789");
}
