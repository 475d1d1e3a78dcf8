//! Usage: Gateway child process launch + exit/kill watcher task.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use super::{SupervisorConfig, GATEWAY_MODE_ENV, GATEWAY_PORT_ENV};
use crate::shared::mutex_ext::MutexExt;

static GENERATION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SpawnOutcome {
    Spawned { pid: Option<u32> },
    AlreadyPending,
}

/// Handle to a spawned gateway child. The watcher task owns the
/// `tokio::process::Child`; this handle only keeps what the supervisor needs
/// to identify and terminate it.
pub(crate) struct ChildHandle {
    pub(crate) pid: Option<u32>,
    generation: u64,
    kill: oneshot::Sender<()>,
}

impl ChildHandle {
    /// Fire-and-forget termination request. The watcher kills and reaps the
    /// child; exit is observed asynchronously.
    pub(crate) fn terminate(self) {
        let _ = self.kill.send(());
    }
}

/// Spawns the gateway as a detached OS child and installs it into `slot`.
///
/// The child's environment is the inherited one overlaid with the configured
/// overrides, then the contact port and execution mode, so supervisor and
/// child always agree on the listen address. Stdio stays inherited: readiness
/// is determined solely by the probe, never by parsing child output.
///
/// Returns `AlreadyPending` without spawning when `slot` already holds a handle.
pub(crate) fn spawn_gateway(
    config: &SupervisorConfig,
    slot: Arc<Mutex<Option<ChildHandle>>>,
) -> Result<SpawnOutcome, String> {
    let mut guard = slot.lock_or_recover();
    if guard.is_some() {
        return Ok(SpawnOutcome::AlreadyPending);
    }

    let mut command = tokio::process::Command::new(&config.node_binary);
    command
        .arg(&config.entry_script)
        .envs(config.env_overrides.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .env(GATEWAY_PORT_ENV, config.port.to_string())
        .env(GATEWAY_MODE_ENV, "production")
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    let mut child = command.spawn().map_err(|e| {
        format!(
            "GW_SPAWN: failed to start gateway: {} {}: {e}",
            config.node_binary.display(),
            config.entry_script.display()
        )
    })?;

    let pid = child.id();
    let generation = GENERATION.fetch_add(1, Ordering::Relaxed);
    let (kill_tx, mut kill_rx) = oneshot::channel::<()>();

    let watcher_slot = Arc::clone(&slot);
    tokio::spawn(async move {
        tokio::select! {
            status = child.wait() => match status {
                Ok(status) => {
                    tracing::info!(pid = ?pid, code = ?status.code(), "网关进程已退出");
                }
                Err(err) => {
                    tracing::warn!(pid = ?pid, "等待网关进程退出失败: {err}");
                }
            },
            // Also fires when the handle is dropped without an explicit
            // terminate(); either way this supervisor no longer owns the child.
            _ = &mut kill_rx => {
                if let Err(err) = child.start_kill() {
                    tracing::warn!(pid = ?pid, "终止网关进程失败: {err}");
                }
                let _ = child.wait().await;
                tracing::info!(pid = ?pid, "网关进程已按请求终止");
            }
        }

        // Only clear our own handle: a relaunch may already occupy the slot.
        let mut guard = watcher_slot.lock_or_recover();
        if guard.as_ref().is_some_and(|h| h.generation == generation) {
            *guard = None;
        }
    });

    *guard = Some(ChildHandle {
        pid,
        generation,
        kill: kill_tx,
    });
    Ok(SpawnOutcome::Spawned { pid })
}
