//! Usage: Gateway process supervision (liveness probe, launch, bounded readiness wait,
//! shutdown). Owns at most one child gateway process handle at a time.

pub(crate) mod launch;
pub(crate) mod probe;
pub(crate) mod readiness;
#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::shared::mutex_ext::MutexExt;
use launch::{ChildHandle, SpawnOutcome};
use readiness::ReadyOutcome;

pub(crate) const DEFAULT_GATEWAY_PORT: u16 = 18789;
pub(crate) const GATEWAY_PORT_ENV: &str = "OPENCLAW_PORT";
pub(crate) const GATEWAY_MODE_ENV: &str = "NODE_ENV";

const DEFAULT_GATEWAY_HOST: &str = "127.0.0.1";
const DEFAULT_MAX_READINESS_ATTEMPTS: u32 = 30;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Immutable supervision parameters, fixed at construction.
#[derive(Debug, Clone)]
pub(crate) struct SupervisorConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
    /// Runtime used to execute the gateway entry point (normally `node`).
    pub(crate) node_binary: PathBuf,
    pub(crate) entry_script: PathBuf,
    /// Merged over the inherited environment; override wins on key collision.
    pub(crate) env_overrides: Vec<(String, String)>,
    pub(crate) max_readiness_attempts: u32,
    pub(crate) poll_interval: Duration,
    pub(crate) probe_timeout: Duration,
}

impl SupervisorConfig {
    pub(crate) fn new(node_binary: PathBuf, entry_script: PathBuf, port: u16) -> Self {
        Self {
            host: DEFAULT_GATEWAY_HOST.to_string(),
            port,
            node_binary,
            entry_script,
            env_overrides: Vec::new(),
            max_readiness_attempts: DEFAULT_MAX_READINESS_ATTEMPTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub(crate) fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Resolves the effective gateway port: `OPENCLAW_PORT` beats the preferred
/// port from settings when it parses to a non-privileged port.
pub(crate) fn port_from_env_or(preferred: u16) -> u16 {
    let Ok(raw) = std::env::var(GATEWAY_PORT_ENV) else {
        return preferred;
    };
    match raw.trim().parse::<u16>() {
        Ok(port) if port >= 1024 => port,
        _ => {
            tracing::warn!(
                "环境变量 {GATEWAY_PORT_ENV}={raw} 无效，回退到端口 {preferred}"
            );
            preferred
        }
    }
}

/// Terminal, non-error completions of [`GatewaySupervisor::ensure_running`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum EnsureOutcome {
    /// A gateway already answers health checks; nothing was spawned.
    AlreadyRunning,
    /// A child was launched and the probe confirmed it within the bound.
    Ready,
    /// A child was launched but never confirmed within the bound. Non-fatal:
    /// the caller proceeds and the gateway may still come up afterwards.
    TimedOut,
}

#[derive(Debug, Clone, serde::Serialize)]
pub(crate) struct GatewayStatus {
    pub(crate) running: bool,
    pub(crate) pid: Option<u32>,
    pub(crate) port: u16,
    pub(crate) base_url: String,
}

/// Supervises the local gateway process: decides whether one is already
/// alive, launches one if not, waits for readiness within a bound and tears
/// the child down on exit. Constructed once at startup and handed by
/// reference to whoever needs it; no process-wide globals.
pub(crate) struct GatewaySupervisor {
    config: SupervisorConfig,
    client: reqwest::Client,
    child: Arc<Mutex<Option<ChildHandle>>>,
}

impl GatewaySupervisor {
    pub(crate) fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            child: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Current liveness, straight from the probe. Never cached: the child can
    /// die between calls without the supervisor hearing about it first.
    pub(crate) async fn status(&self) -> bool {
        probe::is_alive(&self.client, &self.config.base_url(), self.config.probe_timeout).await
    }

    pub(crate) async fn status_payload(&self) -> GatewayStatus {
        let running = self.status().await;
        let pid = self.owned_pid();
        GatewayStatus {
            running,
            pid,
            port: self.config.port,
            base_url: self.config.base_url(),
        }
    }

    /// Idempotent "make sure a gateway serves at host:port".
    ///
    /// Probe → already alive ⇒ `AlreadyRunning` (also the path that adopts an
    /// externally started gateway, which this supervisor then never owns).
    /// Otherwise launch (spawn failure is the only error) and poll until ready
    /// or the attempt budget runs out. No relaunch on timeout within one call.
    pub(crate) async fn ensure_running(&self) -> Result<EnsureOutcome, String> {
        let base_url = self.config.base_url();
        if self.status().await {
            tracing::info!(base_url = %base_url, "网关已在运行，复用现有实例");
            return Ok(EnsureOutcome::AlreadyRunning);
        }

        match launch::spawn_gateway(&self.config, Arc::clone(&self.child)) {
            Ok(SpawnOutcome::Spawned { pid }) => {
                tracing::info!(pid = ?pid, port = self.config.port, "网关子进程已启动，等待就绪");
            }
            Ok(SpawnOutcome::AlreadyPending) => {
                // A concurrent ensure_running already spawned; just wait with it.
                tracing::info!("网关子进程启动中，等待其就绪");
            }
            Err(err) => {
                tracing::error!("网关启动失败: {err}");
                return Err(err);
            }
        }

        let client = self.client.clone();
        let probe_timeout = self.config.probe_timeout;
        let outcome = readiness::wait_until_ready(
            self.config.max_readiness_attempts,
            self.config.poll_interval,
            move || {
                let client = client.clone();
                let base_url = base_url.clone();
                async move { probe::is_alive(&client, &base_url, probe_timeout).await }
            },
        )
        .await;

        match outcome {
            ReadyOutcome::Ready => {
                tracing::info!("网关已就绪");
                Ok(EnsureOutcome::Ready)
            }
            ReadyOutcome::TimedOut => {
                tracing::warn!(
                    attempts = self.config.max_readiness_attempts,
                    "网关在限定时间内未就绪，继续启动流程"
                );
                Ok(EnsureOutcome::TimedOut)
            }
        }
    }

    /// Terminates the owned child if there is one; a gateway this supervisor
    /// never launched is left untouched. Safe to call at any time, including
    /// mid readiness wait, and safe to call repeatedly.
    pub(crate) fn shutdown(&self) {
        let taken = self.child.lock_or_recover().take();
        match taken {
            Some(handle) => {
                tracing::info!(pid = ?handle.pid, "正在终止网关子进程");
                handle.terminate();
            }
            None => {
                tracing::debug!("无自有网关子进程，跳过终止");
            }
        }
    }

    /// Pid of the owned child, if any. Presence of a handle does not imply
    /// liveness; use [`status`](Self::status) for that.
    pub(crate) fn owned_pid(&self) -> Option<u32> {
        self.child.lock_or_recover().as_ref().and_then(|h| h.pid)
    }
}
