//! Usage: Shared Tauri state types and supervisor initialization gate used by `commands/*`.

use crate::supervisor::{self, GatewaySupervisor, SupervisorConfig};
use crate::{blocking, settings};
use std::path::PathBuf;
use std::sync::Arc;
use tauri::Manager;
use tokio::sync::OnceCell;

#[derive(Default)]
pub(crate) struct SupervisorState(pub(crate) OnceCell<Arc<GatewaySupervisor>>);

/// Lazily builds the one supervisor instance from persisted settings. All
/// callers (startup task, commands, tray) share it by `Arc`.
pub(crate) async fn ensure_supervisor(
    app: tauri::AppHandle,
    state: &SupervisorState,
) -> Result<Arc<GatewaySupervisor>, String> {
    state
        .0
        .get_or_try_init(|| async move {
            let settings = blocking::run("supervisor_read_settings", {
                let app = app.clone();
                move || Ok(settings::read(&app).unwrap_or_default())
            })
            .await?;

            let config = supervisor_config(&app, &settings)?;
            tracing::info!(
                port = config.port,
                entry = %config.entry_script.display(),
                "网关监管配置已加载"
            );
            Ok(Arc::new(GatewaySupervisor::new(config)))
        })
        .await
        .map(Arc::clone)
}

fn supervisor_config(
    app: &tauri::AppHandle,
    settings: &settings::AppSettings,
) -> Result<SupervisorConfig, String> {
    let port = supervisor::port_from_env_or(settings.preferred_port);
    Ok(SupervisorConfig::new(
        resolve_node_binary(settings),
        resolve_entry_script(app, settings)?,
        port,
    ))
}

fn resolve_node_binary(settings: &settings::AppSettings) -> PathBuf {
    let configured = settings.node_binary.trim();
    if configured.is_empty() {
        PathBuf::from("node")
    } else {
        PathBuf::from(configured)
    }
}

fn resolve_entry_script(
    app: &tauri::AppHandle,
    settings: &settings::AppSettings,
) -> Result<PathBuf, String> {
    let configured = settings.entry_script.trim();
    if !configured.is_empty() {
        return Ok(PathBuf::from(configured));
    }

    let resource_dir = app
        .path()
        .resource_dir()
        .map_err(|e| format!("failed to resolve resource dir: {e}"))?;
    Ok(resource_dir.join("gateway").join("index.js"))
}
