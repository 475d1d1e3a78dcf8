//! Usage: Gateway supervision commands (status / ensure / stop / url).

use crate::app_state::{ensure_supervisor, SupervisorState};
use crate::supervisor::{EnsureOutcome, GatewayStatus};
use tauri::Emitter;

#[tauri::command]
pub(crate) async fn gateway_status(
    app: tauri::AppHandle,
    state: tauri::State<'_, SupervisorState>,
) -> Result<GatewayStatus, String> {
    let supervisor = ensure_supervisor(app, state.inner()).await?;
    Ok(supervisor.status_payload().await)
}

#[tauri::command]
pub(crate) async fn gateway_ensure(
    app: tauri::AppHandle,
    state: tauri::State<'_, SupervisorState>,
) -> Result<EnsureOutcome, String> {
    let supervisor = ensure_supervisor(app.clone(), state.inner()).await?;
    let outcome = supervisor.ensure_running().await?;

    let _ = app.emit("gateway:status", supervisor.status_payload().await);
    Ok(outcome)
}

#[tauri::command]
pub(crate) async fn gateway_stop(
    app: tauri::AppHandle,
    state: tauri::State<'_, SupervisorState>,
) -> Result<GatewayStatus, String> {
    let supervisor = ensure_supervisor(app.clone(), state.inner()).await?;
    supervisor.shutdown();

    let status = supervisor.status_payload().await;
    let _ = app.emit("gateway:status", status.clone());
    Ok(status)
}

#[tauri::command]
pub(crate) async fn gateway_url_get(
    app: tauri::AppHandle,
    state: tauri::State<'_, SupervisorState>,
) -> Result<String, String> {
    let supervisor = ensure_supervisor(app, state.inner()).await?;
    Ok(supervisor.config().base_url())
}
