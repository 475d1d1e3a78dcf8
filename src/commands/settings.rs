//! Usage: Settings commands (read / write plus tray & autostart side effects).

use crate::{blocking, resident, settings};
use tauri::Manager;

#[tauri::command]
pub(crate) async fn settings_get(app: tauri::AppHandle) -> Result<settings::AppSettings, String> {
    blocking::run("settings_read", move || settings::read(&app)).await
}

#[tauri::command]
pub(crate) async fn settings_set(
    app: tauri::AppHandle,
    settings: settings::AppSettings,
) -> Result<settings::AppSettings, String> {
    let saved = blocking::run("settings_write", {
        let app = app.clone();
        move || settings::write(&app, &settings)
    })
    .await?;

    app.state::<resident::ResidentState>()
        .set_tray_enabled(saved.tray_enabled);

    #[cfg(desktop)]
    apply_auto_start(&app, saved.auto_start);

    Ok(saved)
}

// Best-effort: autostart registration failure shouldn't fail the settings write.
#[cfg(desktop)]
fn apply_auto_start(app: &tauri::AppHandle, enabled: bool) {
    use tauri_plugin_autostart::ManagerExt;

    let autostart = app.autolaunch();
    let result = if enabled {
        autostart.enable()
    } else {
        autostart.disable()
    };
    if let Err(err) = result {
        tracing::warn!(enabled, "开机自启动配置失败: {err}");
    }
}
