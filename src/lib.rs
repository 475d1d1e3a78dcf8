mod app;
mod commands;
mod infra;
mod shared;
mod supervisor;

pub(crate) use app::{app_state, notice, resident};
pub(crate) use infra::{app_paths, settings};
pub(crate) use shared::blocking;

use app_state::{ensure_supervisor, SupervisorState};
use commands::*;
use supervisor::EnsureOutcome;
use tauri::Emitter;
use tauri::Manager;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let builder = tauri::Builder::default()
        .manage(SupervisorState::default())
        .manage(resident::ResidentState::default())
        .plugin(tauri_plugin_opener::init());

    #[cfg(desktop)]
    let builder = builder
        .plugin(tauri_plugin_autostart::Builder::new().build())
        .plugin(tauri_plugin_notification::init())
        .plugin(tauri_plugin_single_instance::init(|app, _argv, _cwd| {
            resident::show_main_window(app);
        }));

    let app = builder
        .on_window_event(resident::on_window_event)
        .setup(|app| {
            app::logging::init(app.handle());

            #[cfg(desktop)]
            if let Err(err) = resident::setup_tray(app.handle()) {
                tracing::error!("系统托盘初始化失败: {}", err);
            }

            let app_handle = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                startup(app_handle).await;
            });

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            app_about_get,
            app_exit,
            notice_send,
            settings_get,
            settings_set,
            gateway_status,
            gateway_ensure,
            gateway_stop,
            gateway_url_get,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|app_handle, event| {
        if let tauri::RunEvent::ExitRequested { api, code, .. } = &event {
            // Shutdown is fire-and-forget; a short grace keeps the watcher's
            // kill from racing process teardown.
            if *code != Some(tauri::RESTART_EXIT_CODE) {
                tracing::info!("收到退出请求，开始清理...");
                api.prevent_exit();

                let app_handle = app_handle.clone();
                tauri::async_runtime::spawn(async move {
                    app::cleanup::cleanup_before_exit(&app_handle).await;
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    std::process::exit(0);
                });
            }
            return;
        }

        #[cfg(target_os = "macos")]
        if let tauri::RunEvent::Reopen {
            has_visible_windows,
            ..
        } = event
        {
            if !has_visible_windows {
                resident::show_main_window(app_handle);
            }
        }
    });
}

/// Startup flow: load settings, make sure a gateway serves the UI, then open
/// the main window against it. Readiness timeout is non-fatal: the window
/// opens regardless and the page errors on its own if the gateway truly
/// never comes up.
async fn startup(app_handle: tauri::AppHandle) {
    let settings = match blocking::run("startup_read_settings", {
        let app_handle = app_handle.clone();
        move || settings::read(&app_handle)
    })
    .await
    {
        Ok(cfg) => cfg,
        Err(err) => {
            tracing::warn!("配置读取失败，使用默认值: {}", err);
            settings::AppSettings::default()
        }
    };

    app_handle
        .state::<resident::ResidentState>()
        .set_tray_enabled(settings.tray_enabled);

    let supervisor = {
        let state = app_handle.state::<SupervisorState>();
        match ensure_supervisor(app_handle.clone(), state.inner()).await {
            Ok(supervisor) => supervisor,
            Err(err) => {
                tracing::error!("网关监管初始化失败: {}", err);
                return;
            }
        }
    };

    match supervisor.ensure_running().await {
        Ok(EnsureOutcome::AlreadyRunning) | Ok(EnsureOutcome::Ready) => {}
        Ok(EnsureOutcome::TimedOut) => {
            notice::notify(
                &app_handle,
                &notice::build(
                    notice::NoticeLevel::Warning,
                    None,
                    "网关尚未就绪，界面可能稍后才可用".to_string(),
                ),
            );
        }
        Err(err) => {
            tracing::error!("网关自动启动失败: {}", err);
            notice::notify(
                &app_handle,
                &notice::build(notice::NoticeLevel::Error, None, format!("网关启动失败: {err}")),
            );
        }
    }

    let _ = app_handle.emit("gateway:status", supervisor.status_payload().await);

    if let Err(err) = resident::create_or_show_main_window(&app_handle, &supervisor.config().base_url())
    {
        tracing::error!("主窗口创建失败: {}", err);
    }
}
