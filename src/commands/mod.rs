//! Usage: `#[tauri::command]` handlers exposed to the webview.

mod app;
mod gateway;
mod settings;

pub(crate) use app::*;
pub(crate) use gateway::*;
pub(crate) use settings::*;
