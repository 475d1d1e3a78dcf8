//! Usage: Labelled spawn_blocking wrapper for sync work called from async commands.

pub(crate) async fn run<T, F>(label: &str, f: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, String> + Send + 'static,
{
    let label = label.to_string();
    tauri::async_runtime::spawn_blocking(f)
        .await
        .map_err(|e| format!("BLOCKING_TASK_JOIN: {label}: {e}"))?
}
