//! Usage: Best-effort cleanup hooks for app lifecycle events (exit/restart).

use super::app_state::SupervisorState;
use std::sync::atomic::{AtomicBool, Ordering};
use tauri::Manager;

static CLEANUP_STARTED: AtomicBool = AtomicBool::new(false);

pub(crate) async fn cleanup_before_exit(app: &tauri::AppHandle) {
    if CLEANUP_STARTED.swap(true, Ordering::SeqCst) {
        return;
    }

    stop_gateway_best_effort(app).await;
}

/// Fire-and-forget: the supervisor's watcher kills and reaps the child; there
/// is no timeout on termination itself.
pub(crate) async fn stop_gateway_best_effort(app: &tauri::AppHandle) {
    let state = app.state::<SupervisorState>();
    let Some(supervisor) = state.0.get().map(std::sync::Arc::clone) else {
        // Supervisor never initialized: nothing was launched, nothing to stop.
        return;
    };

    supervisor.shutdown();
}
