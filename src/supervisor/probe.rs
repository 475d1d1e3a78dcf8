//! Usage: Gateway liveness probe (read-only GET /health with a hard timeout).

use std::time::Duration;

/// "Can't confirm alive" and "confirmed dead" are deliberately the same answer:
/// connect errors, timeouts and non-2xx all come back as `false`.
pub(crate) async fn is_alive(client: &reqwest::Client, base_url: &str, timeout: Duration) -> bool {
    let url = format!("{base_url}/health");
    match client.get(&url).timeout(timeout).send().await {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}
