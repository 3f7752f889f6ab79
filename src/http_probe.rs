use crate::prelude::*;
use std::time::Duration;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);
pub const READY_ATTEMPTS: u32 = 20;
pub const READY_INTERVAL: Duration = Duration::from_millis(500);

pub fn probe_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .connect_timeout(PROBE_TIMEOUT)
        .timeout(PROBE_TIMEOUT)
        .build()?;
    Ok(client)
}

/// Any response that is not a 4xx/5xx counts as alive.
pub async fn probe_liveness(client: &reqwest::Client, port: u16) -> bool {
    match client
        .get(format!("http://localhost:{}/", port))
        .send()
        .await
    {
        Ok(resp) => {
            let status = resp.status();
            trace!("Probe localhost:{} -> {}", port, status);
            !status.is_client_error() && !status.is_server_error()
        }
        Err(e) => {
            trace!("Probe localhost:{} failed: {}", port, e);
            false
        }
    }
}
