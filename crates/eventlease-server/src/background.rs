//! Background tasks for the eventlease server.
//!
//! Includes:
//! - Clearing the `is_active` flag on expired leases.

use crate::AppState;
use chrono::Utc;
use eventlease_lease::sweep_expired_leases;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Starts the expired-lease sweep task.
///
/// Runs indefinitely, clearing `is_active` on leases that have expired so
/// listings reflect failover promptly. Lease correctness never depends on
/// this task; expiry is always re-evaluated on acquire and acknowledge.
pub async fn start_lease_sweep_task(state: Arc<AppState>, interval_seconds: u64) {
    if interval_seconds == 0 {
        tracing::warn!("lease sweep task disabled (interval=0)");
        return;
    }

    let interval = Duration::from_secs(interval_seconds);
    tracing::info!(interval_seconds, "starting lease sweep task");

    loop {
        sleep(interval).await;

        let pool = state.pool.clone();
        let res = tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| e.to_string())?;
            sweep_expired_leases(&conn, Utc::now()).map_err(|e| e.to_string())
        })
        .await;

        match res {
            Ok(Ok(0)) => {}
            Ok(Ok(swept)) => {
                tracing::info!(count = swept, "marked expired leases inactive");
            }
            Ok(Err(e)) => {
                tracing::error!("failed to sweep expired leases: {}", e);
            }
            Err(e) => {
                tracing::error!("lease sweep task join error: {}", e);
            }
        }
    }
}
