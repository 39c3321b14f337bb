//! Background cleanup: prune expired refresh records and share
//! capabilities.

use crate::storage::{refresh, shares, Storage};
use std::time::Duration;
use tokio::time;

pub fn spawn_cleanup_task(storage: Storage) {
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(3600)); // hourly
        loop {
            interval.tick().await;
            if let Err(e) = run_cleanup(&storage) {
                tracing::error!("Cleanup error: {}", e);
            }
        }
    });
}

fn run_cleanup(storage: &Storage) -> Result<(), String> {
    let conn = storage.conn().map_err(|e| e.to_string())?;
    let now = chrono::Utc::now().timestamp();

    let refresh_pruned = refresh::prune_expired(&conn, now).map_err(|e| e.to_string())?;
    let shares_pruned = shares::prune_expired(&conn, now).map_err(|e| e.to_string())?;

    tracing::debug!(refresh_pruned, shares_pruned, "Cleanup completed");
    Ok(())
}
