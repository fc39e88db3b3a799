//! Background removal of expired records.
//!
//! Only keeps storage small. Every read path checks expiry on its own, so
//! a missed or failed run changes nothing observable.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;

use super::Repository;

/// Purge once; errors are logged and swallowed.
pub async fn purge_once(repo: &dyn Repository) -> u64 {
    match repo.purge_expired(OffsetDateTime::now_utc()).await {
        Ok(0) => 0,
        Ok(removed) => {
            tracing::info!(removed, "expired records purged");
            removed
        }
        Err(e) => {
            tracing::warn!(error = %e, "housekeeping run failed");
            0
        }
    }
}

pub fn spawn_housekeeping(repo: Arc<dyn Repository>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            purge_once(repo.as_ref()).await;
        }
    })
}
