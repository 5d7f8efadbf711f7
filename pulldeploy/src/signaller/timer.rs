//! Timer notification substrate: always present, firing on a fixed
//! interval (the short poll interval, or the longer fallback interval
//! when a coordination service is also in play), with an empty payload.

use std::time::Duration;

use tokio::sync::mpsc;

use super::{Notification, NotifySource};

/// Spawn a task emitting a `TIMER` notification for `app_name` every
/// `interval_seconds`.
pub fn spawn(interval_seconds: u64, app_name: String, notify_tx: mpsc::Sender<Notification>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
        // The first tick fires immediately; skip it so the initial sync
        // is driven by the reconciler's explicit FORCED notification
        // instead of racing it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let notification = Notification {
                source: NotifySource::Timer,
                app_name: app_name.clone(),
                data: Vec::new(),
            };
            if notify_tx.send(notification).await.is_err() {
                return;
            }
        }
    });
}
