//! Background reclamation of expired objects.
//!
//! Reads already refuse expired objects; the reaper makes sure expired
//! objects that are never read again still leave the backend. The loop holds
//! only a weak reference to the store, so dropping the last
//! [`EphemeralStore`](crate::EphemeralStore) handle ends it as well as
//! [`stop`](crate::EphemeralStore::stop) does.

use std::sync::Weak;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::store::StoreInner;

/// Outcome of one reclamation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Metadata documents examined.
    pub scanned: usize,
    /// Expired objects removed.
    pub removed: usize,
    /// Documents that could not be read or parsed, or whose removal failed.
    pub skipped: usize,
}

pub(crate) fn spawn_reaper(
    store: Weak<StoreInner>,
    cancel: CancellationToken,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; the first sweep runs one
        // period after start.
        ticker.tick().await;

        info!(interval = ?period, "reclamation started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("reclamation stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let Some(store) = store.upgrade() else {
                        debug!("store dropped, reclamation exiting");
                        break;
                    };
                    if let Err(e) = store.sweep_once().await {
                        warn!(error = %e, "reclamation pass failed");
                    }
                }
            }
        }
    })
}
