//! Startup deadline recovery
//!
//! Freeze deadlines are normally served by per-request requeues, which die
//! with the process. After a restart, once the cache has synchronized, every
//! Frozen freezer whose window elapsed while the controller was down is
//! re-enqueued so no Deployment stays frozen past its deadline.

use chrono::{DateTime, Utc};
use futures::channel::mpsc::UnboundedSender;
use kube::runtime::reflector::{ObjectRef, Store};
use std::sync::Arc;
use tracing::{info, warn};

use crate::crd::freezer::{DeploymentFreezer, Phase};

/// Frozen freezers whose `freezeUntil` lies at or before `now`
pub fn overdue_freezers(
    freezers: impl IntoIterator<Item = Arc<DeploymentFreezer>>,
    now: DateTime<Utc>,
) -> Vec<ObjectRef<DeploymentFreezer>> {
    freezers
        .into_iter()
        .filter(|dfz| {
            let Some(status) = &dfz.status else {
                return false;
            };
            if status.phase != Some(Phase::Frozen) {
                return false;
            }
            status
                .freeze_until
                .as_deref()
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .is_some_and(|until| until.with_timezone(&Utc) <= now)
        })
        .map(|dfz| ObjectRef::from_obj(dfz.as_ref()))
        .collect()
}

/// Wait for the cache to sync, then fire the reconcile trigger if any freeze
/// window elapsed while the controller was down
pub async fn run_startup_scan(store: Store<DeploymentFreezer>, trigger: UnboundedSender<()>) {
    if store.wait_until_ready().await.is_err() {
        warn!("Cache never became ready; skipping startup deadline scan");
        return;
    }

    let overdue = overdue_freezers(store.state(), Utc::now());
    if overdue.is_empty() {
        info!("Startup deadline scan found no overdue freezers");
        return;
    }

    for freezer in &overdue {
        info!(freezer = %freezer, "Freeze window elapsed while controller was down");
    }
    // The trigger re-enqueues every watched freezer; the overdue ones move to
    // Unfreezing, the rest reconcile as a no-op
    let _ = trigger.unbounded_send(());
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Tests can use unwrap/expect for brevity
#[path = "scheduler_test.rs"]
mod tests;
