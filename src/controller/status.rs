//! Deferred, diffed status commits
//!
//! A tracker snapshots the status at reconcile entry; at exit the status is
//! written back exactly once, and only if it changed. Commit failures are
//! logged rather than surfaced: the write is retried by [`ClusterOps`] and,
//! failing that, recomputed by the next reconcile.

use kube::ResourceExt;
use tracing::error;

use crate::controller::ops::ClusterOps;
use crate::crd::freezer::{DeploymentFreezer, DeploymentFreezerStatus};

pub(crate) struct StatusTracker {
    orig: Option<DeploymentFreezerStatus>,
}

/// Structural equality modulo condition `lastTransitionTime`
///
/// Timestamp-only refreshes must not trigger a write: the controller's own
/// status writes re-enter through the watch stream, and rewriting a status
/// whose only change is a refreshed timestamp would ping-pong forever.
pub(crate) fn status_equal_ignoring_times(
    a: &Option<DeploymentFreezerStatus>,
    b: &Option<DeploymentFreezerStatus>,
) -> bool {
    fn stripped(status: &Option<DeploymentFreezerStatus>) -> Option<DeploymentFreezerStatus> {
        status.as_ref().map(|s| {
            let mut s = s.clone();
            for condition in &mut s.conditions {
                condition.last_transition_time = None;
            }
            s
        })
    }
    stripped(a) == stripped(b)
}

impl StatusTracker {
    pub(crate) fn new(dfz: &DeploymentFreezer) -> Self {
        Self {
            orig: dfz.status.clone(),
        }
    }

    /// Write the status back once iff it materially changed
    pub(crate) async fn commit(self, ops: &dyn ClusterOps, dfz: &DeploymentFreezer) {
        if status_equal_ignoring_times(&self.orig, &dfz.status) {
            return;
        }

        let namespace = dfz.namespace().unwrap_or_default();
        let name = dfz.name_any();
        let status = dfz.status.clone().unwrap_or_default();

        if let Err(err) = ops.patch_freezer_status(&namespace, &name, &status).await {
            error!(
                error = %err,
                freezer = %name,
                namespace = %namespace,
                "Failed to update status"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Tests can use unwrap/expect for brevity
#[path = "status_test.rs"]
mod tests;
