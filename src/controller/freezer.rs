//! Reconcile orchestrator for DeploymentFreezer resources
//!
//! One pass per request: load the latest freezer, handle deletion or the
//! finalizer, validate and resolve the target, detect recreation, keep the
//! template digest current, route to the phase handler and commit the status
//! diff exactly once on the way out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use thiserror::Error;
use tracing::{info, warn};

use crate::controller::conditions::{
    hash_template, phase_for_not_found, set_condition, set_phase, status_mut,
};
use crate::controller::ops::{ClusterOps, KubeOps};
use crate::controller::status::StatusTracker;
use crate::controller::{messages, phases};
use crate::controller::{ANNO_TEMPLATE_HASH, REQUEUE_MEDIUM, REQUEUE_SHORT};
use crate::crd::freezer::{
    ConditionReason, ConditionStatus, ConditionType, DeploymentFreezer, Phase, StatusTargetRef,
};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("DeploymentFreezer missing namespace")]
    MissingNamespace,
}

/// Clock accessor injected into the engine so tests can advance time
pub type NowFn = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct Context {
    pub ops: Arc<dyn ClusterOps>,
    now: NowFn,
}

impl Context {
    pub fn new(client: Client) -> Self {
        Self::with_ops(Arc::new(KubeOps::new(client)), Arc::new(Utc::now))
    }

    /// Build a context over any [`ClusterOps`] with an explicit clock
    pub fn with_ops(ops: Arc<dyn ClusterOps>, now: NowFn) -> Self {
        Self { ops, now }
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.now)()
    }
}

/// Error policy for the controller
///
/// Reconciliation errors are expected (API hiccups, conflicts that exhausted
/// their in-band retries) and resolve themselves on a later pass, so they are
/// logged at warn level and requeued with a delay.
pub fn error_policy(
    _dfz: Arc<DeploymentFreezer>,
    error: &ReconcileError,
    _ctx: Arc<Context>,
) -> Action {
    warn!("Reconcile error (will retry): {:?}", error);
    Action::requeue(std::time::Duration::from_secs(10))
}

/// Reconcile one DeploymentFreezer
///
/// The object handed over by the watch stream only supplies the identity; the
/// engine always re-reads the latest version before acting, since the cache
/// may lag the controller's own writes.
pub async fn reconcile(
    dfz: Arc<DeploymentFreezer>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let namespace = dfz.namespace().ok_or(ReconcileError::MissingNamespace)?;
    let name = dfz.name_any();

    info!(freezer = %name, namespace = %namespace, "Reconciling DeploymentFreezer");

    let Some(mut dfz) = ctx.ops.get_freezer(&namespace, &name).await? else {
        // Object is gone; nothing left to do
        return Ok(Action::await_change());
    };

    // Track status changes and write once at the end, on every exit path
    let tracker = StatusTracker::new(&dfz);
    let outcome = run(&mut dfz, &namespace, &name, &ctx).await;
    tracker.commit(ctx.ops.as_ref(), &dfz).await;
    outcome
}

async fn run(
    dfz: &mut DeploymentFreezer,
    namespace: &str,
    name: &str,
    ctx: &Context,
) -> Result<Action, ReconcileError> {
    // Deletion: best-effort release, then drop the finalizer
    if dfz.metadata.deletion_timestamp.is_some() {
        phases::handle_delete(dfz, ctx).await;
        ctx.ops.remove_finalizer(namespace, name).await?;
        return Ok(Action::await_change());
    }
    ctx.ops.ensure_finalizer(namespace, name).await?;

    // Validate the target reference (admission also enforces this)
    let target_name = dfz.spec.target_ref.name.clone();
    if target_name.is_empty() {
        set_phase(dfz, Phase::Denied);
        set_condition(
            dfz,
            ConditionType::TargetFound,
            ConditionStatus::False,
            ConditionReason::NotFound,
            messages::MSG_SPEC_TARGET_EMPTY,
            ctx.now(),
        );
        return Ok(Action::await_change());
    }

    // Fetch the target Deployment
    let deploy = match ctx.ops.get_deployment(namespace, &target_name).await {
        Ok(Some(deploy)) => deploy,
        Ok(None) => {
            let phase = phase_for_not_found(dfz);
            set_phase(dfz, phase);
            set_condition(
                dfz,
                ConditionType::TargetFound,
                ConditionStatus::False,
                ConditionReason::NotFound,
                messages::MSG_TARGET_NOT_FOUND,
                ctx.now(),
            );
            return Ok(Action::requeue(REQUEUE_MEDIUM));
        }
        Err(err) => {
            set_condition(
                dfz,
                ConditionType::Health,
                ConditionStatus::False,
                ConditionReason::ApiConflict,
                messages::read_error(&err),
                ctx.now(),
            );
            return Ok(Action::requeue(REQUEUE_SHORT));
        }
    };

    // UID pinning: detect delete+recreate under the same name
    let live_uid = deploy.metadata.uid.clone().unwrap_or_default();
    let cached_uid = dfz
        .status
        .as_ref()
        .and_then(|s| s.target_ref.as_ref())
        .map(|t| t.uid.clone())
        .unwrap_or_default();

    if !cached_uid.is_empty() && cached_uid != live_uid {
        set_condition(
            dfz,
            ConditionType::TargetFound,
            ConditionStatus::False,
            ConditionReason::UidMismatch,
            messages::MSG_UID_RECREATED,
            ctx.now(),
        );
        set_phase(dfz, Phase::Aborted);
        return Ok(Action::await_change());
    }

    if cached_uid.is_empty() {
        status_mut(dfz).target_ref = Some(StatusTargetRef {
            name: deploy.name_any(),
            uid: live_uid,
        });
    }

    // Template digest: persist on first sight, flag divergence afterwards
    let live_hash = hash_template(&deploy);
    let stored_hash = dfz
        .annotations()
        .get(ANNO_TEMPLATE_HASH)
        .cloned()
        .unwrap_or_default();

    if stored_hash.is_empty() {
        if let Err(err) = ctx
            .ops
            .set_freezer_annotation(namespace, name, ANNO_TEMPLATE_HASH, &live_hash)
            .await
        {
            set_condition(
                dfz,
                ConditionType::Health,
                ConditionStatus::False,
                ConditionReason::ApiConflict,
                messages::template_hash_patch_failed(&err),
                ctx.now(),
            );
            return Ok(Action::requeue(REQUEUE_SHORT));
        }
    } else if stored_hash != live_hash {
        // Records a fact about the freeze cycle; intentionally never cleared
        set_condition(
            dfz,
            ConditionType::SpecChangedDuringFreeze,
            ConditionStatus::True,
            ConditionReason::Observed,
            messages::MSG_SPEC_CHANGED,
            ctx.now(),
        );
    }

    // The current spec generation has now been processed
    let generation = dfz.metadata.generation;
    if dfz.status.as_ref().and_then(|s| s.observed_generation) != generation {
        status_mut(dfz).observed_generation = generation;
    }

    // Phase router
    if dfz.status.as_ref().and_then(|s| s.phase).is_none() {
        set_phase(dfz, Phase::Pending);
    }

    match dfz.status.as_ref().and_then(|s| s.phase) {
        Some(Phase::Pending) | Some(Phase::Freezing) => {
            Ok(phases::handle_pending_or_freezing(dfz, &deploy, ctx).await)
        }
        Some(Phase::Frozen) => Ok(phases::handle_frozen(dfz, &deploy, ctx).await),
        Some(Phase::Unfreezing) => Ok(phases::handle_unfreezing(dfz, &deploy, ctx).await),
        Some(Phase::Denied) | Some(Phase::Completed) | Some(Phase::Aborted) => {
            // Terminal phases never auto-advance
            Ok(Action::await_change())
        }
        None => Ok(Action::requeue(REQUEUE_SHORT)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Tests can use unwrap/expect for brevity
#[path = "freezer_test.rs"]
mod tests;
