//! Phase handlers: the freeze state machine
//!
//! Each handler observes the freezer and its target, performs at most a few
//! idempotent writes, records progress through conditions and the phase, and
//! asks for the next wakeup. API failures never propagate out of a handler;
//! they become conditions plus a requeue so the loop stays level-triggered.

use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::ResourceExt;
use tracing::info;

use crate::controller::conditions::{set_condition, set_phase, status_mut};
use crate::controller::freezer::Context;
use crate::controller::{events, messages};
use crate::controller::{ANNO_FROZEN_BY, DEFAULT_REPLICAS, REQUEUE_MEDIUM, REQUEUE_SHORT};
use crate::crd::freezer::{
    ConditionReason, ConditionStatus, ConditionType, DeploymentFreezer, Phase,
};

/// Lock value written to the target's ownership annotation
pub(crate) fn owner_value(dfz: &DeploymentFreezer) -> String {
    format!("{}/{}", dfz.namespace().unwrap_or_default(), dfz.name_any())
}

fn frozen_by(deploy: &Deployment) -> String {
    deploy
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(ANNO_FROZEN_BY))
        .cloned()
        .unwrap_or_default()
}

fn spec_replicas(deploy: &Deployment) -> Option<i32> {
    deploy.spec.as_ref().and_then(|s| s.replicas)
}

/// The Deployment is effectively at zero: nothing running, ready, available
/// or updated
fn drained_to_zero(deploy: &Deployment) -> bool {
    let Some(status) = &deploy.status else {
        return false;
    };
    status.replicas.unwrap_or(0) == 0
        && status.ready_replicas.unwrap_or(0) == 0
        && status.available_replicas.unwrap_or(0) == 0
        && status.updated_replicas.unwrap_or(0) == 0
}

fn parse_freeze_until(dfz: &DeploymentFreezer) -> Option<DateTime<Utc>> {
    dfz.status
        .as_ref()
        .and_then(|s| s.freeze_until.as_deref())
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|t| t.with_timezone(&Utc))
}

fn until_deadline(now: DateTime<Utc>, deadline: DateTime<Utc>) -> std::time::Duration {
    (deadline - now).to_std().unwrap_or_default()
}

/// Pending/Freezing: acquire ownership, record the original replica count,
/// scale to zero and wait for the drain to finish
pub(crate) async fn handle_pending_or_freezing(
    dfz: &mut DeploymentFreezer,
    deploy: &Deployment,
    ctx: &Context,
) -> Action {
    let namespace = dfz.namespace().unwrap_or_default();
    let name = dfz.name_any();
    let deploy_name = deploy.name_any();
    let owner = owner_value(dfz);
    let holder = frozen_by(deploy);

    // Ownership arbitration
    if !holder.is_empty() && holder != owner {
        set_condition(
            dfz,
            ConditionType::Ownership,
            ConditionStatus::False,
            ConditionReason::DeniedAlreadyFrozen,
            messages::already_owned(&holder),
            ctx.now(),
        );
        set_phase(dfz, Phase::Denied);
        ctx.ops
            .publish_event(
                dfz,
                EventType::Warning,
                events::REASON_OWNERSHIP_DENIED,
                events::note_ownership_denied(&namespace, &deploy_name, &holder),
            )
            .await;
        return Action::await_change();
    }

    if holder.is_empty() {
        if let Err(err) = ctx
            .ops
            .set_deployment_annotation(&namespace, &deploy_name, ANNO_FROZEN_BY, &owner)
            .await
        {
            set_condition(
                dfz,
                ConditionType::Health,
                ConditionStatus::False,
                ConditionReason::ApiConflict,
                messages::cannot_scale_down(&err),
                ctx.now(),
            );
            return Action::requeue(REQUEUE_SHORT);
        }
        set_condition(
            dfz,
            ConditionType::Ownership,
            ConditionStatus::True,
            ConditionReason::Acquired,
            messages::ownership_acquired(&name, &namespace, &deploy_name),
            ctx.now(),
        );
    } else {
        set_condition(
            dfz,
            ConditionType::Ownership,
            ConditionStatus::True,
            ConditionReason::Acquired,
            messages::MSG_OWNERSHIP_ALREADY_HELD,
            ctx.now(),
        );
    }

    // Record original replicas before the first scale-down; prefer a positive
    // live value, fall back to the default, never overwrite once set
    if status_mut(dfz).original_replicas.is_none() {
        let original = spec_replicas(deploy)
            .filter(|r| *r > 0)
            .unwrap_or(DEFAULT_REPLICAS);
        status_mut(dfz).original_replicas = Some(original);
    }

    // Scale to zero
    if spec_replicas(deploy) != Some(0) {
        match ctx
            .ops
            .set_deployment_replicas(&namespace, &deploy_name, 0)
            .await
        {
            Err(err) => {
                set_condition(
                    dfz,
                    ConditionType::FreezeProgress,
                    ConditionStatus::False,
                    ConditionReason::AwaitingPdb,
                    messages::cannot_scale_down(&err),
                    ctx.now(),
                );
                set_phase(dfz, Phase::Freezing);
                return Action::requeue(REQUEUE_MEDIUM);
            }
            Ok(()) => {
                set_condition(
                    dfz,
                    ConditionType::FreezeProgress,
                    ConditionStatus::False,
                    ConditionReason::ScalingDown,
                    messages::MSG_SCALING_TO_ZERO,
                    ctx.now(),
                );
                set_phase(dfz, Phase::Freezing);
                return Action::requeue(REQUEUE_SHORT);
            }
        }
    }

    // Spec is zero; verify the rollout status also drained to zero
    if drained_to_zero(deploy) {
        set_condition(
            dfz,
            ConditionType::FreezeProgress,
            ConditionStatus::True,
            ConditionReason::ScaledToZero,
            messages::MSG_SCALED_TO_ZERO,
            ctx.now(),
        );
        set_phase(dfz, Phase::Frozen);

        let now = ctx.now();
        let until = now + chrono::Duration::seconds(dfz.spec.duration_seconds);
        status_mut(dfz).freeze_until = Some(until.to_rfc3339());

        info!(
            freezer = %name,
            freeze_until = %until.to_rfc3339(),
            "Deployment fully scaled to zero, freeze window started"
        );
        ctx.ops
            .publish_event(
                dfz,
                EventType::Normal,
                events::REASON_FROZEN,
                events::note_frozen_until(&until.to_rfc3339()),
            )
            .await;
        return Action::requeue(until_deadline(now, until));
    }

    // Still draining; stay in Freezing until the status catches up
    set_condition(
        dfz,
        ConditionType::FreezeProgress,
        ConditionStatus::False,
        ConditionReason::ScalingDown,
        messages::MSG_WAITING_FOR_ZERO,
        ctx.now(),
    );
    set_phase(dfz, Phase::Freezing);
    Action::requeue(REQUEUE_SHORT)
}

/// Frozen: keep the window closed until the deadline; the only non-timed exit
/// is losing the ownership annotation to another writer
pub(crate) async fn handle_frozen(
    dfz: &mut DeploymentFreezer,
    deploy: &Deployment,
    ctx: &Context,
) -> Action {
    let namespace = dfz.namespace().unwrap_or_default();
    let deploy_name = deploy.name_any();
    let owner = owner_value(dfz);

    if frozen_by(deploy) != owner {
        set_condition(
            dfz,
            ConditionType::Ownership,
            ConditionStatus::False,
            ConditionReason::Lost,
            messages::MSG_OWNERSHIP_LOST,
            ctx.now(),
        );
        set_phase(dfz, Phase::Aborted);
        ctx.ops
            .publish_event(
                dfz,
                EventType::Warning,
                events::REASON_OWNERSHIP_LOST,
                events::note_ownership_lost(&namespace, &deploy_name),
            )
            .await;
        return Action::await_change();
    }

    // FreezeUntil is set whenever the phase is Frozen; tolerate a missing or
    // unparsable value by treating the deadline as elapsed
    if let Some(until) = parse_freeze_until(dfz) {
        let now = ctx.now();
        if now < until {
            return Action::requeue(until_deadline(now, until));
        }
    }

    set_phase(dfz, Phase::Unfreezing);
    ctx.ops
        .publish_event(
            dfz,
            EventType::Normal,
            events::REASON_UNFREEZING_STARTED,
            events::note_unfreezing_started(),
        )
        .await;
    Action::requeue(REQUEUE_SHORT)
}

/// Unfreezing: restore the recorded replica count, then release ownership
pub(crate) async fn handle_unfreezing(
    dfz: &mut DeploymentFreezer,
    deploy: &Deployment,
    ctx: &Context,
) -> Action {
    let namespace = dfz.namespace().unwrap_or_default();
    let deploy_name = deploy.name_any();

    // Invariant: originalReplicas was recorded before the first scale-down
    let target_replicas = dfz
        .status
        .as_ref()
        .and_then(|s| s.original_replicas)
        .unwrap_or(DEFAULT_REPLICAS);

    if let Err(err) = ctx
        .ops
        .set_deployment_replicas(&namespace, &deploy_name, target_replicas)
        .await
    {
        set_condition(
            dfz,
            ConditionType::UnfreezeProgress,
            ConditionStatus::False,
            ConditionReason::QuotaExceeded,
            messages::restore_failed(target_replicas, &err),
            ctx.now(),
        );
        return Action::requeue(REQUEUE_MEDIUM);
    }

    if let Err(err) = ctx
        .ops
        .set_deployment_annotation(&namespace, &deploy_name, ANNO_FROZEN_BY, "")
        .await
    {
        set_condition(
            dfz,
            ConditionType::Health,
            ConditionStatus::False,
            ConditionReason::ApiConflict,
            messages::clear_ownership_failed(&err),
            ctx.now(),
        );
        return Action::requeue(REQUEUE_SHORT);
    }

    set_condition(
        dfz,
        ConditionType::UnfreezeProgress,
        ConditionStatus::True,
        ConditionReason::ScaledUp,
        messages::restored(target_replicas),
        ctx.now(),
    );
    set_condition(
        dfz,
        ConditionType::Ownership,
        ConditionStatus::False,
        ConditionReason::Released,
        messages::MSG_OWNERSHIP_RELEASED,
        ctx.now(),
    );
    set_phase(dfz, Phase::Completed);
    ctx.ops
        .publish_event(
            dfz,
            EventType::Normal,
            events::REASON_UNFREEZE_COMPLETED,
            events::note_unfreeze_completed(target_replicas),
        )
        .await;
    Action::await_change()
}

/// Deletion path: best-effort release of the target before the finalizer is
/// removed. Failures are reported as events and never block finalization.
pub(crate) async fn handle_delete(dfz: &DeploymentFreezer, ctx: &Context) {
    let namespace = dfz.namespace().unwrap_or_default();
    let target_name = dfz.spec.target_ref.name.clone();
    let owner = owner_value(dfz);

    if target_name.is_empty() {
        ctx.ops
            .publish_event(
                dfz,
                EventType::Normal,
                events::REASON_RELEASE_SKIPPED_NO_TARGET,
                events::note_release_skipped_no_target(),
            )
            .await;
        return;
    }

    let deploy = match ctx.ops.get_deployment(&namespace, &target_name).await {
        Ok(Some(deploy)) => deploy,
        Ok(None) => {
            ctx.ops
                .publish_event(
                    dfz,
                    EventType::Normal,
                    events::REASON_RELEASE_SKIPPED_NOT_FOUND,
                    events::note_release_skipped_not_found(&namespace, &target_name),
                )
                .await;
            return;
        }
        Err(err) => {
            tracing::warn!(
                error = %err,
                deployment = %target_name,
                "Release: failed to read target, skipping"
            );
            return;
        }
    };

    if frozen_by(&deploy) != owner {
        ctx.ops
            .publish_event(
                dfz,
                EventType::Warning,
                events::REASON_RELEASE_SKIPPED_NOT_OWNER,
                events::note_release_skipped_not_owner(&owner),
            )
            .await;
        return;
    }

    let replicas = dfz
        .status
        .as_ref()
        .and_then(|s| s.original_replicas)
        .unwrap_or(DEFAULT_REPLICAS);

    match ctx
        .ops
        .set_deployment_replicas(&namespace, &target_name, replicas)
        .await
    {
        Err(err) => {
            ctx.ops
                .publish_event(
                    dfz,
                    EventType::Warning,
                    events::REASON_RELEASE_RESTORE_FAILED,
                    events::note_release_restore_failed(replicas, err),
                )
                .await;
        }
        Ok(()) => {
            ctx.ops
                .publish_event(
                    dfz,
                    EventType::Normal,
                    events::REASON_RELEASE_RESTORED,
                    events::note_release_restored(replicas),
                )
                .await;
        }
    }

    match ctx
        .ops
        .set_deployment_annotation(&namespace, &target_name, ANNO_FROZEN_BY, "")
        .await
    {
        Err(err) => {
            ctx.ops
                .publish_event(
                    dfz,
                    EventType::Warning,
                    events::REASON_RELEASE_CLEAR_OWNERSHIP_FAILED,
                    events::note_release_clear_failed(err),
                )
                .await;
        }
        Ok(()) => {
            ctx.ops
                .publish_event(
                    dfz,
                    EventType::Normal,
                    events::REASON_RELEASE_OWNERSHIP_CLEARED,
                    events::note_release_cleared(&namespace, &target_name),
                )
                .await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Tests can use unwrap/expect for brevity
#[path = "phases_test.rs"]
mod tests;
