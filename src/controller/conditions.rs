//! Pure helpers over the in-memory DeploymentFreezer: phase assignment,
//! condition upserts and the template digest used for spec-change detection.

use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use sha2::{Digest, Sha256};

use crate::crd::freezer::{
    Condition, ConditionReason, ConditionStatus, ConditionType, DeploymentFreezer,
    DeploymentFreezerStatus, Phase,
};

/// Access the status block, materializing an empty one on first touch
pub(crate) fn status_mut(dfz: &mut DeploymentFreezer) -> &mut DeploymentFreezerStatus {
    dfz.status.get_or_insert_with(DeploymentFreezerStatus::default)
}

pub(crate) fn set_phase(dfz: &mut DeploymentFreezer, phase: Phase) {
    status_mut(dfz).phase = Some(phase);
}

/// Phase to report when the target cannot be found: Pending if the freeze
/// never started, Aborted if it was already in flight
pub(crate) fn phase_for_not_found(dfz: &DeploymentFreezer) -> Phase {
    match dfz.status.as_ref().and_then(|s| s.phase) {
        None | Some(Phase::Pending) => Phase::Pending,
        _ => Phase::Aborted,
    }
}

/// Upsert a condition keyed by type
///
/// The list keeps the first-insertion order of each type. A condition whose
/// `(status, reason, message)` changed is replaced in place; an unchanged one
/// only gets its `lastTransitionTime` refreshed, which signals liveness.
pub(crate) fn set_condition(
    dfz: &mut DeploymentFreezer,
    type_: ConditionType,
    status: ConditionStatus,
    reason: ConditionReason,
    message: impl Into<String>,
    now: DateTime<Utc>,
) {
    let message = message.into();
    let transition_time = Some(now.to_rfc3339());
    let conditions = &mut status_mut(dfz).conditions;

    for existing in conditions.iter_mut() {
        if existing.type_ == type_ {
            if existing.status != status || existing.reason != reason || existing.message != message
            {
                *existing = Condition {
                    type_,
                    status,
                    reason,
                    message,
                    last_transition_time: transition_time,
                };
            } else {
                existing.last_transition_time = transition_time;
            }
            return;
        }
    }

    conditions.push(Condition {
        type_,
        status,
        reason,
        message,
        last_transition_time: transition_time,
    });
}

/// Stable digest of the target's rollout-relevant fields: pod template spec,
/// pod template labels and the deployment strategy. Names, unrelated
/// annotations, replica counts and status do not contribute.
pub(crate) fn hash_template(deploy: &Deployment) -> String {
    let mut hasher = Sha256::new();
    if let Some(spec) = &deploy.spec {
        if let Ok(bytes) = serde_json::to_vec(&spec.template.spec) {
            hasher.update(&bytes);
        }
        let labels = spec.template.metadata.as_ref().and_then(|m| m.labels.as_ref());
        if let Ok(bytes) = serde_json::to_vec(&labels) {
            hasher.update(&bytes);
        }
        if let Ok(bytes) = serde_json::to_vec(&spec.strategy) {
            hasher.update(&bytes);
        }
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Tests can use unwrap/expect for brevity
#[path = "conditions_test.rs"]
mod tests;
