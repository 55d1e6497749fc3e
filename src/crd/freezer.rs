use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// DeploymentFreezer is a Custom Resource that freezes a Deployment
///
/// It scales the target Deployment to zero replicas for a fixed window and
/// restores the original replica count once the window elapses. All progress
/// is recorded on this resource, so a controller restart resumes cleanly.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "freeze.dev",
    version = "v1",
    kind = "DeploymentFreezer",
    namespaced,
    status = "DeploymentFreezerStatus",
    shortname = "df",
    category = "all",
    printcolumn = r#"{"name":"Target", "type":"string", "jsonPath":".spec.targetRef.name"}"#,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"FreezeUntil", "type":"string", "jsonPath":".status.freezeUntil"}"#
)]
pub struct DeploymentFreezerSpec {
    /// Reference to the target Deployment (same namespace as this resource)
    #[serde(rename = "targetRef")]
    pub target_ref: TargetRef,

    /// Length of the freeze window in seconds. After this period the
    /// operator restores the Deployment.
    #[serde(rename = "durationSeconds")]
    #[schemars(range(min = 1))]
    pub duration_seconds: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct TargetRef {
    /// Name of the target Deployment
    #[schemars(length(min = 1))]
    pub name: String,
}

/// Lifecycle summary of a DeploymentFreezer
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum Phase {
    Pending,
    Freezing,
    Frozen,
    Unfreezing,
    Completed,
    Denied,
    Aborted,
}

/// Category of fact reported in a condition
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum ConditionType {
    TargetFound,
    Ownership,
    FreezeProgress,
    UnfreezeProgress,
    Health,
    SpecChangedDuringFreeze,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Short CamelCase reason for the last condition transition
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum ConditionReason {
    // TargetFound
    Found,
    NotFound,
    #[serde(rename = "UIDMismatch")]
    UidMismatch,

    // Ownership
    Acquired,
    DeniedAlreadyFrozen,
    Lost,
    Released,

    // FreezeProgress
    ScalingDown,
    ScaledToZero,
    #[serde(rename = "AwaitingPDB")]
    AwaitingPdb,

    // UnfreezeProgress
    ScalingUp,
    ScaledUp,
    QuotaExceeded,
    PartialRestore,

    // Health
    Normal,
    Degraded,
    #[serde(rename = "APIConflict")]
    ApiConflict,
    #[serde(rename = "RBACDenied")]
    RbacDenied,

    // SpecChangedDuringFreeze
    Observed,
}

/// A typed, timestamped fact about the freezer's state
///
/// Conditions coexist with the coarser `phase`; there is at most one entry
/// per `type_`, and the list keeps the first-insertion order of each type.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: ConditionType,

    pub status: ConditionStatus,

    pub reason: ConditionReason,

    /// Human-readable message for operators
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// RFC3339 time of the last status change
    #[serde(rename = "lastTransitionTime", skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Cached identity of the target, recorded when the freeze starts
///
/// The UID pins the Deployment's identity so a delete+recreate under the
/// same name is detected.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct StatusTargetRef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
}

/// Status of the DeploymentFreezer
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct DeploymentFreezerStatus {
    /// High-level lifecycle summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,

    /// Last spec generation the controller processed to completion
    #[serde(rename = "observedGeneration", skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Cached target identity
    #[serde(rename = "targetRef", default, skip_serializing_if = "Option::is_none")]
    pub target_ref: Option<StatusTargetRef>,

    /// Replica count recorded immediately before the first scale-down
    #[serde(rename = "originalReplicas", skip_serializing_if = "Option::is_none")]
    pub original_replicas: Option<i32>,

    /// Absolute RFC3339 time at which unfreeze should begin
    #[serde(rename = "freezeUntil", skip_serializing_if = "Option::is_none")]
    pub freeze_until: Option<String>,

    /// Fine-grained condition set, at most one entry per type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[cfg(test)]
#[path = "freezer_test.rs"]
mod tests;
