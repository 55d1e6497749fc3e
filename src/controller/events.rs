//! Kubernetes Event reasons and notes emitted by the engine

pub const REASON_OWNERSHIP_DENIED: &str = "OwnershipDenied";
pub const REASON_FROZEN: &str = "Frozen";
pub const REASON_OWNERSHIP_LOST: &str = "OwnershipLost";
pub const REASON_UNFREEZING_STARTED: &str = "UnfreezingStarted";
pub const REASON_UNFREEZE_COMPLETED: &str = "UnfreezeCompleted";
pub const REASON_RELEASE_SKIPPED_NO_TARGET: &str = "ReleaseSkippedNoTarget";
pub const REASON_RELEASE_SKIPPED_NOT_FOUND: &str = "ReleaseSkippedNotFound";
pub const REASON_RELEASE_SKIPPED_NOT_OWNER: &str = "ReleaseSkippedNotOwner";
pub const REASON_RELEASE_RESTORE_FAILED: &str = "ReleaseRestoreReplicasFailed";
pub const REASON_RELEASE_RESTORED: &str = "ReleaseReplicasRestored";
pub const REASON_RELEASE_CLEAR_OWNERSHIP_FAILED: &str = "ReleaseClearOwnershipFailed";
pub const REASON_RELEASE_OWNERSHIP_CLEARED: &str = "ReleaseOwnershipCleared";

pub(crate) fn note_ownership_denied(namespace: &str, deployment: &str, owner: &str) -> String {
    format!("Deployment {namespace}/{deployment} is already owned by {owner}")
}

pub(crate) fn note_frozen_until(until: &str) -> String {
    format!("Deployment frozen until {until}")
}

pub(crate) fn note_ownership_lost(namespace: &str, deployment: &str) -> String {
    format!("Ownership annotation lost or overwritten on Deployment {namespace}/{deployment}")
}

pub(crate) fn note_unfreezing_started() -> String {
    "Freeze window elapsed; starting unfreeze".to_string()
}

pub(crate) fn note_unfreeze_completed(replicas: i32) -> String {
    format!("Unfreeze completed; replicas restored to {replicas}")
}

pub(crate) fn note_release_skipped_no_target() -> String {
    "No targetRef.name specified; nothing to release".to_string()
}

pub(crate) fn note_release_skipped_not_found(namespace: &str, deployment: &str) -> String {
    format!("Target Deployment {namespace}/{deployment} not found")
}

pub(crate) fn note_release_skipped_not_owner(owner: &str) -> String {
    format!("Ownership annotation does not match; expected {owner:?}")
}

pub(crate) fn note_release_restore_failed(replicas: i32, err: impl std::fmt::Display) -> String {
    format!("Failed to restore replicas to {replicas}: {err}")
}

pub(crate) fn note_release_restored(replicas: i32) -> String {
    format!("Restored replicas to {replicas}")
}

pub(crate) fn note_release_clear_failed(err: impl std::fmt::Display) -> String {
    format!("Failed to clear ownership annotation: {err}")
}

pub(crate) fn note_release_cleared(namespace: &str, deployment: &str) -> String {
    format!("Cleared ownership annotation on Deployment {namespace}/{deployment}")
}
