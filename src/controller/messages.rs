//! Condition message catalog
//!
//! Single source for user-visible condition messages so handlers and tests
//! cannot drift apart.

use std::fmt::Display;

pub(crate) const MSG_SPEC_TARGET_EMPTY: &str = "spec.targetRef.name is empty";
pub(crate) const MSG_TARGET_NOT_FOUND: &str = "Target Deployment does not exist";
pub(crate) const MSG_UID_RECREATED: &str =
    "Deployment was recreated with a different UID during the freeze lifecycle";

pub(crate) const MSG_OWNERSHIP_ALREADY_HELD: &str = "Ownership already held";
pub(crate) const MSG_OWNERSHIP_LOST: &str =
    "Ownership annotation disappeared or was overwritten";
pub(crate) const MSG_OWNERSHIP_RELEASED: &str = "Ownership released after unfreeze";

pub(crate) const MSG_SCALING_TO_ZERO: &str = "Scaling Deployment to 0";
pub(crate) const MSG_SCALED_TO_ZERO: &str = "Deployment is fully scaled to zero";
pub(crate) const MSG_WAITING_FOR_ZERO: &str = "Waiting for Deployment to reach zero replicas";

pub(crate) const MSG_SPEC_CHANGED: &str =
    "Target Deployment's pod template changed during the lifecycle";

pub(crate) fn already_owned(owner: &str) -> String {
    format!("Deployment is already owned by {owner}")
}

pub(crate) fn ownership_acquired(freezer: &str, namespace: &str, deployment: &str) -> String {
    format!("DFZ {freezer} owns Deployment {namespace}/{deployment}")
}

pub(crate) fn read_error(err: impl Display) -> String {
    format!("read error: {err}")
}

pub(crate) fn template_hash_patch_failed(err: impl Display) -> String {
    format!("template hash patch failed: {err}")
}

pub(crate) fn cannot_scale_down(err: impl Display) -> String {
    format!("cannot scale down yet: {err}")
}

pub(crate) fn restore_failed(replicas: i32, err: impl Display) -> String {
    format!("failed to restore replicas to {replicas}: {err}")
}

pub(crate) fn clear_ownership_failed(err: impl Display) -> String {
    format!("failed to clear ownership: {err}")
}

pub(crate) fn restored(replicas: i32) -> String {
    format!("Deployment restored to {replicas} replicas")
}
