//! Reconciliation engine for DeploymentFreezer resources
//!
//! The engine is a level-triggered control loop: every reconcile observes the
//! DeploymentFreezer and its target Deployment, moves the cluster one step
//! toward the declared intent, and records progress on the freezer's status.
//! All state lives in the Kubernetes API, so a controller restart resumes
//! from wherever the last write landed.

use std::time::Duration;

pub mod conditions;
pub mod events;
pub mod freezer;
pub mod messages;
pub mod ops;
pub mod phases;
pub mod scheduler;
pub mod status;
pub mod watch;

#[cfg(test)]
pub(crate) mod fake;

pub use freezer::{error_policy, reconcile, Context, ReconcileError};

/// Finalizer token held on every live DeploymentFreezer
pub const FINALIZER: &str = "freeze.dev/finalizer";

/// Ownership annotation on the target Deployment, value `<namespace>/<name>`
/// of the owning freezer
pub const ANNO_FROZEN_BY: &str = "freeze.dev/frozen-by";

/// Template-hash annotation stored on the DeploymentFreezer for spec-change
/// detection
pub const ANNO_TEMPLATE_HASH: &str = "freeze.dev/template-hash";

/// Requeue delay for transient errors and quick follow-ups
pub(crate) const REQUEUE_SHORT: Duration = Duration::from_secs(2);

/// Requeue delay while waiting on slower external conditions
pub(crate) const REQUEUE_MEDIUM: Duration = Duration::from_secs(5);

/// Restore fallback when the target never had a positive replica count
pub(crate) const DEFAULT_REPLICAS: i32 = 1;
