//! Deployment watch fan-out
//!
//! Maps a changed Deployment to every DeploymentFreezer in the same namespace
//! that targets it, using the controller's reflector store as the secondary
//! index. A generation gate drops status-only Deployment updates so the
//! engine's own scale patches do not feed back into the queue.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use k8s_openapi::api::apps::v1::Deployment;
use kube::runtime::reflector::{ObjectRef, Store};
use kube::ResourceExt;

use crate::crd::freezer::DeploymentFreezer;

/// Remembers the last seen `metadata.generation` per Deployment and lets an
/// event through only when it changed
#[derive(Default)]
pub struct GenerationGate {
    seen: Mutex<HashMap<String, i64>>,
}

impl GenerationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when this Deployment's spec generation differs from the last one
    /// observed (or the Deployment is new to the gate)
    pub fn spec_changed(&self, deploy: &Deployment) -> bool {
        let key = format!(
            "{}/{}",
            deploy.namespace().unwrap_or_default(),
            deploy.name_any()
        );
        let generation = deploy.metadata.generation.unwrap_or_default();

        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match seen.insert(key, generation) {
            Some(previous) => previous != generation,
            None => true,
        }
    }
}

/// All freezers in the Deployment's namespace whose `spec.targetRef.name`
/// matches the Deployment's name
pub fn freezers_for_deployment(
    freezers: impl IntoIterator<Item = Arc<DeploymentFreezer>>,
    deploy: &Deployment,
) -> Vec<ObjectRef<DeploymentFreezer>> {
    let namespace = deploy.namespace();
    let deploy_name = deploy.name_any();

    freezers
        .into_iter()
        .filter(|dfz| dfz.namespace() == namespace && dfz.spec.target_ref.name == deploy_name)
        .map(|dfz| ObjectRef::from_obj(dfz.as_ref()))
        .collect()
}

/// Mapper closure wired into the controller's Deployment watch
pub fn map_deployment(
    store: Store<DeploymentFreezer>,
    gate: Arc<GenerationGate>,
) -> impl Fn(Deployment) -> Vec<ObjectRef<DeploymentFreezer>> {
    move |deploy| {
        if !gate.spec_changed(&deploy) {
            return Vec::new();
        }
        freezers_for_deployment(store.state(), &deploy)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Tests can use unwrap/expect for brevity
#[path = "watch_test.rs"]
mod tests;
