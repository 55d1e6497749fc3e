//! In-memory ClusterOps used by engine tests
//!
//! Stores freezers and deployments in maps, applies the same merge semantics
//! the API server would (annotation delete on empty value, object removal
//! once a deleted object has no finalizers left) and records published
//! events. Individual write paths can be made to fail with a chosen HTTP
//! status code.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test support code

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::core::ErrorResponse;
use kube::runtime::events::EventType;
use kube::ResourceExt;

use crate::controller::ops::ClusterOps;
use crate::controller::FINALIZER;
use crate::crd::freezer::{DeploymentFreezer, DeploymentFreezerStatus};

pub(crate) fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("fake: {reason}"),
        reason: reason.to_string(),
        code,
    })
}

#[derive(Clone)]
pub(crate) struct RecordedEvent {
    pub(crate) type_: EventType,
    pub(crate) reason: String,
    pub(crate) note: String,
}

#[derive(Default)]
struct FakeState {
    freezers: BTreeMap<String, DeploymentFreezer>,
    deployments: BTreeMap<String, Deployment>,
    events: Vec<RecordedEvent>,
    status_patches: u32,
    fail_deployment_reads: Option<u16>,
    fail_replica_patches: Option<u16>,
    fail_annotation_patches: Option<u16>,
    fail_status_patches: Option<u16>,
}

#[derive(Default)]
pub(crate) struct FakeCluster {
    state: Mutex<FakeState>,
}

fn key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

impl FakeCluster {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_freezer(&self, dfz: DeploymentFreezer) {
        let k = key(&dfz.namespace().unwrap_or_default(), &dfz.name_any());
        self.state.lock().unwrap().freezers.insert(k, dfz);
    }

    pub(crate) fn add_deployment(&self, mut deploy: Deployment) {
        if deploy.metadata.uid.is_none() {
            deploy.metadata.uid = Some(format!("uid-{}", deploy.name_any()));
        }
        let k = key(&deploy.namespace().unwrap_or_default(), &deploy.name_any());
        self.state.lock().unwrap().deployments.insert(k, deploy);
    }

    pub(crate) fn remove_deployment(&self, namespace: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .deployments
            .remove(&key(namespace, name));
    }

    /// Emulate `kubectl delete`: sets the deletion timestamp; the object is
    /// only dropped once its finalizers are gone
    pub(crate) fn mark_freezer_deleted(&self, namespace: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(dfz) = state.freezers.get_mut(&key(namespace, name)) {
            dfz.metadata.deletion_timestamp = Some(Time(Utc::now()));
        }
    }

    pub(crate) fn freezer(&self, namespace: &str, name: &str) -> Option<DeploymentFreezer> {
        self.state
            .lock()
            .unwrap()
            .freezers
            .get(&key(namespace, name))
            .cloned()
    }

    pub(crate) fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.state
            .lock()
            .unwrap()
            .deployments
            .get(&key(namespace, name))
            .cloned()
    }

    pub(crate) fn events(&self) -> Vec<RecordedEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub(crate) fn status_patches(&self) -> u32 {
        self.state.lock().unwrap().status_patches
    }

    pub(crate) fn fail_deployment_reads(&self, code: Option<u16>) {
        self.state.lock().unwrap().fail_deployment_reads = code;
    }

    pub(crate) fn fail_replica_patches(&self, code: Option<u16>) {
        self.state.lock().unwrap().fail_replica_patches = code;
    }

    pub(crate) fn fail_annotation_patches(&self, code: Option<u16>) {
        self.state.lock().unwrap().fail_annotation_patches = code;
    }

    pub(crate) fn fail_status_patches(&self, code: Option<u16>) {
        self.state.lock().unwrap().fail_status_patches = code;
    }
}

#[async_trait]
impl ClusterOps for FakeCluster {
    async fn get_freezer(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DeploymentFreezer>, kube::Error> {
        Ok(self.freezer(namespace, name))
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, kube::Error> {
        let state = self.state.lock().unwrap();
        if let Some(code) = state.fail_deployment_reads {
            return Err(api_error(code, "InjectedReadFailure"));
        }
        Ok(state.deployments.get(&key(namespace, name)).cloned())
    }

    async fn set_deployment_replicas(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), kube::Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(code) = state.fail_replica_patches {
            return Err(api_error(code, "InjectedScaleFailure"));
        }
        let deploy = state
            .deployments
            .get_mut(&key(namespace, name))
            .ok_or_else(|| api_error(404, "NotFound"))?;
        deploy
            .spec
            .get_or_insert_with(Default::default)
            .replicas = Some(replicas);
        Ok(())
    }

    async fn set_deployment_annotation(
        &self,
        namespace: &str,
        name: &str,
        annotation_key: &str,
        value: &str,
    ) -> Result<(), kube::Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(code) = state.fail_annotation_patches {
            return Err(api_error(code, "InjectedAnnotationFailure"));
        }
        let deploy = state
            .deployments
            .get_mut(&key(namespace, name))
            .ok_or_else(|| api_error(404, "NotFound"))?;
        let annotations = deploy.metadata.annotations.get_or_insert_with(BTreeMap::new);
        if value.is_empty() {
            annotations.remove(annotation_key);
        } else {
            annotations.insert(annotation_key.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn set_freezer_annotation(
        &self,
        namespace: &str,
        name: &str,
        annotation_key: &str,
        value: &str,
    ) -> Result<(), kube::Error> {
        let mut state = self.state.lock().unwrap();
        let dfz = state
            .freezers
            .get_mut(&key(namespace, name))
            .ok_or_else(|| api_error(404, "NotFound"))?;
        let annotations = dfz.metadata.annotations.get_or_insert_with(BTreeMap::new);
        if value.is_empty() {
            annotations.remove(annotation_key);
        } else {
            annotations.insert(annotation_key.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn ensure_finalizer(&self, namespace: &str, name: &str) -> Result<(), kube::Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(dfz) = state.freezers.get_mut(&key(namespace, name)) {
            let finalizers = dfz.metadata.finalizers.get_or_insert_with(Vec::new);
            if !finalizers.iter().any(|f| f == FINALIZER) {
                finalizers.push(FINALIZER.to_string());
            }
        }
        Ok(())
    }

    async fn remove_finalizer(&self, namespace: &str, name: &str) -> Result<(), kube::Error> {
        let mut state = self.state.lock().unwrap();
        let k = key(namespace, name);
        let Some(dfz) = state.freezers.get_mut(&k) else {
            return Ok(());
        };
        if let Some(finalizers) = dfz.metadata.finalizers.as_mut() {
            finalizers.retain(|f| f != FINALIZER);
        }
        // API-server finalization: a deleted object vanishes once the last
        // finalizer is removed
        let finalized = dfz.metadata.deletion_timestamp.is_some()
            && dfz.metadata.finalizers.as_ref().map_or(true, Vec::is_empty);
        if finalized {
            state.freezers.remove(&k);
        }
        Ok(())
    }

    async fn patch_freezer_status(
        &self,
        namespace: &str,
        name: &str,
        status: &DeploymentFreezerStatus,
    ) -> Result<(), kube::Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(code) = state.fail_status_patches {
            return Err(api_error(code, "InjectedStatusFailure"));
        }
        let dfz = state
            .freezers
            .get_mut(&key(namespace, name))
            .ok_or_else(|| api_error(404, "NotFound"))?;
        dfz.status = Some(status.clone());
        state.status_patches += 1;
        Ok(())
    }

    async fn publish_event(
        &self,
        _dfz: &DeploymentFreezer,
        type_: EventType,
        reason: &str,
        note: String,
    ) {
        self.state.lock().unwrap().events.push(RecordedEvent {
            type_,
            reason: reason.to_string(),
            note,
        });
    }
}
