//! Typed access to the cluster objects the engine reads and mutates
//!
//! Every mutation is a merge patch against the latest object, retried on
//! optimistic-concurrency conflicts with a bounded exponential backoff. The
//! engine only talks to the cluster through the [`ClusterOps`] trait so the
//! whole reconcile path can run against an in-memory implementation in tests.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Patch, PatchParams};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Api, Client, Resource};
use serde_json::json;
use tracing::warn;

use crate::controller::FINALIZER;
use crate::crd::freezer::{DeploymentFreezer, DeploymentFreezerStatus};

/// Maximum write attempts before a conflict is surfaced to the caller
const RETRY_ATTEMPTS: u32 = 5;

/// Initial backoff delay, doubled on every retry
const RETRY_BASE_DELAY: Duration = Duration::from_millis(10);

/// Cluster operations the reconcile engine depends on
///
/// All getters return `Ok(None)` for missing objects so callers can branch on
/// absence without matching API error codes. Mutations return raw API errors
/// verbatim; the caller decides which condition to surface.
#[async_trait]
pub trait ClusterOps: Send + Sync {
    async fn get_freezer(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DeploymentFreezer>, kube::Error>;

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, kube::Error>;

    /// Patch `.spec.replicas` on a Deployment
    async fn set_deployment_replicas(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), kube::Error>;

    /// Set an annotation on a Deployment; an empty value deletes the key
    async fn set_deployment_annotation(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), kube::Error>;

    /// Set an annotation on a DeploymentFreezer; an empty value deletes the key
    async fn set_freezer_annotation(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), kube::Error>;

    /// Add the engine finalizer to a DeploymentFreezer (idempotent)
    async fn ensure_finalizer(&self, namespace: &str, name: &str) -> Result<(), kube::Error>;

    /// Remove the engine finalizer from a DeploymentFreezer (idempotent)
    async fn remove_finalizer(&self, namespace: &str, name: &str) -> Result<(), kube::Error>;

    /// Overwrite the status subresource of a DeploymentFreezer
    async fn patch_freezer_status(
        &self,
        namespace: &str,
        name: &str,
        status: &DeploymentFreezerStatus,
    ) -> Result<(), kube::Error>;

    /// Publish a Kubernetes Event for a DeploymentFreezer (best-effort)
    async fn publish_event(
        &self,
        dfz: &DeploymentFreezer,
        type_: EventType,
        reason: &str,
        note: String,
    );
}

pub(crate) fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 409)
}

/// Run a cluster write, retrying while `retryable` says so
///
/// Bounded at [`RETRY_ATTEMPTS`] with exponential backoff. Non-retryable
/// errors are returned immediately.
pub(crate) async fn retry_when<T, F, Fut, P>(
    mut operation: F,
    retryable: P,
) -> Result<T, kube::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, kube::Error>>,
    P: Fn(&kube::Error) -> bool,
{
    let mut attempt = 0u32;
    let mut delay = RETRY_BASE_DELAY;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < RETRY_ATTEMPTS && retryable(&err) => {
                warn!(error = %err, attempt, "Cluster write failed, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(err) => return Err(err),
        }
    }
}

pub(crate) async fn retry_on_conflict<T, F, Fut>(operation: F) -> Result<T, kube::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, kube::Error>>,
{
    retry_when(operation, is_conflict).await
}

pub(crate) async fn retry_on_any<T, F, Fut>(operation: F) -> Result<T, kube::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, kube::Error>>,
{
    retry_when(operation, |_| true).await
}

/// Production [`ClusterOps`] backed by the kube client
pub struct KubeOps {
    client: Client,
    recorder: Recorder,
}

impl KubeOps {
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: "halla".to_string(),
            instance: std::env::var("HOSTNAME").ok(),
        };
        let recorder = Recorder::new(client.clone(), reporter);
        Self { client, recorder }
    }

    fn freezers(&self, namespace: &str) -> Api<DeploymentFreezer> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Merge-patch value for a single annotation; `Null` deletes the key
fn annotation_patch(key: &str, value: &str) -> serde_json::Value {
    let value = if value.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::Value::String(value.to_string())
    };
    json!({ "metadata": { "annotations": { key: value } } })
}

#[async_trait]
impl ClusterOps for KubeOps {
    async fn get_freezer(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DeploymentFreezer>, kube::Error> {
        self.freezers(namespace).get_opt(name).await
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, kube::Error> {
        self.deployments(namespace).get_opt(name).await
    }

    async fn set_deployment_replicas(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), kube::Error> {
        let api = self.deployments(namespace);
        let patch = json!({ "spec": { "replicas": replicas } });
        retry_on_conflict(|| {
            let api = api.clone();
            let patch = patch.clone();
            async move {
                api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
                    .await
                    .map(|_| ())
            }
        })
        .await
    }

    async fn set_deployment_annotation(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), kube::Error> {
        let api = self.deployments(namespace);
        let patch = annotation_patch(key, value);
        retry_on_conflict(|| {
            let api = api.clone();
            let patch = patch.clone();
            async move {
                api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
                    .await
                    .map(|_| ())
            }
        })
        .await
    }

    async fn set_freezer_annotation(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), kube::Error> {
        let api = self.freezers(namespace);
        let patch = annotation_patch(key, value);
        retry_on_conflict(|| {
            let api = api.clone();
            let patch = patch.clone();
            async move {
                api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
                    .await
                    .map(|_| ())
            }
        })
        .await
    }

    async fn ensure_finalizer(&self, namespace: &str, name: &str) -> Result<(), kube::Error> {
        let api = self.freezers(namespace);
        retry_on_conflict(|| {
            let api = api.clone();
            async move {
                let Some(latest) = api.get_opt(name).await? else {
                    return Ok(());
                };
                let mut finalizers = latest.metadata.finalizers.clone().unwrap_or_default();
                if finalizers.iter().any(|f| f == FINALIZER) {
                    return Ok(());
                }
                finalizers.push(FINALIZER.to_string());
                // Carrying resourceVersion makes the merge patch conflict on
                // concurrent finalizer edits instead of clobbering them
                let patch = json!({
                    "metadata": {
                        "resourceVersion": latest.metadata.resource_version,
                        "finalizers": finalizers,
                    }
                });
                api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
                    .await
                    .map(|_| ())
            }
        })
        .await
    }

    async fn remove_finalizer(&self, namespace: &str, name: &str) -> Result<(), kube::Error> {
        let api = self.freezers(namespace);
        retry_on_conflict(|| {
            let api = api.clone();
            async move {
                let Some(latest) = api.get_opt(name).await? else {
                    return Ok(());
                };
                let finalizers = latest.metadata.finalizers.clone().unwrap_or_default();
                if !finalizers.iter().any(|f| f == FINALIZER) {
                    return Ok(());
                }
                let remaining: Vec<String> =
                    finalizers.into_iter().filter(|f| f != FINALIZER).collect();
                let patch = json!({
                    "metadata": {
                        "resourceVersion": latest.metadata.resource_version,
                        "finalizers": remaining,
                    }
                });
                api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
                    .await
                    .map(|_| ())
            }
        })
        .await
    }

    async fn patch_freezer_status(
        &self,
        namespace: &str,
        name: &str,
        status: &DeploymentFreezerStatus,
    ) -> Result<(), kube::Error> {
        let api = self.freezers(namespace);
        let patch = json!({ "status": status });
        // Status commits retry on any error; a lost write is recovered by the
        // next reconcile anyway
        retry_on_any(|| {
            let api = api.clone();
            let patch = patch.clone();
            async move {
                api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
                    .await
                    .map(|_| ())
            }
        })
        .await
    }

    async fn publish_event(
        &self,
        dfz: &DeploymentFreezer,
        type_: EventType,
        reason: &str,
        note: String,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note: Some(note),
            action: reason.to_string(),
            secondary: None,
        };
        if let Err(err) = self.recorder.publish(&event, &dfz.object_ref(&())).await {
            warn!(error = %err, reason, "Failed to publish event");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Tests can use unwrap/expect for brevity
#[path = "ops_test.rs"]
mod tests;
