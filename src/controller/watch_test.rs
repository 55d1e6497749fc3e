use super::*;
use crate::crd::freezer::{DeploymentFreezerSpec, TargetRef};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

fn make_freezer(namespace: &str, name: &str, target: &str) -> Arc<DeploymentFreezer> {
    Arc::new(DeploymentFreezer {
        metadata: ObjectMeta {
            namespace: Some(namespace.to_string()),
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: DeploymentFreezerSpec {
            target_ref: TargetRef {
                name: target.to_string(),
            },
            duration_seconds: 5,
        },
        status: None,
    })
}

fn make_deployment(namespace: &str, name: &str, generation: i64) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            namespace: Some(namespace.to_string()),
            name: Some(name.to_string()),
            generation: Some(generation),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn test_mapping_selects_freezers_targeting_the_deployment() {
    let freezers = vec![
        make_freezer("default", "freeze-a", "web"),
        make_freezer("default", "freeze-b", "web"),
        make_freezer("default", "freeze-c", "other-deploy"),
        make_freezer("staging", "freeze-d", "web"), // same target name, wrong namespace
    ];
    let deploy = make_deployment("default", "web", 1);

    let refs = freezers_for_deployment(freezers, &deploy);

    let names: Vec<String> = refs.iter().map(|r| r.name.clone()).collect();
    assert_eq!(names, vec!["freeze-a", "freeze-b"]);
    assert!(refs.iter().all(|r| r.namespace.as_deref() == Some("default")));
}

#[test]
fn test_mapping_returns_empty_when_nothing_targets_it() {
    let freezers = vec![make_freezer("default", "freeze-a", "web")];
    let deploy = make_deployment("default", "unrelated", 1);

    assert!(freezers_for_deployment(freezers, &deploy).is_empty());
}

#[test]
fn test_generation_gate_passes_first_sighting() {
    let gate = GenerationGate::new();
    let deploy = make_deployment("default", "web", 1);
    assert!(gate.spec_changed(&deploy));
}

#[test]
fn test_generation_gate_drops_status_only_updates() {
    let gate = GenerationGate::new();
    let deploy = make_deployment("default", "web", 4);

    assert!(gate.spec_changed(&deploy));
    // A status-only update leaves metadata.generation untouched
    assert!(!gate.spec_changed(&deploy));
    assert!(!gate.spec_changed(&deploy));
}

#[test]
fn test_generation_gate_passes_spec_changes() {
    let gate = GenerationGate::new();
    assert!(gate.spec_changed(&make_deployment("default", "web", 1)));
    assert!(gate.spec_changed(&make_deployment("default", "web", 2)));
    assert!(!gate.spec_changed(&make_deployment("default", "web", 2)));
}

#[test]
fn test_generation_gate_tracks_deployments_independently() {
    let gate = GenerationGate::new();
    assert!(gate.spec_changed(&make_deployment("default", "web", 1)));
    assert!(gate.spec_changed(&make_deployment("default", "api", 1)));
    assert!(!gate.spec_changed(&make_deployment("default", "web", 1)));
    assert!(gate.spec_changed(&make_deployment("staging", "web", 1)));
}
