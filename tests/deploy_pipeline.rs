mod common;

use std::fs;
use std::path::Path;

use clusterkit::component::ComponentSpec;
use clusterkit::deploy::{ComponentDeployer, DeployOptions, DeployRequest, Stage};
use clusterkit::fanout::FailurePolicy;
use clusterkit::template::{BuiltinTemplates, TemplateLookup, TemplateRegistry, FLANNELD_VERSION};
use clusterkit::{DeploymentOutputs, ErrorCode};

use common::{nodes, v1_templates, write_root_ca, RecordingTransport};

fn deployer<'a>(
    spec: ComponentSpec,
    options: DeployOptions,
    registry: &'a dyn TemplateRegistry,
    transport: &'a RecordingTransport,
) -> ComponentDeployer<'a> {
    ComponentDeployer::new(spec, options, registry, transport, transport)
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn three_node_coordination_store_deploys_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    write_root_ca(dir.path());
    let registry = v1_templates();
    let transport = RecordingTransport::default();
    let mut outputs = DeploymentOutputs::new();

    let report = deployer(
        ComponentSpec::coordination_store(),
        DeployOptions::default(),
        &registry,
        &transport,
    )
    .deploy(&DeployRequest::new(nodes(3), 3, "v1", dir.path()), &mut outputs)
    .unwrap();

    assert_eq!(
        report.stages,
        vec![
            Stage::Validate,
            Stage::Clean,
            Stage::Generate,
            Stage::Distribute,
            Stage::Activate,
            Stage::Done
        ]
    );
    assert_eq!(report.artifacts.len(), 3);

    for node in nodes(3) {
        assert_eq!(
            file_names(&dir.path().join("ca/etcd").join(&node.ip)),
            vec!["etcd-csr.json", "etcd-key.pem", "etcd.csr", "etcd.pem"]
        );
        assert_eq!(
            file_names(&dir.path().join("service/etcd").join(&node.ip)),
            vec!["etcd.service"]
        );

        let pushes = transport.pushes_for(&node.ip);
        assert_eq!(pushes.len(), 5);
        assert!(pushes.iter().any(|m| m.remote == "/etc/etcd/ssl/etcd-key.pem"));
        assert!(pushes
            .iter()
            .any(|m| m.remote == "/etc/systemd/system/etcd.service"));

        let commands = transport.commands_for(&node.ip);
        assert_eq!(
            commands,
            vec![
                "mkdir -p '/etc/etcd/ssl' '/etc/systemd/system'",
                "systemctl daemon-reload",
                "systemctl enable etcd.service",
                "systemctl start --no-block etcd.service",
            ]
        );
    }

    let endpoints = report.endpoints.unwrap();
    assert_eq!(endpoints.client.len(), 3);
    assert_eq!(endpoints.peer.len(), 3);
    assert_eq!(
        outputs.get("etcd", "EtcdEndpoints"),
        Some("https://10.0.0.1:2379,https://10.0.0.2:2379,https://10.0.0.3:2379")
    );
    assert_eq!(
        outputs.get("etcd", "EtcdPeerEndpoints"),
        Some("etcd-node-0=https://10.0.0.1:2380,etcd-node-1=https://10.0.0.2:2380,etcd-node-2=https://10.0.0.3:2380")
    );
}

#[test]
fn unit_files_carry_node_name_and_full_peer_list() {
    let dir = tempfile::tempdir().unwrap();
    write_root_ca(dir.path());
    let registry = v1_templates();
    let transport = RecordingTransport::default();

    deployer(
        ComponentSpec::coordination_store(),
        DeployOptions::default(),
        &registry,
        &transport,
    )
    .deploy(
        &DeployRequest::new(nodes(3), 3, "v1", dir.path()),
        &mut DeploymentOutputs::new(),
    )
    .unwrap();

    let unit = fs::read_to_string(dir.path().join("service/etcd/10.0.0.2/etcd.service")).unwrap();
    assert!(unit.contains("--name=etcd-node-1 "));
    assert!(unit.contains(
        "--initial-cluster=etcd-node-0=https://10.0.0.1:2380,etcd-node-1=https://10.0.0.2:2380,etcd-node-2=https://10.0.0.3:2380"
    ));

    let csr = fs::read_to_string(dir.path().join("ca/etcd/10.0.0.2/etcd-csr.json")).unwrap();
    assert!(csr.contains("\"10.0.0.2\""));
}

#[cfg(unix)]
#[test]
fn local_artifacts_get_restrictive_modes() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    write_root_ca(dir.path());
    let registry = v1_templates();
    let transport = RecordingTransport::default();

    deployer(
        ComponentSpec::coordination_store(),
        DeployOptions::default(),
        &registry,
        &transport,
    )
    .deploy(
        &DeployRequest::new(nodes(2), 2, "v1", dir.path()),
        &mut DeploymentOutputs::new(),
    )
    .unwrap();

    let mode = |p: &str| fs::metadata(dir.path().join(p)).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode("ca/etcd/10.0.0.1/etcd-key.pem"), 0o600);
    assert_eq!(mode("ca/etcd/10.0.0.1/etcd.pem"), 0o600);
    assert_eq!(mode("service/etcd/10.0.0.1/etcd.service"), 0o700);
}

#[test]
fn unknown_version_with_permissive_lookup_fails_as_invalid_request() {
    let dir = tempfile::tempdir().unwrap();
    write_root_ca(dir.path());
    let registry = v1_templates();
    let transport = RecordingTransport::default();

    let err = deployer(
        ComponentSpec::coordination_store(),
        DeployOptions::default(),
        &registry,
        &transport,
    )
    .deploy(
        &DeployRequest::new(nodes(3), 3, "unknown", dir.path()),
        &mut DeploymentOutputs::new(),
    )
    .unwrap_err();

    assert_eq!(err.code, ErrorCode::CertRequestInvalid);
    assert_eq!(transport.call_count(), 0);
}

#[test]
fn unknown_version_with_strict_lookup_fails_before_any_io() {
    let dir = tempfile::tempdir().unwrap();
    write_root_ca(dir.path());
    let registry = v1_templates();
    let transport = RecordingTransport::default();
    let options = DeployOptions {
        template_lookup: TemplateLookup::Strict,
        ..DeployOptions::default()
    };

    let err = deployer(ComponentSpec::coordination_store(), options, &registry, &transport)
        .deploy(
            &DeployRequest::new(nodes(3), 3, "unknown", dir.path()),
            &mut DeploymentOutputs::new(),
        )
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::TemplateUnknownVersion);
    assert!(!dir.path().join("ca/etcd").exists());
    assert_eq!(transport.call_count(), 0);
}

#[test]
fn too_few_nodes_is_a_configuration_error_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let registry = v1_templates();
    let transport = RecordingTransport::default();
    let mut outputs = DeploymentOutputs::new();

    let err = deployer(
        ComponentSpec::coordination_store(),
        DeployOptions::default(),
        &registry,
        &transport,
    )
    .deploy(&DeployRequest::new(nodes(1), 1, "v1", dir.path()), &mut outputs)
    .unwrap_err();

    assert_eq!(err.code, ErrorCode::ConfigInsufficientNodes);
    assert!(err.code.is_configuration());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    assert_eq!(transport.call_count(), 0);
    assert!(outputs.component("etcd").is_none());
}

#[test]
fn more_members_than_nodes_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let registry = v1_templates();
    let transport = RecordingTransport::default();

    let err = deployer(
        ComponentSpec::coordination_store(),
        DeployOptions::default(),
        &registry,
        &transport,
    )
    .deploy(
        &DeployRequest::new(nodes(2), 3, "v1", dir.path()),
        &mut DeploymentOutputs::new(),
    )
    .unwrap_err();

    assert_eq!(err.code, ErrorCode::ConfigExcessNodes);
    assert_eq!(transport.call_count(), 0);
}

#[test]
fn only_the_first_master_nodes_become_members() {
    let dir = tempfile::tempdir().unwrap();
    write_root_ca(dir.path());
    let registry = v1_templates();
    let transport = RecordingTransport::default();
    let mut outputs = DeploymentOutputs::new();

    let report = deployer(
        ComponentSpec::coordination_store(),
        DeployOptions::default(),
        &registry,
        &transport,
    )
    .deploy(&DeployRequest::new(nodes(4), 2, "v1", dir.path()), &mut outputs)
    .unwrap();

    assert_eq!(report.artifacts.len(), 2);
    assert!(transport.commands_for("10.0.0.3").is_empty());
    assert!(!dir.path().join("ca/etcd/10.0.0.3").exists());
    assert_eq!(
        outputs.get("etcd", "EtcdEndpoints"),
        Some("https://10.0.0.1:2379,https://10.0.0.2:2379")
    );
}

#[test]
fn one_failed_push_fails_the_stage_after_every_node_reports() {
    let dir = tempfile::tempdir().unwrap();
    write_root_ca(dir.path());
    let registry = v1_templates();
    let transport = RecordingTransport::failing_push_on("10.0.0.2");
    let mut outputs = DeploymentOutputs::new();

    let err = deployer(
        ComponentSpec::coordination_store(),
        DeployOptions::default(),
        &registry,
        &transport,
    )
    .deploy(&DeployRequest::new(nodes(3), 3, "v1", dir.path()), &mut outputs)
    .unwrap_err();

    assert_eq!(err.code, ErrorCode::DeployDistributionFailed);
    assert_eq!(err.details["host"], "10.0.0.2");
    assert_eq!(err.retryable, Some(true));
    assert_eq!(transport.pushes_for("10.0.0.1").len(), 5);
    assert_eq!(transport.pushes_for("10.0.0.3").len(), 5);
    assert!(transport.hosts_running("systemctl daemon-reload").is_empty());
    assert!(outputs.component("etcd").is_none());
}

#[test]
fn activation_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_root_ca(dir.path());
    let registry = v1_templates();
    let transport = RecordingTransport::failing_command("systemctl start");

    let err = deployer(
        ComponentSpec::coordination_store(),
        DeployOptions::default(),
        &registry,
        &transport,
    )
    .deploy(
        &DeployRequest::new(nodes(2), 2, "v1", dir.path()),
        &mut DeploymentOutputs::new(),
    )
    .unwrap_err();

    assert_eq!(err.code, ErrorCode::DeployActivationFailed);
    assert_eq!(transport.hosts_running("systemctl daemon-reload").len(), 2);
}

#[test]
fn cancel_siblings_policy_still_reports_the_root_cause() {
    let dir = tempfile::tempdir().unwrap();
    write_root_ca(dir.path());
    let registry = v1_templates();
    let transport = RecordingTransport::failing_push_on("10.0.0.1");
    let options = DeployOptions {
        failure_policy: FailurePolicy::CancelSiblings,
        ..DeployOptions::default()
    };

    let err = deployer(ComponentSpec::coordination_store(), options, &registry, &transport)
        .deploy(
            &DeployRequest::new(nodes(3), 3, "v1", dir.path()),
            &mut DeploymentOutputs::new(),
        )
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::DeployDistributionFailed);
    assert_eq!(err.details["host"], "10.0.0.1");
}

#[test]
fn rerun_purges_stale_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    write_root_ca(dir.path());
    let registry = v1_templates();
    let transport = RecordingTransport::default();
    let deployer = deployer(
        ComponentSpec::coordination_store(),
        DeployOptions::default(),
        &registry,
        &transport,
    );
    let request = DeployRequest::new(nodes(2), 2, "v1", dir.path());

    deployer.deploy(&request, &mut DeploymentOutputs::new()).unwrap();
    let first_cert = fs::read(dir.path().join("ca/etcd/10.0.0.1/etcd.pem")).unwrap();

    fs::write(dir.path().join("ca/etcd/10.0.0.1/stale.pem"), "old").unwrap();
    fs::create_dir_all(dir.path().join("service/etcd/10.9.9.9")).unwrap();

    deployer.deploy(&request, &mut DeploymentOutputs::new()).unwrap();

    assert!(!dir.path().join("ca/etcd/10.0.0.1/stale.pem").exists());
    assert!(!dir.path().join("service/etcd/10.9.9.9").exists());
    assert!(dir.path().join("ca/root/ca.pem").exists());
    let second_cert = fs::read(dir.path().join("ca/etcd/10.0.0.1/etcd.pem")).unwrap();
    assert_ne!(first_cert, second_cert);
}

#[test]
fn overlay_agent_requires_store_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    write_root_ca(dir.path());
    let transport = RecordingTransport::default();

    let err = deployer(
        ComponentSpec::overlay_agent(),
        DeployOptions::default(),
        &BuiltinTemplates,
        &transport,
    )
    .deploy(
        &DeployRequest::new(nodes(3), 3, FLANNELD_VERSION, dir.path()),
        &mut DeploymentOutputs::new(),
    )
    .unwrap_err();

    assert_eq!(err.code, ErrorCode::ConfigMissingOutput);
    assert!(!dir.path().join("ca/flanneld").exists());
    assert_eq!(transport.call_count(), 0);
}

#[test]
fn overlay_agent_runs_pre_start_then_activates_serially() {
    let dir = tempfile::tempdir().unwrap();
    write_root_ca(dir.path());
    let transport = RecordingTransport::default();
    let mut outputs = DeploymentOutputs::new();
    outputs.publish(
        "etcd",
        "EtcdEndpoints",
        "https://10.0.0.1:2379,https://10.0.0.2:2379",
    );

    let report = deployer(
        ComponentSpec::overlay_agent(),
        DeployOptions::default(),
        &BuiltinTemplates,
        &transport,
    )
    .deploy(
        &DeployRequest::new(nodes(3), 3, FLANNELD_VERSION, dir.path()),
        &mut outputs,
    )
    .unwrap();

    assert!(report.endpoints.is_none());
    assert!(outputs.component("flanneld").is_none());
    assert_eq!(
        transport.hosts_running("systemctl daemon-reload"),
        vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]
    );

    let first = transport.commands_for("10.0.0.1");
    let pre_start = first
        .iter()
        .position(|c| c.contains("etcdctl --endpoints=https://10.0.0.1:2379,https://10.0.0.2:2379"))
        .unwrap();
    let reload = first.iter().position(|c| c == "systemctl daemon-reload").unwrap();
    assert!(pre_start < reload);
    assert!(transport
        .commands_for("10.0.0.2")
        .iter()
        .all(|c| !c.contains("etcdctl")));
    assert_eq!(
        transport.commands_for("10.0.0.2")[0],
        "mkdir -p '/etc/flanneld/ssl' '/etc/systemd/system'"
    );

    let unit = fs::read_to_string(dir.path().join("service/flanneld/10.0.0.3/flanneld.service")).unwrap();
    assert!(unit.contains("-etcd-endpoints=https://10.0.0.1:2379,https://10.0.0.2:2379"));
    assert!(unit.contains("-public-ip=10.0.0.3"));
}

#[test]
fn failing_pre_start_script_is_an_activation_error() {
    let dir = tempfile::tempdir().unwrap();
    write_root_ca(dir.path());
    let transport = RecordingTransport::failing_command("etcdctl");
    let mut outputs = DeploymentOutputs::new();
    outputs.publish("etcd", "EtcdEndpoints", "https://10.0.0.1:2379");

    let err = deployer(
        ComponentSpec::overlay_agent(),
        DeployOptions::default(),
        &BuiltinTemplates,
        &transport,
    )
    .deploy(
        &DeployRequest::new(nodes(2), 2, FLANNELD_VERSION, dir.path()),
        &mut outputs,
    )
    .unwrap_err();

    assert_eq!(err.code, ErrorCode::DeployActivationFailed);
    assert!(transport.hosts_running("systemctl daemon-reload").is_empty());
}

#[test]
fn coordination_store_output_feeds_the_overlay_agent() {
    let dir = tempfile::tempdir().unwrap();
    write_root_ca(dir.path());
    let transport = RecordingTransport::default();
    let mut outputs = DeploymentOutputs::new();

    deployer(
        ComponentSpec::coordination_store(),
        DeployOptions::default(),
        &BuiltinTemplates,
        &transport,
    )
    .deploy(
        &DeployRequest::new(nodes(3), 2, clusterkit::template::ETCD_VERSION, dir.path()),
        &mut outputs,
    )
    .unwrap();

    deployer(
        ComponentSpec::overlay_agent(),
        DeployOptions::default(),
        &BuiltinTemplates,
        &transport,
    )
    .deploy(
        &DeployRequest::new(nodes(3), 3, FLANNELD_VERSION, dir.path()),
        &mut outputs,
    )
    .unwrap();

    let unit = fs::read_to_string(dir.path().join("service/flanneld/10.0.0.1/flanneld.service")).unwrap();
    assert!(unit.contains("-etcd-endpoints=https://10.0.0.1:2379,https://10.0.0.2:2379"));
    assert!(dir.path().join("ca/etcd/10.0.0.1/etcd.pem").exists());
}
