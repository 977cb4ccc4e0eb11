use serde::Serialize;
use std::path::PathBuf;

use crate::activate::{PreActivation, ServiceActivator};
use crate::artifact::{Artifact, ArtifactKind, NodeArtifacts};
use crate::ca::CertificateAuthorityIssuer;
use crate::component::{ComponentSpec, TemplateEndpoints};
use crate::defaults::{self, Defaults, PermissionsConfig, RemoteLayout};
use crate::distribute::RemoteDistributor;
use crate::error::{Error, Result};
use crate::fanout::{FailurePolicy, FanOut, TaskContext};
use crate::node::{Node, RootCa};
use crate::outputs::{node_name, DeploymentOutputs, EndpointSet};
use crate::remote::{FilePusher, RemoteExecutor};
use crate::template::{
    ArtifactRenderer, ComponentEndpoint, TemplateKind, TemplateLookup, TemplateRegistry,
};
use crate::utils::io;
use crate::workspace::Workspace;

// =============================================================================
// Options and request
// =============================================================================

/// Per-run knobs, normally taken from clusterkit.json.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub signing_profile: String,
    pub template_lookup: TemplateLookup,
    pub failure_policy: FailurePolicy,
    pub remote: RemoteLayout,
    pub permissions: PermissionsConfig,
}

impl DeployOptions {
    pub fn from_defaults(defaults: &Defaults) -> Self {
        Self {
            signing_profile: defaults.signing_profile.clone(),
            template_lookup: defaults.template_lookup,
            failure_policy: defaults.failure_policy,
            remote: defaults.remote.clone(),
            permissions: defaults.permissions.clone(),
        }
    }

    /// Options from clusterkit.json, or the built-in defaults when it is absent.
    pub fn load() -> Self {
        Self::from_defaults(&defaults::load_defaults())
    }
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self::from_defaults(&Defaults::default())
    }
}

#[derive(Debug, Clone)]
pub struct DeployRequest {
    /// The deployment's node pool, in index order.
    pub nodes: Vec<Node>,
    /// Number of leading nodes that become members of this component.
    pub master: usize,
    pub version: String,
    pub root_ca: RootCa,
    pub workspace_root: PathBuf,
}

impl DeployRequest {
    /// Request whose root CA lives in the workspace's `ca/root` folder.
    pub fn new(
        nodes: Vec<Node>,
        master: usize,
        version: impl Into<String>,
        workspace_root: impl Into<PathBuf>,
    ) -> Self {
        let workspace_root = workspace_root.into();
        Self {
            nodes,
            master,
            version: version.into(),
            root_ca: RootCa::in_workspace(&workspace_root),
            workspace_root,
        }
    }
}

// =============================================================================
// Report
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validate,
    Clean,
    Generate,
    Distribute,
    Activate,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Clean => "clean",
            Stage::Generate => "generate",
            Stage::Distribute => "distribute",
            Stage::Activate => "activate",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

/// Summary of one successful component deploy.
#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    pub run_id: uuid::Uuid,
    pub component: String,
    pub version: String,
    pub started_at: String,
    pub finished_at: String,
    /// Stages entered, in order.
    pub stages: Vec<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<EndpointSet>,
    pub artifacts: Vec<NodeArtifacts>,
}

impl DeployReport {
    fn start(component: &str, version: &str) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4(),
            component: component.to_string(),
            version: version.to_string(),
            started_at: chrono::Utc::now().to_rfc3339(),
            finished_at: String::new(),
            stages: Vec::new(),
            endpoints: None,
            artifacts: Vec::new(),
        }
    }

    fn enter(&mut self, stage: Stage) {
        log_status!("deploy", "{} [{}]: {}", self.component, self.run_id, stage.as_str());
        self.stages.push(stage);
    }

    fn current(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::Validate)
    }
}

// =============================================================================
// Deployer
// =============================================================================

/// Runs `Validate → Clean → Generate → Distribute → Activate → Done` for one
/// component. Stages never overlap; per-node work inside a stage does.
pub struct ComponentDeployer<'a> {
    spec: ComponentSpec,
    options: DeployOptions,
    registry: &'a dyn TemplateRegistry,
    executor: &'a dyn RemoteExecutor,
    pusher: &'a dyn FilePusher,
}

/// Per-node inputs shared by every Generate worker.
struct GenerateContext<'r> {
    version: &'r str,
    endpoints: &'r str,
    renderer: &'r ArtifactRenderer<'r>,
    issuer: &'r CertificateAuthorityIssuer,
    workspace: &'r Workspace,
}

impl<'a> ComponentDeployer<'a> {
    pub fn new(
        spec: ComponentSpec,
        options: DeployOptions,
        registry: &'a dyn TemplateRegistry,
        executor: &'a dyn RemoteExecutor,
        pusher: &'a dyn FilePusher,
    ) -> Self {
        Self {
            spec,
            options,
            registry,
            executor,
            pusher,
        }
    }

    pub fn spec(&self) -> &ComponentSpec {
        &self.spec
    }

    /// Deploy the component and publish its endpoints into `outputs`.
    ///
    /// Nothing is rolled back on failure: local and remote artifacts from
    /// completed stages stay in place.
    pub fn deploy(
        &self,
        request: &DeployRequest,
        outputs: &mut DeploymentOutputs,
    ) -> Result<DeployReport> {
        let mut report = DeployReport::start(&self.spec.name, &request.version);

        match self.run_stages(request, outputs, &mut report) {
            Ok(()) => {
                report.enter(Stage::Done);
                report.finished_at = chrono::Utc::now().to_rfc3339();
                Ok(report)
            }
            Err(err) => {
                let stage = report.current();
                report.enter(Stage::Failed);
                log_status!(
                    "deploy",
                    "{} failed during {}: {}",
                    self.spec.name,
                    stage.as_str(),
                    err
                );
                Err(err.with_hint(format!(
                    "{} deploy failed during the {} stage",
                    self.spec.name,
                    stage.as_str()
                )))
            }
        }
    }

    fn run_stages(
        &self,
        request: &DeployRequest,
        outputs: &mut DeploymentOutputs,
        report: &mut DeployReport,
    ) -> Result<()> {
        let renderer = ArtifactRenderer::new(self.registry, self.options.template_lookup);

        report.enter(Stage::Validate);
        let members = self.select_members(request)?;
        let endpoints = self.template_endpoints(members, outputs)?;
        if self.options.template_lookup == TemplateLookup::Strict {
            renderer.require(&request.version, TemplateKind::Csr)?;
            renderer.require(&request.version, TemplateKind::ServiceUnit)?;
        }

        report.enter(Stage::Clean);
        let workspace = Workspace::reset(
            &request.workspace_root,
            &self.spec.ca_folder,
            &self.spec.service_folder,
            members,
        )?;

        report.enter(Stage::Generate);
        let issuer = CertificateAuthorityIssuer::load(&request.root_ca, &self.options.signing_profile)?;
        let generate = GenerateContext {
            version: &request.version,
            endpoints: &endpoints,
            renderer: &renderer,
            issuer: &issuer,
            workspace: &workspace,
        };
        let artifacts = self
            .fan_out("generate")
            .run(members, |ctx| self.generate_node(ctx, &generate))
            .into_result()?;

        report.enter(Stage::Distribute);
        let distributor = RemoteDistributor::new(self.executor, self.pusher);
        self.fan_out("distribute")
            .run(members, |ctx| {
                ctx.checkpoint()?;
                let node_artifacts = artifacts.get(&ctx.index).ok_or_else(|| {
                    Error::internal_unexpected(format!("no artifacts generated for {}", ctx.node.ip))
                })?;
                distributor.distribute(ctx.node, node_artifacts)
            })
            .into_result()?;

        report.enter(Stage::Activate);
        let activator = ServiceActivator::new(
            self.executor,
            &self.spec.unit_file,
            self.spec.activation,
            self.options.failure_policy,
        );
        self.pre_activate(&activator, &renderer, &request.version, members, &endpoints)?;
        activator.activate(members)?;

        report.artifacts = artifacts.into_values().collect();
        if let Some(ports) = &self.spec.endpoints {
            let set = EndpointSet::for_nodes(members, members.len(), ports, &self.spec.node_name_prefix);
            outputs.publish(&self.spec.name, &self.spec.endpoints_key(), set.client_joined());
            outputs.publish(&self.spec.name, &self.spec.peer_endpoints_key(), set.peer_joined());
            log_status!("deploy", "{}: {}", self.spec.endpoints_key(), set.client_joined());
            log_status!("deploy", "{}: {}", self.spec.peer_endpoints_key(), set.peer_joined());
            report.endpoints = Some(set);
        }

        Ok(())
    }

    fn fan_out(&self, stage: &str) -> FanOut {
        FanOut::new(format!("{} {}", stage, self.spec.name), self.options.failure_policy)
    }

    /// The first `master` nodes of the pool. Checked before any I/O.
    fn select_members<'r>(&self, request: &'r DeployRequest) -> Result<&'r [Node]> {
        let pool = request.nodes.len();
        if self.spec.max_is_pool && request.master > pool {
            return Err(Error::config_excess_nodes(&self.spec.name, request.master, pool));
        }

        let count = request.master.min(pool);
        if count < self.spec.min_nodes {
            return Err(Error::config_insufficient_nodes(
                &self.spec.name,
                count,
                self.spec.min_nodes,
            ));
        }

        Ok(&request.nodes[..count])
    }

    /// The `{{endpoints}}` value shared by every member.
    fn template_endpoints(&self, members: &[Node], outputs: &DeploymentOutputs) -> Result<String> {
        match &self.spec.template_endpoints {
            TemplateEndpoints::OwnPeers => Ok(self
                .spec
                .endpoints
                .as_ref()
                .map(|ports| {
                    EndpointSet::for_nodes(members, members.len(), ports, &self.spec.node_name_prefix)
                        .peer_joined()
                })
                .unwrap_or_default()),
            TemplateEndpoints::Upstream { component, key } => outputs
                .get(component, key)
                .map(str::to_string)
                .ok_or_else(|| Error::config_missing_output(component.as_str(), key.as_str())),
        }
    }

    fn endpoint(&self, index: usize, node: &Node, endpoints: &str) -> ComponentEndpoint {
        ComponentEndpoint {
            ip: node.ip.clone(),
            name: node_name(&self.spec.node_name_prefix, index),
            endpoints: endpoints.to_string(),
        }
    }

    fn generate_node(&self, ctx: &TaskContext, generate: &GenerateContext) -> Result<NodeArtifacts> {
        let endpoint = self.endpoint(ctx.index, ctx.node, generate.endpoints);

        let csr_config = generate
            .renderer
            .render(generate.version, TemplateKind::Csr, &endpoint)?;
        let unit = generate
            .renderer
            .render(generate.version, TemplateKind::ServiceUnit, &endpoint)?;

        ctx.checkpoint()?;
        let issued = generate.issuer.issue(&csr_config)?;

        let ca_dir = generate.workspace.ca_dir(&ctx.node.ip);
        let service_dir = generate.workspace.service_dir(&ctx.node.ip);
        let contents: [(ArtifactKind, &[u8]); 5] = [
            (ArtifactKind::CsrConfig, csr_config.as_slice()),
            (ArtifactKind::Key, issued.key.as_slice()),
            (ArtifactKind::Csr, issued.csr.as_slice()),
            (ArtifactKind::Certificate, issued.certificate.as_slice()),
            (ArtifactKind::ServiceUnit, unit.as_slice()),
        ];

        let mut artifacts = Vec::with_capacity(contents.len());
        for (kind, bytes) in contents {
            let dir = match kind {
                ArtifactKind::ServiceUnit => &service_dir,
                _ => &ca_dir,
            };
            let artifact = Artifact::new(
                kind,
                dir,
                &self.spec.name,
                &self.spec.unit_file,
                &self.options.remote,
            );
            io::write_file_with_mode(
                &artifact.local_path,
                bytes,
                kind.local_mode(&self.options.permissions),
                "write artifact",
            )?;
            artifacts.push(artifact);
        }

        log_status!(
            "ca",
            "Issued {} certificate for {} (sha256 {})",
            self.spec.name,
            ctx.node.ip,
            issued.fingerprint
        );

        Ok(NodeArtifacts {
            index: ctx.index,
            ip: ctx.node.ip.clone(),
            artifacts,
            fingerprint: issued.fingerprint,
        })
    }

    fn pre_activate(
        &self,
        activator: &ServiceActivator,
        renderer: &ArtifactRenderer,
        version: &str,
        members: &[Node],
        endpoints: &str,
    ) -> Result<()> {
        if self.spec.pre_activation != PreActivation::RunOnFirstNode
            || !renderer.has_template(version, TemplateKind::PreStart)
        {
            return Ok(());
        }
        let Some(first) = members.first() else {
            return Ok(());
        };

        let script = renderer.render(version, TemplateKind::PreStart, &self.endpoint(0, first, endpoints))?;
        activator.pre_activate(first, &String::from_utf8_lossy(&script))
    }
}
