//! Typed artifact kinds and their local/remote locations.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::defaults::{PermissionsConfig, RemoteLayout};

/// Closed set of files produced per node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    CsrConfig,
    Key,
    Csr,
    Certificate,
    ServiceUnit,
}

impl ArtifactKind {
    pub const CERTIFICATE_SET: [ArtifactKind; 4] = [
        ArtifactKind::CsrConfig,
        ArtifactKind::Key,
        ArtifactKind::Csr,
        ArtifactKind::Certificate,
    ];

    pub fn file_name(&self, component: &str, unit_file: &str) -> String {
        match self {
            ArtifactKind::CsrConfig => format!("{}-csr.json", component),
            ArtifactKind::Key => format!("{}-key.pem", component),
            ArtifactKind::Csr => format!("{}.csr", component),
            ArtifactKind::Certificate => format!("{}.pem", component),
            ArtifactKind::ServiceUnit => unit_file.to_string(),
        }
    }

    /// Unit files go to the service manager's directory; everything else to
    /// `<config_root>/<component>/ssl/`.
    pub fn remote_dir(&self, component: &str, layout: &RemoteLayout) -> String {
        match self {
            ArtifactKind::ServiceUnit => layout.systemd_dir.trim_end_matches('/').to_string(),
            _ => format!(
                "{}/{}/ssl",
                layout.config_root.trim_end_matches('/'),
                component
            ),
        }
    }

    pub fn remote_path(&self, component: &str, unit_file: &str, layout: &RemoteLayout) -> String {
        format!(
            "{}/{}",
            self.remote_dir(component, layout),
            self.file_name(component, unit_file)
        )
    }

    pub fn local_mode(&self, permissions: &PermissionsConfig) -> u32 {
        match self {
            ArtifactKind::ServiceUnit => permissions.unit_file_mode,
            _ => permissions.cert_file_mode,
        }
    }
}

/// One generated file with its local and remote locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub local_path: PathBuf,
    pub remote_path: String,
}

impl Artifact {
    pub fn new(
        kind: ArtifactKind,
        local_dir: &Path,
        component: &str,
        unit_file: &str,
        layout: &RemoteLayout,
    ) -> Self {
        let file_name = kind.file_name(component, unit_file);
        Self {
            kind,
            local_path: local_dir.join(&file_name),
            remote_path: kind.remote_path(component, unit_file, layout),
        }
    }

    pub fn remote_dir(&self) -> &str {
        self.remote_path
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or(".")
    }
}

/// The full artifact set generated for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeArtifacts {
    pub index: usize,
    pub ip: String,
    pub artifacts: Vec<Artifact>,
    /// SHA-256 fingerprint of the node's certificate.
    pub fingerprint: String,
}

impl NodeArtifacts {
    pub fn get(&self, kind: ArtifactKind) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }

    /// Distinct remote directories, in first-seen order.
    pub fn remote_dirs(&self) -> Vec<String> {
        let mut dirs: Vec<String> = Vec::new();
        for artifact in &self.artifacts {
            let dir = artifact.remote_dir();
            if !dirs.iter().any(|d| d == dir) {
                dirs.push(dir.to_string());
            }
        }
        dirs
    }
}
