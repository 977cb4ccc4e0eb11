//! Local per-node artifact directories.
//!
//! Layout under the workspace root:
//!
//! ```text
//! <root>/ca/root/{ca.pem,ca-key.pem,ca-config.json}
//! <root>/ca/<component>/<ip>/        certificate material
//! <root>/service/<component>/<ip>/   unit files
//! ```

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::node::Node;
use crate::utils::io;

pub const CA_FOLDER: &str = "ca";
pub const SERVICE_FOLDER: &str = "service";

/// Freshly reset directories for one component run.
#[derive(Debug, Clone)]
pub struct Workspace {
    ca_root: PathBuf,
    service_root: PathBuf,
}

impl Workspace {
    /// Remove `<root>/ca/<ca_folder>` and `<root>/service/<service_folder>`,
    /// then recreate one empty directory per node under each.
    pub fn reset(root: &Path, ca_folder: &str, service_folder: &str, nodes: &[Node]) -> Result<Self> {
        let workspace = Self {
            ca_root: root.join(CA_FOLDER).join(ca_folder),
            service_root: root.join(SERVICE_FOLDER).join(service_folder),
        };

        io::remove_dir_if_exists(&workspace.ca_root, "clean certificate workspace")?;
        io::remove_dir_if_exists(&workspace.service_root, "clean service workspace")?;

        for node in nodes {
            io::create_dir_all(&workspace.ca_dir(&node.ip), "create certificate workspace")?;
            io::create_dir_all(&workspace.service_dir(&node.ip), "create service workspace")?;
        }

        log_status!(
            "workspace",
            "Reset {} and {} for {} node(s)",
            workspace.ca_root.display(),
            workspace.service_root.display(),
            nodes.len()
        );

        Ok(workspace)
    }

    pub fn ca_dir(&self, ip: &str) -> PathBuf {
        self.ca_root.join(ip)
    }

    pub fn service_dir(&self, ip: &str) -> PathBuf {
        self.service_root.join(ip)
    }
}
