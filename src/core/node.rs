use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A provisioning target. Immutable for the duration of one component deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub ip: String,
    pub ssh_user: String,
    /// Private key file used to reach the node; `~` is expanded by the transport.
    pub ssh_key: String,
}

impl Node {
    pub fn new(ip: impl Into<String>, ssh_user: impl Into<String>, ssh_key: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ssh_user: ssh_user.into(),
            ssh_key: ssh_key.into(),
        }
    }
}

/// Root certificate authority files. Read-only input owned by the surrounding deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootCa {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub config_path: PathBuf,
}

impl RootCa {
    pub const FOLDER: &'static str = "root";
    pub const CERT_FILE: &'static str = "ca.pem";
    pub const KEY_FILE: &'static str = "ca-key.pem";
    pub const CONFIG_FILE: &'static str = "ca-config.json";

    /// The root CA as laid out inside a deployment workspace: `<root>/ca/root/`.
    pub fn in_workspace(root: &Path) -> Self {
        let base = root.join(crate::workspace::CA_FOLDER).join(Self::FOLDER);
        Self {
            cert_path: base.join(Self::CERT_FILE),
            key_path: base.join(Self::KEY_FILE),
            config_path: base.join(Self::CONFIG_FILE),
        }
    }
}
