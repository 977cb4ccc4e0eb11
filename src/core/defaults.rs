use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::fanout::FailurePolicy;
use crate::paths;
use crate::template::TemplateLookup;

/// Root configuration structure for clusterkit.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClusterkitConfig {
    #[serde(default)]
    pub defaults: Defaults,
}

/// All configurable defaults that can be overridden via clusterkit.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default = "default_signing_profile")]
    pub signing_profile: String,

    #[serde(default)]
    pub template_lookup: TemplateLookup,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    #[serde(default = "default_ssh")]
    pub ssh: SshConfig,

    #[serde(default = "default_remote")]
    pub remote: RemoteLayout,

    #[serde(default = "default_permissions")]
    pub permissions: PermissionsConfig,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            signing_profile: default_signing_profile(),
            template_lookup: TemplateLookup::default(),
            failure_policy: FailurePolicy::default(),
            ssh: default_ssh(),
            remote: default_remote(),
            permissions: default_permissions(),
        }
    }
}

/// Configuration for the ssh/scp transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u32,

    #[serde(default = "default_scp_flags")]
    pub scp_flags: Vec<String>,
}

/// Where artifacts land on the node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteLayout {
    #[serde(default = "default_systemd_dir")]
    pub systemd_dir: String,

    /// Parent of each component's config directory; certs go to
    /// `<config_root>/<component>/ssl/`.
    #[serde(default = "default_config_root")]
    pub config_root: String,
}

/// Local modes applied to generated files before transfer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionsConfig {
    #[serde(default = "default_cert_file_mode")]
    pub cert_file_mode: u32,

    #[serde(default = "default_unit_file_mode")]
    pub unit_file_mode: u32,
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_signing_profile() -> String {
    "kubernetes".to_string()
}

fn default_ssh() -> SshConfig {
    SshConfig {
        port: default_ssh_port(),
        connect_timeout: default_connect_timeout(),
        scp_flags: default_scp_flags(),
    }
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u32 {
    10
}

fn default_scp_flags() -> Vec<String> {
    vec!["-O".to_string()]
}

fn default_remote() -> RemoteLayout {
    RemoteLayout {
        systemd_dir: default_systemd_dir(),
        config_root: default_config_root(),
    }
}

fn default_systemd_dir() -> String {
    "/etc/systemd/system".to_string()
}

fn default_config_root() -> String {
    "/etc".to_string()
}

fn default_permissions() -> PermissionsConfig {
    PermissionsConfig {
        cert_file_mode: default_cert_file_mode(),
        unit_file_mode: default_unit_file_mode(),
    }
}

fn default_cert_file_mode() -> u32 {
    0o600
}

fn default_unit_file_mode() -> u32 {
    0o700
}

impl Default for RemoteLayout {
    fn default() -> Self {
        default_remote()
    }
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        default_permissions()
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        default_ssh()
    }
}

// =============================================================================
// Loading functions
// =============================================================================

/// Load defaults, merging file config with built-in defaults.
/// If clusterkit.json is missing or invalid, silently returns built-in defaults.
pub fn load_defaults() -> Defaults {
    load_config().defaults
}

/// Load the full clusterkit.json config, falling back to defaults on any error.
pub fn load_config() -> ClusterkitConfig {
    paths::clusterkit_json()
        .and_then(|path| load_config_from(&path))
        .unwrap_or_default()
}

fn load_config_from(path: &Path) -> crate::Result<ClusterkitConfig> {
    if !path.exists() {
        return Err(crate::Error::other("clusterkit.json not found"));
    }

    let content = fs::read_to_string(path).map_err(|e| {
        crate::Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    parse_config(&content)
}

/// Parse a clusterkit.json document.
pub fn parse_config(content: &str) -> crate::Result<ClusterkitConfig> {
    serde_json::from_str(content).map_err(|e| {
        crate::Error::config_invalid_json(e, Some("parse clusterkit.json".to_string()))
    })
}

/// Save config to clusterkit.json file (creates if missing).
pub fn save_config(config: &ClusterkitConfig) -> crate::Result<()> {
    save_config_to(&paths::clusterkit_json()?, config)
}

fn save_config_to(path: &Path, config: &ClusterkitConfig) -> crate::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            crate::Error::internal_io(e.to_string(), Some(format!("create {}", parent.display())))
        })?;
    }

    let content = serde_json::to_string_pretty(config).map_err(|e| {
        crate::Error::internal_json(e.to_string(), Some("serialize clusterkit.json".to_string()))
    })?;

    fs::write(path, content).map_err(|e| {
        crate::Error::internal_io(e.to_string(), Some(format!("write {}", path.display())))
    })
}

/// Delete clusterkit.json file (reset to defaults)
pub fn reset_config() -> crate::Result<bool> {
    reset_config_at(&paths::clusterkit_json()?)
}

fn reset_config_at(path: &Path) -> crate::Result<bool> {
    if !path.exists() {
        return Ok(false);
    }

    fs::remove_file(path).map_err(|e| {
        crate::Error::internal_io(e.to_string(), Some(format!("delete {}", path.display())))
    })?;
    Ok(true)
}
