#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use clusterkit::remote::{FileMapping, FilePusher, RemoteExecutor};
use clusterkit::template::{StaticTemplates, TemplateKind};
use clusterkit::{Error, Node, Result, RootCa};
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair, KeyUsagePurpose};

pub const SIGNING_CONFIG: &str = r#"{
  "signing": {
    "default": {"expiry": "8760h"},
    "profiles": {
      "kubernetes": {
        "usages": ["signing", "key encipherment", "server auth", "client auth"],
        "expiry": "8760h"
      }
    }
  }
}"#;

/// In-memory stand-in for the ssh/scp channel.
#[derive(Default)]
pub struct RecordingTransport {
    pub commands: Mutex<Vec<(String, String)>>,
    pub pushes: Mutex<Vec<(String, FileMapping)>>,
    pub fail_push_on: Option<String>,
    pub fail_command_containing: Option<String>,
}

impl RecordingTransport {
    pub fn failing_push_on(ip: &str) -> Self {
        Self {
            fail_push_on: Some(ip.to_string()),
            ..Default::default()
        }
    }

    pub fn failing_command(fragment: &str) -> Self {
        Self {
            fail_command_containing: Some(fragment.to_string()),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.commands.lock().unwrap().len() + self.pushes.lock().unwrap().len()
    }

    pub fn commands_for(&self, ip: &str) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|(host, _)| host == ip)
            .map(|(_, command)| command.clone())
            .collect()
    }

    pub fn pushes_for(&self, ip: &str) -> Vec<FileMapping> {
        self.pushes
            .lock()
            .unwrap()
            .iter()
            .filter(|(host, _)| host == ip)
            .map(|(_, mapping)| mapping.clone())
            .collect()
    }

    /// Hosts that ran `command`, in the order they ran it.
    pub fn hosts_running(&self, command: &str) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c)| c == command)
            .map(|(host, _)| host.clone())
            .collect()
    }
}

impl RemoteExecutor for RecordingTransport {
    fn run_commands(&self, node: &Node, commands: &[String]) -> Result<()> {
        for command in commands {
            self.commands
                .lock()
                .unwrap()
                .push((node.ip.clone(), command.clone()));
            if let Some(fragment) = &self.fail_command_containing {
                if command.contains(fragment.as_str()) {
                    return Err(Error::internal_unexpected(format!("{} failed", command)));
                }
            }
        }
        Ok(())
    }
}

impl FilePusher for RecordingTransport {
    fn push_files(&self, node: &Node, files: &[FileMapping]) -> Result<()> {
        if self.fail_push_on.as_deref() == Some(node.ip.as_str()) {
            return Err(Error::internal_unexpected("connection reset by peer"));
        }
        let mut pushes = self.pushes.lock().unwrap();
        for file in files {
            assert!(file.local.exists(), "pushed file missing: {}", file.local.display());
            pushes.push((node.ip.clone(), file.clone()));
        }
        Ok(())
    }
}

pub fn nodes(count: usize) -> Vec<Node> {
    (1..=count)
        .map(|i| Node::new(format!("10.0.0.{}", i), "root", ""))
        .collect()
}

/// Write a fresh root CA triple under `<root>/ca/root/`.
pub fn write_root_ca(root: &Path) -> RootCa {
    let ca = RootCa::in_workspace(root);
    fs::create_dir_all(ca.cert_path.parent().unwrap()).unwrap();

    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.distinguished_name.push(DnType::CommonName, "clusterkit test root");
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    let key = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key).unwrap();

    fs::write(&ca.cert_path, cert.pem()).unwrap();
    fs::write(&ca.key_path, key.serialize_pem()).unwrap();
    fs::write(&ca.config_path, SIGNING_CONFIG).unwrap();
    ca
}

/// Minimal coordination-store templates registered under `v1`.
pub fn v1_templates() -> StaticTemplates {
    StaticTemplates::new()
        .with(
            "v1",
            TemplateKind::Csr,
            r#"{"CN": "etcd", "hosts": ["127.0.0.1", "{{ip}}"], "key": {"algo": "ecdsa", "size": 256}}"#,
        )
        .with(
            "v1",
            TemplateKind::ServiceUnit,
            "ExecStart=/usr/local/bin/etcd --name={{name}} --initial-cluster={{endpoints}}\n",
        )
}
