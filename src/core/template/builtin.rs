//! Templates shipped for the pinned coordination-store and overlay-agent versions.

use super::{TemplateKind, TemplateRegistry};

pub const ETCD_VERSION: &str = "etcd-3.2.8";
pub const FLANNELD_VERSION: &str = "flanneld-0.9.0";

/// Built-in template table.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTemplates;

impl TemplateRegistry for BuiltinTemplates {
    fn lookup(&self, version: &str, kind: TemplateKind) -> Option<&str> {
        let text = match (version, kind) {
            (ETCD_VERSION, TemplateKind::Csr) => ETCD_CSR,
            (ETCD_VERSION, TemplateKind::ServiceUnit) => ETCD_UNIT,
            (FLANNELD_VERSION, TemplateKind::Csr) => FLANNELD_CSR,
            (FLANNELD_VERSION, TemplateKind::ServiceUnit) => FLANNELD_UNIT,
            (FLANNELD_VERSION, TemplateKind::PreStart) => FLANNELD_PRE_START,
            _ => return None,
        };
        Some(text)
    }
}

const ETCD_CSR: &str = r#"{
  "CN": "etcd",
  "hosts": [
    "127.0.0.1",
    "{{ip}}"
  ],
  "key": {
    "algo": "ecdsa",
    "size": 256
  },
  "names": [
    {
      "C": "CN",
      "ST": "BeiJing",
      "L": "BeiJing",
      "O": "k8s",
      "OU": "System"
    }
  ]
}
"#;

const ETCD_UNIT: &str = r#"[Unit]
Description=Etcd Server
After=network.target
After=network-online.target
Wants=network-online.target
Documentation=https://github.com/coreos

[Service]
Type=notify
WorkingDirectory=/var/lib/etcd/
ExecStartPre=/usr/bin/mkdir -p /var/lib/etcd
ExecStart=/usr/local/bin/etcd \
  --name={{name}} \
  --cert-file=/etc/etcd/ssl/etcd.pem \
  --key-file=/etc/etcd/ssl/etcd-key.pem \
  --peer-cert-file=/etc/etcd/ssl/etcd.pem \
  --peer-key-file=/etc/etcd/ssl/etcd-key.pem \
  --trusted-ca-file=/etc/kubernetes/ssl/ca.pem \
  --peer-trusted-ca-file=/etc/kubernetes/ssl/ca.pem \
  --initial-advertise-peer-urls=https://{{ip}}:2380 \
  --listen-peer-urls=https://{{ip}}:2380 \
  --listen-client-urls=https://{{ip}}:2379,http://127.0.0.1:2379 \
  --advertise-client-urls=https://{{ip}}:2379 \
  --initial-cluster-token=etcd-cluster-0 \
  --initial-cluster={{endpoints}} \
  --initial-cluster-state=new \
  --data-dir=/var/lib/etcd
Restart=on-failure
RestartSec=5
LimitNOFILE=65536

[Install]
WantedBy=multi-user.target
"#;

const FLANNELD_CSR: &str = r#"{
  "CN": "flanneld",
  "hosts": [],
  "key": {
    "algo": "ecdsa",
    "size": 256
  },
  "names": [
    {
      "C": "CN",
      "ST": "BeiJing",
      "L": "BeiJing",
      "O": "k8s",
      "OU": "System"
    }
  ]
}
"#;

const FLANNELD_UNIT: &str = r#"[Unit]
Description=Flanneld overlay address etcd agent
After=network.target
After=network-online.target
Wants=network-online.target
After=etcd.service
Before=docker.service

[Service]
Type=notify
ExecStart=/usr/local/bin/flanneld \
  -etcd-cafile=/etc/kubernetes/ssl/ca.pem \
  -etcd-certfile=/etc/flanneld/ssl/flanneld.pem \
  -etcd-keyfile=/etc/flanneld/ssl/flanneld-key.pem \
  -etcd-endpoints={{endpoints}} \
  -etcd-prefix=/kubernetes/network \
  -public-ip={{ip}}
ExecStartPost=/usr/local/bin/mk-docker-opts.sh -k DOCKER_NETWORK_OPTIONS -d /run/flannel/docker
Restart=on-failure

[Install]
WantedBy=multi-user.target
RequiredBy=docker.service
"#;

const FLANNELD_PRE_START: &str = r#"/usr/local/bin/etcdctl --endpoints={{endpoints}} --ca-file=/etc/kubernetes/ssl/ca.pem --cert-file=/etc/flanneld/ssl/flanneld.pem --key-file=/etc/flanneld/ssl/flanneld-key.pem set /kubernetes/network/config '{"Network":"172.30.0.0/16", "SubnetLen": 24, "Backend": {"Type": "vxlan"}}'"#;
