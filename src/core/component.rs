//! Per-component deployment configuration.
//!
//! The coordination store and the overlay agent run the same pipeline; they
//! differ only in the values held here.

use crate::activate::{ActivationMode, PreActivation};
use crate::outputs::EndpointPorts;

/// Where a component's `{{endpoints}}` template value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateEndpoints {
    /// The component's own peer list (`name=url,...`).
    OwnPeers,
    /// An output published by an earlier component.
    Upstream {
        component: String,
        key: String,
    },
}

#[derive(Debug, Clone)]
pub struct ComponentSpec {
    /// Lowercase component name; keys outputs and names remote directories.
    pub name: String,
    /// Prefix of the published output keys, e.g. `Etcd` in `EtcdEndpoints`.
    pub display_name: String,
    pub unit_file: String,
    pub ca_folder: String,
    pub service_folder: String,
    pub node_name_prefix: String,
    pub min_nodes: usize,
    /// Reject a member count larger than the node pool instead of truncating.
    pub max_is_pool: bool,
    pub endpoints: Option<EndpointPorts>,
    pub template_endpoints: TemplateEndpoints,
    pub pre_activation: PreActivation,
    pub activation: ActivationMode,
}

impl ComponentSpec {
    /// Quorum-based key-value store: at least two members, started together.
    pub fn coordination_store() -> Self {
        Self {
            name: "etcd".to_string(),
            display_name: "Etcd".to_string(),
            unit_file: "etcd.service".to_string(),
            ca_folder: "etcd".to_string(),
            service_folder: "etcd".to_string(),
            node_name_prefix: "etcd".to_string(),
            min_nodes: 2,
            max_is_pool: true,
            endpoints: Some(EndpointPorts {
                scheme: "https",
                client_port: 2379,
                peer_port: 2380,
            }),
            template_endpoints: TemplateEndpoints::OwnPeers,
            pre_activation: PreActivation::None,
            activation: ActivationMode::Parallel,
        }
    }

    /// Per-node overlay network agent that discovers peers through the store.
    pub fn overlay_agent() -> Self {
        Self {
            name: "flanneld".to_string(),
            display_name: "Flanneld".to_string(),
            unit_file: "flanneld.service".to_string(),
            ca_folder: "flanneld".to_string(),
            service_folder: "flanneld".to_string(),
            node_name_prefix: "flanneld".to_string(),
            min_nodes: 1,
            max_is_pool: true,
            endpoints: None,
            template_endpoints: TemplateEndpoints::Upstream {
                component: "etcd".to_string(),
                key: "EtcdEndpoints".to_string(),
            },
            pre_activation: PreActivation::RunOnFirstNode,
            activation: ActivationMode::Serial,
        }
    }

    pub fn endpoints_key(&self) -> String {
        format!("{}Endpoints", self.display_name)
    }

    pub fn peer_endpoints_key(&self) -> String {
        format!("{}PeerEndpoints", self.display_name)
    }
}
