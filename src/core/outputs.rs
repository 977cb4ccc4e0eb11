//! Endpoint publication and the shared deployment-output map.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::node::Node;

/// Scheme and ports a component exposes to clients and peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPorts {
    pub scheme: &'static str,
    pub client_port: u16,
    pub peer_port: u16,
}

/// Client and peer endpoints of the nodes chosen as a component's members.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EndpointSet {
    pub client: Vec<String>,
    pub peer: Vec<String>,
}

impl EndpointSet {
    /// Build endpoints from the first `master` nodes, in node-index order.
    ///
    /// Selection is plain truncation of the node list, not an election.
    pub fn for_nodes(nodes: &[Node], master: usize, ports: &EndpointPorts, name_prefix: &str) -> Self {
        let mut set = EndpointSet::default();
        for (i, node) in nodes.iter().take(master).enumerate() {
            set.client.push(format!(
                "{}://{}:{}",
                ports.scheme, node.ip, ports.client_port
            ));
            set.peer.push(format!(
                "{}={}://{}:{}",
                node_name(name_prefix, i),
                ports.scheme,
                node.ip,
                ports.peer_port
            ));
        }
        set
    }

    pub fn client_joined(&self) -> String {
        self.client.join(",")
    }

    pub fn peer_joined(&self) -> String {
        self.peer.join(",")
    }

    pub fn len(&self) -> usize {
        self.client.len()
    }

    pub fn is_empty(&self) -> bool {
        self.client.is_empty()
    }
}

/// Logical member name of the node at `index`, e.g. `etcd-node-0`.
pub fn node_name(prefix: &str, index: usize) -> String {
    format!("{}-node-{}", prefix, index)
}

/// Named string outputs published by deployed components, keyed by component name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeploymentOutputs {
    components: BTreeMap<String, BTreeMap<String, String>>,
}

impl DeploymentOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, component: &str, key: &str, value: impl Into<String>) {
        self.components
            .entry(component.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    pub fn get(&self, component: &str, key: &str) -> Option<&str> {
        self.components
            .get(component)
            .and_then(|outputs| outputs.get(key))
            .map(String::as_str)
    }

    pub fn component(&self, component: &str) -> Option<&BTreeMap<String, String>> {
        self.components.get(component)
    }
}
