use crate::artifact::NodeArtifacts;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::remote::{FileMapping, FilePusher, RemoteExecutor};
use crate::utils::shell;

/// Pushes one node's artifact set to its remote destinations.
pub struct RemoteDistributor<'a> {
    executor: &'a dyn RemoteExecutor,
    pusher: &'a dyn FilePusher,
}

impl<'a> RemoteDistributor<'a> {
    pub fn new(executor: &'a dyn RemoteExecutor, pusher: &'a dyn FilePusher) -> Self {
        Self { executor, pusher }
    }

    /// Create every remote parent directory, then push all files.
    pub fn distribute(&self, node: &Node, artifacts: &NodeArtifacts) -> Result<()> {
        let dirs = artifacts.remote_dirs();
        if !dirs.is_empty() {
            self.executor
                .run_commands(node, &[shell::mkdir_p(&dirs)])
                .map_err(|e| Error::distribution_failed(&node.ip, e))?;
        }

        let mappings = mappings(artifacts);
        self.pusher
            .push_files(node, &mappings)
            .map_err(|e| Error::distribution_failed(&node.ip, e))?;

        log_status!(
            "deploy",
            "Distributed {} file(s) to {}",
            mappings.len(),
            node.ip
        );
        Ok(())
    }
}

pub fn mappings(artifacts: &NodeArtifacts) -> Vec<FileMapping> {
    artifacts
        .artifacts
        .iter()
        .map(|a| FileMapping {
            local: a.local_path.clone(),
            remote: a.remote_path.clone(),
        })
        .collect()
}
