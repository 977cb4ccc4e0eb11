//! Seams to the remote execution channel.

use serde::Serialize;
use std::path::PathBuf;

use crate::error::Result;
use crate::node::Node;

/// One local file and where it lands on the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMapping {
    pub local: PathBuf,
    pub remote: String,
}

/// Runs an ordered list of shell commands on a node, stopping at the first failure.
pub trait RemoteExecutor: Sync {
    fn run_commands(&self, node: &Node, commands: &[String]) -> Result<()>;
}

/// Copies local files to a node in one blocking call.
pub trait FilePusher: Sync {
    fn push_files(&self, node: &Node, files: &[FileMapping]) -> Result<()>;
}
