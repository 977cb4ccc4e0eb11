mod client;

pub use client::{execute_local_command, is_local_host, CommandOutput, SshClient};

use crate::defaults::SshConfig;
use crate::error::{Error, RemoteCommandFailedDetails, Result};
use crate::node::Node;
use crate::remote::{FileMapping, FilePusher, RemoteExecutor};

/// `ssh`/`scp` backed transport. Each call opens fresh connections; nothing is retried.
#[derive(Debug, Clone, Default)]
pub struct SshTransport {
    pub config: SshConfig,
}

impl SshTransport {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// Transport configured from clusterkit.json.
    pub fn load() -> Self {
        Self::new(crate::defaults::load_defaults().ssh)
    }
}

fn check(output: CommandOutput, command: String, host: &str) -> Result<()> {
    if output.success {
        return Ok(());
    }
    Err(Error::remote_command_failed(RemoteCommandFailedDetails {
        command,
        exit_code: output.exit_code,
        stdout: output.stdout,
        stderr: output.stderr,
        host: host.to_string(),
    }))
}

impl RemoteExecutor for SshTransport {
    fn run_commands(&self, node: &Node, commands: &[String]) -> Result<()> {
        let client = SshClient::for_node(node, &self.config)?;
        for command in commands {
            log_status!("ssh", "{}: {}", node.ip, command);
            check(client.execute(command), command.clone(), &node.ip)?;
        }
        Ok(())
    }
}

impl FilePusher for SshTransport {
    fn push_files(&self, node: &Node, files: &[FileMapping]) -> Result<()> {
        let client = SshClient::for_node(node, &self.config)?;
        for file in files {
            let local = file.local.to_string_lossy();
            check(
                client.copy_file(&local, &file.remote),
                format!("scp {} {}", local, file.remote),
                &node.ip,
            )?;
        }
        log_status!("ssh", "{}: pushed {} file(s)", node.ip, files.len());
        Ok(())
    }
}
