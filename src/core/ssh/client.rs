use crate::defaults::SshConfig;
use crate::error::{Error, Result};
use crate::node::Node;
use std::path::Path;
use std::process::Command;

pub struct SshClient {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub identity_file: Option<String>,
    pub connect_timeout: u32,
    pub scp_flags: Vec<String>,
    /// When true, commands run locally and copies are plain file copies.
    /// Set automatically when the node address is localhost/127.0.0.1/::1.
    pub is_local: bool,
}

pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl SshClient {
    pub fn for_node(node: &Node, config: &SshConfig) -> Result<Self> {
        let identity_file = if node.ssh_key.is_empty() {
            None
        } else {
            let expanded = shellexpand::tilde(&node.ssh_key).to_string();
            if !Path::new(&expanded).exists() {
                return Err(Error::ssh_identity_file_not_found(node.ip.clone(), expanded));
            }
            Some(expanded)
        };

        let is_local = is_local_host(&node.ip);
        if is_local {
            log_status!("ssh", "Node {} is localhost, using local execution", node.ip);
        }

        Ok(Self {
            host: node.ip.clone(),
            user: node.ssh_user.clone(),
            port: config.port,
            identity_file,
            connect_timeout: config.connect_timeout,
            scp_flags: config.scp_flags.clone(),
            is_local,
        })
    }

    /// Options shared by ssh and scp: identity, batch mode and keepalives.
    fn common_options(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }

        args.extend([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout),
            "-o".to_string(),
            "ServerAliveInterval=15".to_string(),
            "-o".to_string(),
            "ServerAliveCountMax=3".to_string(),
        ]);

        args
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    pub(crate) fn build_ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = self.common_options();

        if self.port != 22 {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }

        args.push(self.destination());
        args.push(command.to_string());
        args
    }

    pub(crate) fn build_scp_args(&self, local_path: &str, remote_path: &str) -> Vec<String> {
        let mut args = self.scp_flags.clone();
        args.extend(self.common_options());

        // scp spells the port flag in upper case.
        if self.port != 22 {
            args.push("-P".to_string());
            args.push(self.port.to_string());
        }

        args.push(local_path.to_string());
        args.push(format!("{}:{}", self.destination(), remote_path));
        args
    }

    pub fn execute(&self, command: &str) -> CommandOutput {
        if self.is_local {
            return execute_local_command(command);
        }
        run(Command::new("ssh").args(self.build_ssh_args(command)), "SSH")
    }

    pub fn copy_file(&self, local_path: &str, remote_path: &str) -> CommandOutput {
        if self.is_local {
            return match std::fs::copy(local_path, remote_path) {
                Ok(_) => CommandOutput {
                    stdout: String::new(),
                    stderr: String::new(),
                    success: true,
                    exit_code: 0,
                },
                Err(e) => CommandOutput {
                    stdout: String::new(),
                    stderr: format!("Copy error: {}", e),
                    success: false,
                    exit_code: -1,
                },
            };
        }
        run(
            Command::new("scp").args(self.build_scp_args(local_path, remote_path)),
            "SCP",
        )
    }
}

fn run(cmd: &mut Command, label: &str) -> CommandOutput {
    match cmd.output() {
        Ok(out) => CommandOutput {
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
            success: out.status.success(),
            exit_code: out.status.code().unwrap_or(-1),
        },
        Err(e) => CommandOutput {
            stdout: String::new(),
            stderr: format!("{} error: {}", label, e),
            success: false,
            exit_code: -1,
        },
    }
}

pub fn execute_local_command(command: &str) -> CommandOutput {
    #[cfg(windows)]
    let mut cmd = {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    };

    #[cfg(not(windows))]
    let mut cmd = {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    };

    run(&mut cmd, "Command")
}

/// Check if a host address refers to the local machine.
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(port: u16, identity_file: Option<&str>) -> SshClient {
        SshClient {
            host: "10.0.0.1".to_string(),
            user: "root".to_string(),
            port,
            identity_file: identity_file.map(String::from),
            connect_timeout: 7,
            scp_flags: vec!["-O".to_string()],
            is_local: false,
        }
    }

    #[test]
    fn ssh_args_run_in_batch_mode() {
        let args = client(22, Some("/keys/id")).build_ssh_args("systemctl daemon-reload");

        assert_eq!(&args[..2], &["-i".to_string(), "/keys/id".to_string()]);
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"ConnectTimeout=7".to_string()));
        assert!(!args.contains(&"-p".to_string()));
        assert_eq!(args[args.len() - 2], "root@10.0.0.1");
        assert_eq!(args[args.len() - 1], "systemctl daemon-reload");
    }

    #[test]
    fn non_default_port_is_passed() {
        let ssh = client(2222, None).build_ssh_args("true");
        let pos = ssh.iter().position(|a| a == "-p").unwrap();
        assert_eq!(ssh[pos + 1], "2222");

        let scp = client(2222, None).build_scp_args("/a", "/b");
        let pos = scp.iter().position(|a| a == "-P").unwrap();
        assert_eq!(scp[pos + 1], "2222");
    }

    #[test]
    fn scp_args_target_remote_path() {
        let args = client(22, None).build_scp_args("/work/etcd.pem", "/etc/etcd/ssl/etcd.pem");
        assert_eq!(args[0], "-O");
        assert_eq!(args[args.len() - 2], "/work/etcd.pem");
        assert_eq!(args[args.len() - 1], "root@10.0.0.1:/etc/etcd/ssl/etcd.pem");
    }

    #[test]
    fn missing_identity_file_is_rejected() {
        let node = Node::new("10.0.0.1", "root", "/nonexistent/clusterkit/id_rsa");
        let err = SshClient::for_node(&node, &SshConfig::default()).err().unwrap();
        assert_eq!(err.code.as_str(), "ssh.identity_file_not_found");
    }

    #[test]
    fn detects_local_hosts() {
        assert!(is_local_host("127.0.0.1"));
        assert!(is_local_host("localhost"));
        assert!(!is_local_host("10.0.0.1"));
    }
}
