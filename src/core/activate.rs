//! Remote service activation.

use crate::error::{Error, Result};
use crate::fanout::{FanOut, FailurePolicy};
use crate::node::Node;
use crate::remote::RemoteExecutor;

/// Whether nodes start together or one after another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationMode {
    /// Quorum-forming services: members must come up roughly together.
    Parallel,
    /// Independent per-node agents.
    Serial,
}

/// Hook run before the service is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreActivation {
    None,
    /// Render the version's pre-start script and run it on the first selected node.
    RunOnFirstNode,
}

/// Reload the service manager, enable the unit, start it without blocking.
pub fn activation_commands(unit: &str) -> Vec<String> {
    vec![
        "systemctl daemon-reload".to_string(),
        format!("systemctl enable {}", unit),
        format!("systemctl start --no-block {}", unit),
    ]
}

pub struct ServiceActivator<'a> {
    executor: &'a dyn RemoteExecutor,
    unit: &'a str,
    mode: ActivationMode,
    policy: FailurePolicy,
}

impl<'a> ServiceActivator<'a> {
    pub fn new(
        executor: &'a dyn RemoteExecutor,
        unit: &'a str,
        mode: ActivationMode,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            executor,
            unit,
            mode,
            policy,
        }
    }

    /// Run a pre-start script on one node. A failure is an activation error.
    pub fn pre_activate(&self, node: &Node, script: &str) -> Result<()> {
        log_status!("deploy", "Running pre-start script on {}", node.ip);
        self.executor
            .run_commands(node, &[script.to_string()])
            .map_err(|e| Error::activation_failed(&node.ip, e))
    }

    pub fn activate(&self, nodes: &[Node]) -> Result<()> {
        let commands = activation_commands(self.unit);
        let group = FanOut::new(format!("activate {}", self.unit), self.policy);

        let report = match self.mode {
            ActivationMode::Parallel => group.run(nodes, |ctx| self.start(ctx.node, &commands)),
            ActivationMode::Serial => group.run_serial(nodes, |ctx| self.start(ctx.node, &commands)),
        };
        report.into_result().map(|_| ())
    }

    fn start(&self, node: &Node, commands: &[String]) -> Result<()> {
        self.executor
            .run_commands(node, commands)
            .map_err(|e| Error::activation_failed(&node.ip, e))?;
        log_status!("deploy", "Started {} on {}", self.unit, node.ip);
        Ok(())
    }
}
