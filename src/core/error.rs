use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInsufficientNodes,
    ConfigExcessNodes,
    ConfigMissingOutput,
    ConfigInvalidValue,
    ConfigInvalidJson,

    TemplateUnknownVersion,

    CertRequestInvalid,
    CertSigningFailed,

    SshIdentityFileNotFound,
    RemoteCommandFailed,

    DeployDistributionFailed,
    DeployActivationFailed,

    TaskCancelled,
    TaskPanicked,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInsufficientNodes => "config.insufficient_nodes",
            ErrorCode::ConfigExcessNodes => "config.excess_nodes",
            ErrorCode::ConfigMissingOutput => "config.missing_output",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",
            ErrorCode::ConfigInvalidJson => "config.invalid_json",

            ErrorCode::TemplateUnknownVersion => "template.unknown_version",

            ErrorCode::CertRequestInvalid => "cert.request_invalid",
            ErrorCode::CertSigningFailed => "cert.signing_failed",

            ErrorCode::SshIdentityFileNotFound => "ssh.identity_file_not_found",
            ErrorCode::RemoteCommandFailed => "remote.command_failed",

            ErrorCode::DeployDistributionFailed => "deploy.distribution_failed",
            ErrorCode::DeployActivationFailed => "deploy.activation_failed",

            ErrorCode::TaskCancelled => "task.cancelled",
            ErrorCode::TaskPanicked => "task.panicked",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }

    /// Configuration errors are raised before any filesystem or network I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ErrorCode::ConfigInsufficientNodes
                | ErrorCode::ConfigExcessNodes
                | ErrorCode::ConfigMissingOutput
                | ErrorCode::ConfigInvalidValue
                | ErrorCode::ConfigInvalidJson
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCountDetails {
    pub component: String,
    pub requested: usize,
    pub limit: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingOutputDetails {
    pub component: String,
    pub key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnknownVersionDetails {
    pub version: String,
    pub template: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateErrorDetails {
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub host: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStageFailureDetails {
    pub host: String,
    pub stage: String,
    pub cause_code: String,
    pub cause: String,
    pub cause_details: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetails {
    pub task: String,
    pub index: usize,
    pub host: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn config_insufficient_nodes(
        component: impl Into<String>,
        requested: usize,
        minimum: usize,
    ) -> Self {
        let component = component.into();
        let message = format!(
            "{} needs at least {} nodes, got {}",
            component, minimum, requested
        );
        Self::new(
            ErrorCode::ConfigInsufficientNodes,
            message,
            to_details(NodeCountDetails {
                component,
                requested,
                limit: minimum,
            }),
        )
        .with_retryable(false)
        .with_hint("Add nodes to the deployment or lower the master count")
    }

    pub fn config_excess_nodes(component: impl Into<String>, requested: usize, pool: usize) -> Self {
        let component = component.into();
        let message = format!(
            "deploy {} nodes more than {} available",
            component, pool
        );
        Self::new(
            ErrorCode::ConfigExcessNodes,
            message,
            to_details(NodeCountDetails {
                component,
                requested,
                limit: pool,
            }),
        )
        .with_retryable(false)
    }

    pub fn config_missing_output(component: impl Into<String>, key: impl Into<String>) -> Self {
        let component = component.into();
        let key = key.into();
        let message = format!("Output '{}' of component '{}' is not published", key, component);
        Self::new(
            ErrorCode::ConfigMissingOutput,
            message,
            to_details(MissingOutputDetails { component, key }),
        )
        .with_retryable(false)
        .with_hint("Deploy the upstream component first")
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = to_details(ConfigInvalidValueDetails {
            key: key.into(),
            value,
            problem: problem.into(),
        });

        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            details,
        )
        .with_retryable(false)
    }

    pub fn config_invalid_json(err: serde_json::Error, context: Option<String>) -> Self {
        let details = serde_json::json!({
            "error": err.to_string(),
            "context": context,
        });

        Self::new(ErrorCode::ConfigInvalidJson, "Invalid JSON in configuration", details)
            .with_retryable(false)
    }

    pub fn template_unknown_version(version: impl Into<String>, template: impl Into<String>) -> Self {
        let version = version.into();
        let template = template.into();
        let message = format!("No {} template for version '{}'", template, version);
        Self::new(
            ErrorCode::TemplateUnknownVersion,
            message,
            to_details(UnknownVersionDetails { version, template }),
        )
        .with_retryable(false)
    }

    pub fn cert_request_invalid(problem: impl Into<String>) -> Self {
        let problem = problem.into();
        Self::new(
            ErrorCode::CertRequestInvalid,
            format!("Invalid certificate signing request: {}", problem),
            to_details(CertificateErrorDetails {
                problem,
                path: None,
            }),
        )
        .with_retryable(false)
    }

    pub fn cert_signing_failed(problem: impl Into<String>, path: Option<String>) -> Self {
        let problem = problem.into();
        Self::new(
            ErrorCode::CertSigningFailed,
            format!("Certificate signing failed: {}", problem),
            to_details(CertificateErrorDetails { problem, path }),
        )
        .with_retryable(false)
    }

    pub fn ssh_identity_file_not_found(host: impl Into<String>, identity_file: impl Into<String>) -> Self {
        let details = serde_json::json!({
            "host": host.into(),
            "identityFile": identity_file.into(),
        });

        Self::new(
            ErrorCode::SshIdentityFileNotFound,
            "SSH identity file not found",
            details,
        )
        .with_retryable(false)
    }

    pub fn remote_command_failed(details: RemoteCommandFailedDetails) -> Self {
        let message = format!(
            "Remote command failed on {} (exit {}): {}",
            details.host, details.exit_code, details.command
        );
        Self::new(ErrorCode::RemoteCommandFailed, message, to_details(details)).with_retryable(true)
    }

    pub fn distribution_failed(host: impl Into<String>, cause: Error) -> Self {
        Self::node_stage_failure(ErrorCode::DeployDistributionFailed, "distribute", host, cause)
    }

    pub fn activation_failed(host: impl Into<String>, cause: Error) -> Self {
        Self::node_stage_failure(ErrorCode::DeployActivationFailed, "activate", host, cause)
    }

    fn node_stage_failure(code: ErrorCode, stage: &str, host: impl Into<String>, cause: Error) -> Self {
        let host = host.into();
        let message = format!("{} failed on {}: {}", stage, host, cause.message);
        let details = to_details(NodeStageFailureDetails {
            host,
            stage: stage.to_string(),
            cause_code: cause.code.as_str().to_string(),
            cause: cause.message,
            cause_details: cause.details,
        });
        let mut err = Self::new(code, message, details).with_retryable(true);
        err.hints.extend(cause.hints);
        err
    }

    pub fn task_cancelled(task: impl Into<String>, index: usize, host: impl Into<String>) -> Self {
        let details = to_details(TaskDetails {
            task: task.into(),
            index,
            host: host.into(),
        });
        Self::new(
            ErrorCode::TaskCancelled,
            "Task cancelled after a sibling failed",
            details,
        )
    }

    pub fn task_panicked(task: impl Into<String>, index: usize, host: impl Into<String>) -> Self {
        let host = host.into();
        let message = format!("Worker for {} panicked", host);
        let details = to_details(TaskDetails {
            task: task.into(),
            index,
            host,
        });
        Self::new(ErrorCode::TaskPanicked, message, details)
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalIoErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalJsonErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::internal_unexpected(message)
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }
}
