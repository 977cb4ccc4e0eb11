// Public modules
pub mod activate;
pub mod artifact;
pub mod ca;
pub mod component;
pub mod defaults;
pub mod deploy;
pub mod distribute;
pub mod error;
pub mod fanout;
pub mod node;
pub mod outputs;
pub mod remote;
pub mod ssh;
pub mod template;
pub mod workspace;

// Internal modules - not part of public API
pub(crate) mod paths;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
pub use node::{Node, RootCa};
pub use outputs::{DeploymentOutputs, EndpointSet};
