//! Version-pinned templates and per-node rendering.

mod builtin;

pub use builtin::{BuiltinTemplates, ETCD_VERSION, FLANNELD_VERSION};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::utils::placeholder::{self, TemplateVars};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    /// JSON CSR request document.
    Csr,
    /// Service-manager unit definition.
    ServiceUnit,
    /// Optional script run once before the service is activated.
    PreStart,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Csr => "csr",
            TemplateKind::ServiceUnit => "service-unit",
            TemplateKind::PreStart => "pre-start",
        }
    }
}

/// What to do when a version has no template of the requested kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateLookup {
    /// Fail with `template.unknown_version`.
    Strict,
    /// Render an empty template; a missing CSR template then fails in the
    /// issuer as an invalid request.
    #[default]
    Permissive,
}

/// Exact-match template table keyed by version string.
pub trait TemplateRegistry: Sync {
    fn lookup(&self, version: &str, kind: TemplateKind) -> Option<&str>;
}

/// Caller-assembled template table.
#[derive(Debug, Clone, Default)]
pub struct StaticTemplates {
    templates: HashMap<(String, TemplateKind), String>,
}

impl StaticTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, version: &str, kind: TemplateKind, text: impl Into<String>) -> Self {
        self.insert(version, kind, text);
        self
    }

    pub fn insert(&mut self, version: &str, kind: TemplateKind, text: impl Into<String>) {
        self.templates.insert((version.to_string(), kind), text.into());
    }
}

impl TemplateRegistry for StaticTemplates {
    fn lookup(&self, version: &str, kind: TemplateKind) -> Option<&str> {
        self.templates
            .get(&(version.to_string(), kind))
            .map(String::as_str)
    }
}

/// Per-node template input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentEndpoint {
    pub ip: String,
    /// Logical member name, e.g. `etcd-node-0`.
    pub name: String,
    /// Comma-joined peers (coordination store) or upstream endpoints (overlay agent).
    pub endpoints: String,
}

impl ComponentEndpoint {
    fn variables(&self) -> [(&str, &str); 3] {
        [
            (TemplateVars::IP, self.ip.as_str()),
            (TemplateVars::NAME, self.name.as_str()),
            (TemplateVars::ENDPOINTS, self.endpoints.as_str()),
        ]
    }
}

pub struct ArtifactRenderer<'a> {
    registry: &'a dyn TemplateRegistry,
    lookup: TemplateLookup,
}

impl<'a> ArtifactRenderer<'a> {
    pub fn new(registry: &'a dyn TemplateRegistry, lookup: TemplateLookup) -> Self {
        Self { registry, lookup }
    }

    pub fn has_template(&self, version: &str, kind: TemplateKind) -> bool {
        self.registry.lookup(version, kind).is_some()
    }

    /// Check up front that a template exists when lookups are strict.
    pub fn require(&self, version: &str, kind: TemplateKind) -> Result<()> {
        self.template(version, kind).map(|_| ())
    }

    fn template(&self, version: &str, kind: TemplateKind) -> Result<&'a str> {
        match (self.registry.lookup(version, kind), self.lookup) {
            (Some(text), _) => Ok(text),
            (None, TemplateLookup::Permissive) => Ok(""),
            (None, TemplateLookup::Strict) => {
                Err(Error::template_unknown_version(version, kind.as_str()))
            }
        }
    }

    /// Render the `kind` template of `version` against one node's data.
    pub fn render(&self, version: &str, kind: TemplateKind, node: &ComponentEndpoint) -> Result<Vec<u8>> {
        let template = self.template(version, kind)?;

        if node.endpoints.is_empty() && placeholder::is_present(template, TemplateVars::ENDPOINTS) {
            log_status!(
                "template",
                "{} template for {} references endpoints but none are known",
                kind.as_str(),
                node.ip
            );
        }

        Ok(placeholder::render(template, &node.variables()).into_bytes())
    }
}
