//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use berth_common::error::{BerthError, Result};
use berth_common::types::{Container, PortMapping, Project, RunSpec};
use berth_runtime::command;
use berth_runtime::registry::{RegistryHealth, Snapshot};
use berth_runtime::translate::PortTranslator;

/// A container plus the address at which the host can reach it.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerView {
    /// The container as mirrored from the runtime.
    #[serde(flatten)]
    pub container: Container,
    /// Translated host address, when the container has an internal one.
    pub host_address: Option<String>,
}

impl ContainerView {
    /// Attaches the translated host address.
    #[must_use]
    pub fn new(container: Container, translator: &PortTranslator) -> Self {
        let host_address = container
            .address
            .as_deref()
            .map(|a| translator.translate(a).to_string());
        Self {
            container,
            host_address,
        }
    }
}

/// A project with translated container views.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectView {
    /// Project name.
    pub name: String,
    /// Member containers in runtime order.
    pub containers: Vec<ContainerView>,
}

/// Body of `GET /api/projects`.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectsResponse {
    /// Snapshot generation.
    pub generation: u64,
    /// When the snapshot was built.
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Whether the last refresh failed.
    pub stale: bool,
    /// Last refresh failure.
    pub last_error: Option<String>,
    /// Projects ordered by name.
    pub projects: Vec<ProjectView>,
}

impl ProjectsResponse {
    /// Builds the response from a snapshot and health report.
    #[must_use]
    pub fn new(snapshot: &Snapshot, health: RegistryHealth, translator: &PortTranslator) -> Self {
        Self {
            generation: snapshot.generation,
            refreshed_at: snapshot.refreshed_at,
            stale: health.stale,
            last_error: health.last_error,
            projects: snapshot
                .projects
                .iter()
                .map(|p: &Project| ProjectView {
                    name: p.name.clone(),
                    containers: p
                        .containers
                        .iter()
                        .map(|c| ContainerView::new(c.clone(), translator))
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Body of run and update requests.
///
/// Arguments come either as `args` or as a shell-like `command` string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpecBody {
    /// Image reference.
    #[serde(alias = "Image")]
    pub image: String,
    /// Container name.
    #[serde(alias = "Name")]
    pub name: Option<String>,
    /// Argument vector.
    #[serde(alias = "Args")]
    pub args: Option<Vec<String>>,
    /// Command line to split into arguments.
    #[serde(alias = "Command")]
    pub command: Option<String>,
    /// Published ports.
    #[serde(alias = "Ports")]
    pub ports: Vec<PortMapping>,
}

impl SpecBody {
    /// Converts the body into a run spec.
    ///
    /// # Errors
    ///
    /// Returns [`BerthError::InvalidSpec`] if both `args` and `command` are
    /// given.
    pub fn into_spec(self) -> Result<RunSpec> {
        let args = match (self.args, self.command) {
            (Some(_), Some(_)) => {
                return Err(BerthError::invalid_spec("give either args or command, not both"));
            }
            (Some(args), None) => args,
            (None, Some(command)) => command::parse(&command),
            (None, None) => Vec::new(),
        };
        Ok(RunSpec {
            image: self.image,
            name: self.name.filter(|n| !n.is_empty()),
            args,
            ports: self.ports,
        })
    }
}

/// Body of `POST /api/containers` responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Created {
    /// Identifier of the new container.
    pub id: String,
}
