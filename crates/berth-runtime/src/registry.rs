//! Authoritative in-memory view of the runtime's containers.
//!
//! The registry never edits its view in place. Each refresh lists the
//! runtime, builds a complete [`Snapshot`], and swaps the shared pointer.
//! Readers clone the `Arc` and never observe a half-built snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use berth_common::constants::DEFAULT_PROJECT;
use berth_common::error::{BerthError, Result};
use berth_common::types::{Container, ContainerId, Project};

use crate::backend::RuntimeBackend;

/// One published view of the runtime.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    /// Incremented on every successful refresh. Zero before the first one.
    pub generation: u64,
    /// When the listing behind this snapshot completed.
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Projects ordered by name.
    pub projects: Vec<Project>,
}

impl Snapshot {
    /// Iterates over every container across projects.
    pub fn containers(&self) -> impl Iterator<Item = &Container> {
        self.projects.iter().flat_map(|p| p.containers.iter())
    }

    /// Looks up a container by exact identifier.
    #[must_use]
    pub fn find(&self, id: &ContainerId) -> Option<&Container> {
        self.containers().find(|c| c.id == *id)
    }
}

/// Freshness of the published snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryHealth {
    /// Whether the last refresh failed.
    pub stale: bool,
    /// Message of the last failure, cleared on success.
    pub last_error: Option<String>,
}

/// Container registry backed by a runtime.
pub struct Registry {
    backend: Arc<dyn RuntimeBackend>,
    timeout: Duration,
    current: RwLock<Arc<Snapshot>>,
    health: RwLock<RegistryHealth>,
    gate: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("backend", &self.backend.name())
            .field("generation", &self.current.read().generation)
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Creates a registry with an empty generation-zero snapshot.
    #[must_use]
    pub fn new(backend: Arc<dyn RuntimeBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            current: RwLock::new(Arc::new(Snapshot::default())),
            health: RwLock::new(RegistryHealth::default()),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns the currently published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.current.read())
    }

    /// Returns the staleness report.
    #[must_use]
    pub fn health(&self) -> RegistryHealth {
        self.health.read().clone()
    }

    /// Rebuilds the view from the runtime and publishes it.
    ///
    /// Concurrent callers are serialized, so a slower, older listing can
    /// never replace a newer one. On failure the previous snapshot stays
    /// published and the registry is marked stale.
    ///
    /// # Errors
    ///
    /// Returns [`BerthError::Unavailable`] if the runtime cannot be listed
    /// or the listing times out.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>> {
        let _gate = self.gate.lock().await;
        let listed = match tokio::time::timeout(self.timeout, self.backend.list()).await {
            Ok(Ok(containers)) => containers,
            Ok(Err(e)) => return Err(self.mark_stale(&e.to_string())),
            Err(_) => {
                let message = format!("runtime listing timed out after {}s", self.timeout.as_secs());
                return Err(self.mark_stale(&message));
            }
        };

        let previous = self.snapshot();
        let snapshot = Arc::new(Snapshot {
            generation: previous.generation + 1,
            refreshed_at: Some(Utc::now()),
            projects: group_projects(listed),
        });
        *self.current.write() = Arc::clone(&snapshot);
        *self.health.write() = RegistryHealth::default();
        tracing::debug!(
            generation = snapshot.generation,
            projects = snapshot.projects.len(),
            "registry refreshed"
        );
        Ok(snapshot)
    }

    /// Looks up a container in the published snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`BerthError::NotFound`] if no container has this id.
    pub fn find_container(&self, id: &ContainerId) -> Result<Container> {
        self.snapshot()
            .find(id)
            .cloned()
            .ok_or_else(|| BerthError::container_not_found(id.as_str()))
    }

    /// Finds a container by exact id, falling back to a unique name match.
    ///
    /// # Errors
    ///
    /// Returns [`BerthError::NotFound`] if nothing matches or the name is
    /// shared by more than one container.
    pub fn resolve(&self, id_or_name: &str) -> Result<Container> {
        let snapshot = self.snapshot();
        if let Some(c) = snapshot.find(&ContainerId::from(id_or_name)) {
            return Ok(c.clone());
        }
        let mut named = snapshot.containers().filter(|c| c.name == id_or_name);
        match (named.next(), named.next()) {
            (Some(c), None) => Ok(c.clone()),
            _ => Err(BerthError::container_not_found(id_or_name)),
        }
    }

    fn mark_stale(&self, message: &str) -> BerthError {
        tracing::warn!(backend = self.backend.name(), error = message, "registry refresh failed");
        *self.health.write() = RegistryHealth {
            stale: true,
            last_error: Some(message.to_owned()),
        };
        BerthError::Unavailable {
            message: message.to_owned(),
        }
    }
}

/// Groups containers by project label, keeping runtime order inside each.
fn group_projects(containers: Vec<Container>) -> Vec<Project> {
    let mut grouped: BTreeMap<String, Vec<Container>> = BTreeMap::new();
    for container in containers {
        let name = container
            .project
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PROJECT.to_owned());
        grouped.entry(name).or_default().push(container);
    }
    grouped
        .into_iter()
        .map(|(name, containers)| Project { name, containers })
        .collect()
}
