//! Container runtime abstraction.
//!
//! A backend is the narrow command interface to whatever actually runs
//! containers. Implementors normalize their runtime's schema into
//! [`Container`] so the rest of the crate sees one canonical shape.

pub mod cli;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use berth_common::config::{BackendKind, BerthConfig};
use berth_common::error::Result;
use berth_common::types::{Container, ContainerId, RunSpec};

/// Platform-agnostic container runtime.
///
/// Calls may block on external processes for an unbounded time; callers
/// are responsible for applying timeouts.
#[async_trait]
pub trait RuntimeBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Lists every container the runtime knows about.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be queried.
    async fn list(&self) -> Result<Vec<Container>>;

    /// Looks up a single container.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be queried.
    async fn inspect(&self, id: &ContainerId) -> Result<Option<Container>> {
        Ok(self.list().await?.into_iter().find(|c| c.id == *id))
    }

    /// Lists image references in the runtime's local store.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be queried.
    async fn images(&self) -> Result<Vec<String>>;

    /// Creates and starts a container under the given identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime rejects the spec or fails to start.
    async fn create(&self, id: &ContainerId, spec: &RunSpec) -> Result<()>;

    /// Starts a stopped container, applying any staged configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be started.
    async fn start(&self, id: &ContainerId) -> Result<()>;

    /// Stops a running container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be stopped.
    async fn stop(&self, id: &ContainerId) -> Result<()>;

    /// Removes a stopped container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be removed.
    async fn remove(&self, id: &ContainerId) -> Result<()>;

    /// Replaces the stored configuration without touching the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be stored.
    async fn update(&self, id: &ContainerId, spec: &RunSpec) -> Result<()>;

    /// Returns the container's raw console output.
    ///
    /// # Errors
    ///
    /// Returns an error if logs cannot be retrieved.
    async fn logs(&self, id: &ContainerId) -> Result<String>;

    /// Returns whether the runtime looks reachable on this host.
    fn is_available(&self) -> bool;
}

/// Builds the backend selected by the configuration.
///
/// # Errors
///
/// Returns an error if the CLI backend's staged-configuration file exists
/// but cannot be read.
pub fn from_config(config: &BerthConfig) -> Result<Arc<dyn RuntimeBackend>> {
    let backend: Arc<dyn RuntimeBackend> = match config.runtime.backend {
        BackendKind::Cli => Arc::new(cli::CliBackend::new(
            &config.runtime.binary,
            config.staged_file(),
        )?),
        BackendKind::Memory => Arc::new(memory::MemoryBackend::new()),
    };
    tracing::info!(backend = backend.name(), available = backend.is_available(), "runtime backend selected");
    Ok(backend)
}
