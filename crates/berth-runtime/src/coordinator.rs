//! Lifecycle coordinator that serializes mutations per container.
//!
//! Every mutating operation takes the container's lock before its first
//! suspension point and hands the guard to a spawned task. The task runs
//! the runtime calls, each bounded by the configured timeout, drops the
//! guard, refreshes the registry, and only then reports back. A caller
//! that stops waiting does not cancel the mutation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use berth_common::constants::CLONE_SUFFIX;
use berth_common::error::{BerthError, Result};
use berth_common::types::{Container, ContainerId, RunSpec};

use crate::backend::RuntimeBackend;
use crate::lock::{LockGuard, LockTable};
use crate::registry::Registry;

/// Result of a lifecycle command that may legitimately do nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The runtime performed the requested transition.
    Done,
    /// Start was requested on a running container.
    AlreadyRunning,
    /// Stop was requested on a container that is not running.
    NotRunning,
}

/// Runtime handle with a per-call deadline.
#[derive(Clone)]
struct Bounded {
    backend: Arc<dyn RuntimeBackend>,
    timeout: Duration,
}

impl Bounded {
    async fn call<T>(&self, operation: &'static str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, fut).await.map_err(|_| {
            BerthError::runtime(operation, format!("timed out after {}s", self.timeout.as_secs()))
        })?
    }

    async fn inspect(&self, id: &ContainerId) -> Result<Container> {
        self.call("inspect", self.backend.inspect(id))
            .await?
            .ok_or_else(|| BerthError::container_not_found(id.as_str()))
    }
}

/// Serializes lifecycle commands against a runtime.
pub struct Coordinator {
    runtime: Bounded,
    registry: Arc<Registry>,
    locks: Arc<LockTable>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("backend", &self.runtime.backend.name())
            .field("timeout", &self.runtime.timeout)
            .field("locks_held", &self.locks.held_count())
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Creates a coordinator over `backend`, refreshing `registry` after
    /// every successful mutation.
    #[must_use]
    pub fn new(backend: Arc<dyn RuntimeBackend>, registry: Arc<Registry>, timeout: Duration) -> Self {
        Self {
            runtime: Bounded { backend, timeout },
            registry,
            locks: LockTable::new(),
        }
    }

    /// Registry this coordinator keeps current.
    #[must_use]
    pub const fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Name of the runtime backend in use.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.runtime.backend.name()
    }

    /// Lock table shared by all mutations.
    #[must_use]
    pub const fn locks(&self) -> &Arc<LockTable> {
        &self.locks
    }

    /// Starts a container.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id, `Busy` if another mutation
    /// holds the id, or `Runtime` if the runtime fails or times out.
    pub async fn start(&self, id: &ContainerId) -> Result<Outcome> {
        let guard = self.locks.try_acquire(id)?;
        self.mutate("start", guard, |rt, id| async move {
            if rt.inspect(&id).await?.is_running() {
                return Ok(Outcome::AlreadyRunning);
            }
            rt.call("start", rt.backend.start(&id)).await?;
            Ok(Outcome::Done)
        })
        .await
    }

    /// Stops a container.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Busy`, or `Runtime` as for [`Self::start`].
    pub async fn stop(&self, id: &ContainerId) -> Result<Outcome> {
        let guard = self.locks.try_acquire(id)?;
        self.mutate("stop", guard, |rt, id| async move {
            if !rt.inspect(&id).await?.is_running() {
                return Ok(Outcome::NotRunning);
            }
            rt.call("stop", rt.backend.stop(&id)).await?;
            Ok(Outcome::Done)
        })
        .await
    }

    /// Removes a container that is not running.
    ///
    /// # Errors
    ///
    /// Returns `InUse` if the container is running, otherwise as for
    /// [`Self::start`].
    pub async fn remove(&self, id: &ContainerId) -> Result<()> {
        let guard = self.locks.try_acquire(id)?;
        self.mutate("remove", guard, |rt, id| async move {
            if rt.inspect(&id).await?.is_running() {
                return Err(BerthError::InUse { id: id.to_string() });
            }
            rt.call("remove", rt.backend.remove(&id)).await
        })
        .await
    }

    /// Creates and starts a container, returning its new identifier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSpec` if the spec is invalid, or `Runtime` if the
    /// runtime fails or times out.
    pub async fn run(&self, spec: RunSpec) -> Result<ContainerId> {
        spec.validate()?;
        let id = ContainerId::generate();
        let guard = self.locks.try_acquire(&id)?;
        self.mutate("run", guard, |rt, id| async move {
            rt.call("create", rt.backend.create(&id, &spec)).await?;
            tracing::info!(id = %id, image = %spec.image, "container created");
            Ok(id)
        })
        .await
    }

    /// Replaces a container's stored configuration. The running process is
    /// untouched; the change applies on the next start.
    ///
    /// An empty image or missing name keeps the container's current value.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Busy`, `InvalidSpec`, or `Runtime`.
    pub async fn update(&self, id: &ContainerId, spec: RunSpec) -> Result<()> {
        let guard = self.locks.try_acquire(id)?;
        self.mutate("update", guard, |rt, id| async move {
            let current = rt.inspect(&id).await?;
            let merged = merge_update(&current, spec);
            merged.validate()?;
            rt.call("update", rt.backend.update(&id, &merged)).await
        })
        .await
    }

    /// Derives a spec for a copy of a container from the registry.
    ///
    /// Only the first published port is carried over.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the registry does not know the id.
    pub fn clone_spec(&self, id: &ContainerId) -> Result<RunSpec> {
        let source = self.registry.find_container(id)?;
        Ok(clone_of(&source))
    }

    /// Fetches a container's console output.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `Runtime`.
    pub async fn logs(&self, id: &ContainerId) -> Result<String> {
        self.runtime.call("logs", self.runtime.backend.logs(id)).await
    }

    /// Lists local images.
    ///
    /// # Errors
    ///
    /// Returns `Runtime` if the runtime fails or times out.
    pub async fn images(&self) -> Result<Vec<String>> {
        self.runtime.call("images", self.runtime.backend.images()).await
    }

    async fn mutate<T, F, Fut>(&self, operation: &'static str, guard: LockGuard, f: F) -> Result<T>
    where
        F: FnOnce(Bounded, ContainerId) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let id = guard.id().clone();
        let work = f(self.runtime.clone(), id.clone());
        let registry = Arc::clone(&self.registry);
        tracing::debug!(id = %id, operation, "mutation started");
        let task = tokio::spawn(async move {
            let result = work.await;
            drop(guard);
            match &result {
                Ok(_) => {
                    tracing::info!(id = %id, operation, "mutation completed");
                    if let Err(e) = registry.refresh().await {
                        tracing::warn!(id = %id, operation, error = %e, "post-mutation refresh failed");
                    }
                }
                Err(e) => tracing::warn!(id = %id, operation, error = %e, "mutation failed"),
            }
            result
        });
        task.await
            .map_err(|e| BerthError::runtime(operation, format!("mutation task failed: {e}")))?
    }
}

fn merge_update(current: &Container, mut spec: RunSpec) -> RunSpec {
    if spec.image.trim().is_empty() {
        spec.image.clone_from(&current.image);
    }
    if spec.name.is_none() && !current.name.is_empty() {
        spec.name = Some(current.name.clone());
    }
    spec
}

fn clone_of(source: &Container) -> RunSpec {
    RunSpec {
        image: source.image.clone(),
        name: Some(format!("{}{CLONE_SUFFIX}", source.display_name())),
        args: source.args.clone(),
        ports: source.ports.first().copied().into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use berth_common::types::{ContainerStatus, PortMapping};

    fn container(name: &str) -> Container {
        Container {
            id: ContainerId::new("c-abc"),
            name: name.into(),
            image: "nginx".into(),
            status: ContainerStatus::Running,
            address: Some("10.10.0.2".into()),
            ports: vec![
                PortMapping { host: 8080, container: 80 },
                PortMapping { host: 8443, container: 443 },
            ],
            args: vec!["nginx".into(), "-g".into(), "daemon off;".into()],
            created: None,
            project: None,
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn clone_keeps_first_port_and_suffixes_name() {
        let spec = clone_of(&container("web"));
        assert_eq!(spec.image, "nginx");
        assert_eq!(spec.name.as_deref(), Some("web-copy"));
        assert_eq!(spec.args, vec!["nginx", "-g", "daemon off;"]);
        assert_eq!(spec.ports, vec![PortMapping { host: 8080, container: 80 }]);
    }

    #[test]
    fn clone_of_unnamed_container_uses_id() {
        let spec = clone_of(&container(""));
        assert_eq!(spec.name.as_deref(), Some("c-abc-copy"));
    }

    #[test]
    fn update_fills_blank_fields_from_current() {
        let merged = merge_update(&container("web"), RunSpec::new("").with_args(["top"]));
        assert_eq!(merged.image, "nginx");
        assert_eq!(merged.name.as_deref(), Some("web"));
        assert_eq!(merged.args, vec!["top"]);
        assert!(merged.ports.is_empty());
    }

    #[test]
    fn update_overrides_given_fields() {
        let merged = merge_update(&container("web"), RunSpec::new("httpd").with_name("site"));
        assert_eq!(merged.image, "httpd");
        assert_eq!(merged.name.as_deref(), Some("site"));
    }

    #[test]
    fn outcome_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Outcome::AlreadyRunning).unwrap(),
            "\"already_running\""
        );
    }
}
