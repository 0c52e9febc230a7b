//! Docker-compatible command-line runtime adapter.
//!
//! Every call shells out to the configured client binary. Containers
//! created through Berth carry an `io.berth.id` label holding their stable
//! identifier; anything else is identified by its short runtime id.
//!
//! The client cannot rewrite a container's configuration in place, so
//! updates are staged in a JSON file under the data directory and applied
//! by recreating the container on its next start.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use berth_common::constants::{ID_LABEL, PROJECT_LABEL};
use berth_common::error::{BerthError, Result};
use berth_common::types::{Container, ContainerId, ContainerStatus, PortMapping, RunSpec};

use super::RuntimeBackend;

const SHORT_ID_LEN: usize = 12;
const PARKED_SUFFIX: &str = "-berth-prev";

/// Captured output of one client invocation.
#[derive(Debug)]
struct Output {
    stdout: String,
    stderr: String,
}

/// Runtime adapter driving a Docker-compatible CLI.
#[derive(Debug)]
pub struct CliBackend {
    binary: String,
    staged_path: PathBuf,
    staged: Mutex<HashMap<ContainerId, RunSpec>>,
}

impl CliBackend {
    /// Creates an adapter for `binary`, loading staged updates from
    /// `staged_path` if the file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the staged file exists but cannot be read or
    /// parsed.
    pub fn new(binary: &str, staged_path: PathBuf) -> Result<Self> {
        let staged = load_staged(&staged_path)?;
        if !staged.is_empty() {
            tracing::info!(count = staged.len(), path = %staged_path.display(), "loaded staged updates");
        }
        Ok(Self {
            binary: binary.to_owned(),
            staged_path,
            staged: Mutex::new(staged),
        })
    }

    /// Returns the staged configuration for `id`, if any.
    #[must_use]
    pub fn staged(&self, id: &ContainerId) -> Option<RunSpec> {
        self.staged.lock().get(id).cloned()
    }

    async fn invoke(&self, args: &[String]) -> Result<(bool, Output)> {
        tracing::debug!(binary = %self.binary, ?args, "invoking runtime client");
        let output = tokio::process::Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    BerthError::Unavailable {
                        message: format!("runtime client {:?} not found", self.binary),
                    }
                } else {
                    BerthError::Io {
                        path: PathBuf::from(&self.binary),
                        source: e,
                    }
                }
            })?;
        let out = Output {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        Ok((output.status.success(), out))
    }

    async fn exec(&self, operation: &'static str, args: &[String]) -> Result<Output> {
        let (success, out) = self.invoke(args).await?;
        if success {
            return Ok(out);
        }
        Err(failure(operation, args, &out))
    }

    /// Maps a Berth identifier onto something the client accepts.
    async fn resolve(&self, id: &ContainerId) -> Result<String> {
        let filter = format!("label={ID_LABEL}={id}");
        let out = self
            .exec("resolve", &strings(["ps", "-aq", "--no-trunc", "--filter", &filter]))
            .await?;
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map_or_else(|| id.to_string(), str::to_owned))
    }

    async fn run_container(&self, id: &ContainerId, spec: &RunSpec, project: Option<&str>) -> Result<()> {
        let args = run_args(id, spec, project);
        let _ = self.exec("create", &args).await?;
        Ok(())
    }

    fn persist_staged(&self, staged: &HashMap<ContainerId, RunSpec>) -> Result<()> {
        if let Some(parent) = self.staged_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BerthError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let json = serde_json::to_string_pretty(staged)?;
        std::fs::write(&self.staged_path, json).map_err(|e| BerthError::Io {
            path: self.staged_path.clone(),
            source: e,
        })
    }

    fn take_staged(&self, id: &ContainerId) -> Result<Option<RunSpec>> {
        let mut staged = self.staged.lock();
        let spec = staged.remove(id);
        if spec.is_some() {
            self.persist_staged(&staged)?;
        }
        Ok(spec)
    }

    /// Replaces the container behind `target` with one built from `spec`.
    ///
    /// The old container is parked under a temporary name until the new one
    /// is up, and restored if the runtime refuses the new configuration.
    async fn recreate(&self, id: &ContainerId, target: &str, spec: &RunSpec) -> Result<()> {
        let current = self.exec("start", &strings(["inspect", target])).await?;
        let previous = parse_inspect(&current.stdout)?
            .into_iter()
            .next()
            .ok_or_else(|| BerthError::container_not_found(id.as_str()))?;
        let parked = format!("{}{PARKED_SUFFIX}", previous.name);
        let _ = self.exec("start", &strings(["rename", target, &parked])).await?;

        if let Err(e) = self.run_container(id, spec, previous.project.as_deref()).await {
            self.discard_replacements(id, target).await;
            if let Err(restore) = self.exec("start", &strings(["rename", target, &previous.name])).await {
                tracing::warn!(id = %id, error = %restore, "could not restore container name");
            }
            return Err(e);
        }

        let _ = self.take_staged(id)?;
        if let Err(e) = self.exec("start", &strings(["rm", "-f", target])).await {
            tracing::warn!(id = %id, error = %e, "previous container left behind");
        }
        Ok(())
    }

    /// Removes containers a failed `run` left under `id`'s label, keeping
    /// the original at `keep`.
    async fn discard_replacements(&self, id: &ContainerId, keep: &str) {
        let filter = format!("label={ID_LABEL}={id}");
        let Ok(out) = self
            .exec("start", &strings(["ps", "-aq", "--no-trunc", "--filter", &filter]))
            .await
        else {
            return;
        };
        for leftover in out.stdout.lines().map(str::trim).filter(|l| !l.is_empty() && *l != keep) {
            if let Err(e) = self.exec("start", &strings(["rm", "-f", leftover])).await {
                tracing::warn!(id = %id, container = leftover, error = %e, "could not discard replacement");
            }
        }
    }

    /// Shows staged configuration in place of what the runtime reports.
    fn overlay_staged(&self, containers: &mut [Container]) {
        let staged = self.staged.lock();
        for container in containers {
            if let Some(spec) = staged.get(&container.id) {
                container.image.clone_from(&spec.image);
                if let Some(name) = &spec.name {
                    container.name.clone_from(name);
                }
                container.args.clone_from(&spec.args);
                container.ports.clone_from(&spec.ports);
            }
        }
    }
}

#[async_trait]
impl RuntimeBackend for CliBackend {
    fn name(&self) -> &'static str {
        "cli"
    }

    async fn list(&self) -> Result<Vec<Container>> {
        let ids = self.exec("list", &strings(["ps", "-aq", "--no-trunc"])).await?;
        let ids: Vec<String> = ids
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = strings(["inspect"]);
        args.extend(ids);
        let (success, out) = self.invoke(&args).await?;
        let mut containers = match parse_inspect(&out.stdout) {
            Ok(containers) => containers,
            Err(_) if !success => return Err(failure("list", &args, &out)),
            Err(e) => return Err(e),
        };
        if !success {
            tracing::debug!(error = out.stderr.trim(), "some containers vanished during listing");
        }
        self.overlay_staged(&mut containers);
        Ok(containers)
    }

    async fn images(&self) -> Result<Vec<String>> {
        let out = self
            .exec("images", &strings(["images", "--format", "{{.Repository}}:{{.Tag}}"]))
            .await?;
        Ok(parse_images(&out.stdout))
    }

    async fn create(&self, id: &ContainerId, spec: &RunSpec) -> Result<()> {
        self.run_container(id, spec, None).await
    }

    async fn start(&self, id: &ContainerId) -> Result<()> {
        let target = self.resolve(id).await?;
        let Some(spec) = self.staged(id) else {
            let _ = self.exec("start", &strings(["start", &target])).await?;
            return Ok(());
        };
        tracing::info!(id = %id, "recreating container from staged configuration");
        self.recreate(id, &target, &spec).await
    }

    async fn stop(&self, id: &ContainerId) -> Result<()> {
        let target = self.resolve(id).await?;
        let _ = self.exec("stop", &strings(["stop", &target])).await?;
        Ok(())
    }

    async fn remove(&self, id: &ContainerId) -> Result<()> {
        let target = self.resolve(id).await?;
        let _ = self.exec("remove", &strings(["rm", &target])).await?;
        let _ = self.take_staged(id)?;
        Ok(())
    }

    async fn update(&self, id: &ContainerId, spec: &RunSpec) -> Result<()> {
        let mut staged = self.staged.lock();
        let _ = staged.insert(id.clone(), spec.clone());
        self.persist_staged(&staged)?;
        tracing::debug!(id = %id, "configuration staged");
        Ok(())
    }

    async fn logs(&self, id: &ContainerId) -> Result<String> {
        let target = self.resolve(id).await?;
        let out = self.exec("logs", &strings(["logs", &target])).await?;
        Ok(out.stdout + &out.stderr)
    }

    fn is_available(&self) -> bool {
        which::which(&self.binary).is_ok()
    }
}

/// Classifies a failed invocation by the client's error text.
fn failure(operation: &'static str, args: &[String], out: &Output) -> BerthError {
    let message = out.stderr.trim().to_owned();
    if message.contains("No such container") {
        let id = args.last().cloned().unwrap_or_default();
        return BerthError::container_not_found(id);
    }
    if message.contains("Cannot connect to the") || message.contains("daemon running") {
        return BerthError::Unavailable { message };
    }
    BerthError::runtime(operation, message)
}

fn strings<const N: usize>(args: [&str; N]) -> Vec<String> {
    args.iter().map(|s| (*s).to_owned()).collect()
}

fn load_staged(path: &Path) -> Result<HashMap<ContainerId, RunSpec>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(path).map_err(|e| BerthError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    if content.trim().is_empty() {
        return Ok(HashMap::new());
    }
    Ok(serde_json::from_str(&content)?)
}

/// Builds `run -d` arguments for a spec.
fn run_args(id: &ContainerId, spec: &RunSpec, project: Option<&str>) -> Vec<String> {
    let mut args = strings(["run", "-d", "--label"]);
    args.push(format!("{ID_LABEL}={id}"));
    if let Some(project) = project {
        args.push("--label".into());
        args.push(format!("{PROJECT_LABEL}={project}"));
    }
    if let Some(name) = &spec.name {
        args.push("--name".into());
        args.push(name.clone());
    }
    for port in &spec.ports {
        args.push("-p".into());
        args.push(port.to_string());
    }
    args.push(spec.image.clone());
    args.extend(spec.args.iter().cloned());
    args
}

fn parse_images(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.contains("<none>"))
        .map(str::to_owned)
        .collect()
}

/// Normalizes `inspect` output into canonical containers.
fn parse_inspect(stdout: &str) -> Result<Vec<Container>> {
    let values: Vec<Value> = serde_json::from_str(stdout)?;
    Ok(values.into_iter().filter_map(normalize).collect())
}

fn normalize(raw: Value) -> Option<Container> {
    let runtime_id = raw.get("Id")?.as_str()?;
    let labels = raw.pointer("/Config/Labels");
    let label = |key: &str| {
        labels
            .and_then(|l| l.get(key))
            .and_then(Value::as_str)
            .map(str::to_owned)
    };
    let id = label(ID_LABEL).unwrap_or_else(|| runtime_id.chars().take(SHORT_ID_LEN).collect());
    let text = |pointer: &str| raw.pointer(pointer).and_then(Value::as_str).unwrap_or_default();

    let address = Some(text("/NetworkSettings/IPAddress"))
        .filter(|a| !a.is_empty())
        .map(str::to_owned)
        .or_else(|| {
            raw.pointer("/NetworkSettings/Networks")?
                .as_object()?
                .values()
                .filter_map(|n| n.get("IPAddress")?.as_str())
                .find(|a| !a.is_empty())
                .map(str::to_owned)
        });

    let args = raw
        .pointer("/Config/Cmd")
        .and_then(Value::as_array)
        .map(|cmd| cmd.iter().filter_map(Value::as_str).map(str::to_owned).collect())
        .unwrap_or_default();

    let created = chrono::DateTime::parse_from_rfc3339(text("/Created"))
        .ok()
        .map(|t| t.with_timezone(&chrono::Utc));

    Some(Container {
        id: ContainerId::new(id),
        name: text("/Name").trim_start_matches('/').to_owned(),
        image: text("/Config/Image").to_owned(),
        status: ContainerStatus::from(text("/State/Status")),
        address,
        ports: port_bindings(&raw),
        args,
        created,
        project: label(PROJECT_LABEL),
        raw,
    })
}

/// Reads `HostConfig.PortBindings` (`{"80/tcp": [{"HostPort": "8080"}]}`).
fn port_bindings(raw: &Value) -> Vec<PortMapping> {
    let Some(bindings) = raw.pointer("/HostConfig/PortBindings").and_then(Value::as_object) else {
        return Vec::new();
    };
    let mut ports = Vec::new();
    for (key, hosts) in bindings {
        let Some(container) = key.split('/').next().and_then(|p| p.parse::<u16>().ok()) else {
            continue;
        };
        for host in hosts.as_array().into_iter().flatten() {
            let parsed = host
                .get("HostPort")
                .and_then(Value::as_str)
                .and_then(|p| p.parse::<u16>().ok())
                .and_then(|h| PortMapping::new(h, container).ok());
            if let Some(mapping) = parsed {
                ports.push(mapping);
            }
        }
    }
    ports
}
