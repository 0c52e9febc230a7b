//! In-process simulated runtime.
//!
//! Containers live in a mutex-guarded list and get bridge addresses from
//! `10.10.0.2` upward, the way a single-bridge host runtime hands them out.
//! Latency, failures, and outages can be injected, and every runtime call
//! is counted so callers can assert on side effects.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use berth_common::error::{BerthError, Result};
use berth_common::types::{Container, ContainerId, ContainerStatus, RunSpec};

use super::RuntimeBackend;

const BRIDGE_PREFIX: &str = "10.10.0";
const FIRST_HOST_OCTET: u8 = 2;
const LAST_HOST_OCTET: u8 = 254;

#[derive(Debug)]
struct Entry {
    container: Container,
    octet: u8,
    logs: Vec<String>,
    pending: bool,
}

/// Simulated container runtime.
#[derive(Debug)]
pub struct MemoryBackend {
    entries: Mutex<Vec<Entry>>,
    images: Mutex<Vec<String>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    failing: Mutex<HashSet<&'static str>>,
    available: AtomicBool,
    latency: Duration,
    list_latency: Duration,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Creates an empty runtime with a couple of local images.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            images: Mutex::new(vec!["alpine:latest".into(), "nginx:latest".into()]),
            calls: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            available: AtomicBool::new(true),
            latency: Duration::ZERO,
            list_latency: Duration::ZERO,
        }
    }

    /// Delays every mutating call by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Delays every listing by `latency`.
    #[must_use]
    pub const fn with_list_latency(mut self, latency: Duration) -> Self {
        self.list_latency = latency;
        self
    }

    /// Replaces the local image store.
    #[must_use]
    pub fn with_images<I, S>(self, images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.images.lock() = images.into_iter().map(Into::into).collect();
        self
    }

    /// Inserts a container directly, bypassing call counting.
    ///
    /// # Panics
    ///
    /// Panics if the bridge address range is exhausted.
    #[allow(clippy::expect_used)]
    pub fn seed(&self, project: Option<&str>, spec: &RunSpec, running: bool) -> ContainerId {
        let id = ContainerId::generate();
        let mut entries = self.entries.lock();
        let octet = next_octet(&entries).expect("bridge address range exhausted");
        let mut container = build_container(&id, spec, octet);
        container.project = project.map(str::to_owned);
        if !running {
            container.status = ContainerStatus::Stopped;
        }
        entries.push(Entry {
            container,
            octet,
            logs: Vec::new(),
            pending: false,
        });
        id
    }

    /// Simulates the runtime going away or coming back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes every future `operation` call fail until cleared.
    pub fn fail_on(&self, operation: &'static str) {
        let _ = self.failing.lock().insert(operation);
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        self.failing.lock().clear();
    }

    /// Number of times `operation` reached the runtime.
    #[must_use]
    pub fn invocations(&self, operation: &str) -> usize {
        self.calls.lock().get(operation).copied().unwrap_or(0)
    }

    /// Returns a container's current record, without counting a call.
    #[must_use]
    pub fn peek(&self, id: &ContainerId) -> Option<Container> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.container.id == *id)
            .map(|e| e.container.clone())
    }

    async fn enter(&self, operation: &'static str, delay: Duration) -> Result<()> {
        *self.calls.lock().entry(operation).or_insert(0) += 1;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(BerthError::Unavailable {
                message: "memory runtime is offline".into(),
            });
        }
        if self.failing.lock().contains(operation) {
            return Err(BerthError::runtime(operation, "injected failure"));
        }
        Ok(())
    }

    fn with_entry<T>(&self, id: &ContainerId, f: impl FnOnce(&mut Entry) -> T) -> Result<T> {
        let mut entries = self.entries.lock();
        let entry = entries
            .iter_mut()
            .find(|e| e.container.id == *id)
            .ok_or_else(|| BerthError::container_not_found(id.as_str()))?;
        Ok(f(entry))
    }
}

#[async_trait]
impl RuntimeBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list(&self) -> Result<Vec<Container>> {
        self.enter("list", self.list_latency).await?;
        Ok(self.entries.lock().iter().map(|e| e.container.clone()).collect())
    }

    async fn inspect(&self, id: &ContainerId) -> Result<Option<Container>> {
        self.enter("inspect", Duration::ZERO).await?;
        Ok(self.peek(id))
    }

    async fn images(&self) -> Result<Vec<String>> {
        self.enter("images", Duration::ZERO).await?;
        Ok(self.images.lock().clone())
    }

    async fn create(&self, id: &ContainerId, spec: &RunSpec) -> Result<()> {
        self.enter("create", self.latency).await?;
        let mut entries = self.entries.lock();
        if entries.iter().any(|e| e.container.id == *id) {
            return Err(BerthError::runtime("create", format!("container {id} already exists")));
        }
        let octet = next_octet(&entries)
            .ok_or_else(|| BerthError::runtime("create", "bridge address range exhausted"))?;
        entries.push(Entry {
            container: build_container(id, spec, octet),
            octet,
            logs: vec![format!("started {} {}", spec.image, spec.args.join(" "))],
            pending: false,
        });
        Ok(())
    }

    async fn start(&self, id: &ContainerId) -> Result<()> {
        self.enter("start", self.latency).await?;
        self.with_entry(id, |e| {
            if std::mem::take(&mut e.pending) {
                e.logs.push("applied staged configuration".into());
            }
            e.container.status = ContainerStatus::Running;
            e.logs.push(format!("started {} {}", e.container.image, e.container.args.join(" ")));
        })
    }

    async fn stop(&self, id: &ContainerId) -> Result<()> {
        self.enter("stop", self.latency).await?;
        self.with_entry(id, |e| {
            e.container.status = ContainerStatus::Stopped;
            e.logs.push("stopped".into());
        })
    }

    async fn remove(&self, id: &ContainerId) -> Result<()> {
        self.enter("remove", self.latency).await?;
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.container.id != *id);
        if entries.len() == before {
            return Err(BerthError::container_not_found(id.as_str()));
        }
        Ok(())
    }

    async fn update(&self, id: &ContainerId, spec: &RunSpec) -> Result<()> {
        self.enter("update", self.latency).await?;
        self.with_entry(id, |e| {
            let c = &mut e.container;
            c.image.clone_from(&spec.image);
            c.name = spec.name.clone().unwrap_or_default();
            c.args.clone_from(&spec.args);
            c.ports.clone_from(&spec.ports);
            c.raw = raw_config(spec, e.octet);
            e.pending = true;
        })
    }

    async fn logs(&self, id: &ContainerId) -> Result<String> {
        self.enter("logs", Duration::ZERO).await?;
        self.with_entry(id, |e| {
            let mut out = e.logs.join("\n");
            if !out.is_empty() {
                out.push('\n');
            }
            out
        })
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

fn next_octet(entries: &[Entry]) -> Option<u8> {
    (FIRST_HOST_OCTET..=LAST_HOST_OCTET).find(|o| entries.iter().all(|e| e.octet != *o))
}

fn build_container(id: &ContainerId, spec: &RunSpec, octet: u8) -> Container {
    Container {
        id: id.clone(),
        name: spec.name.clone().unwrap_or_default(),
        image: spec.image.clone(),
        status: ContainerStatus::Running,
        address: Some(format!("{BRIDGE_PREFIX}.{octet}")),
        ports: spec.ports.clone(),
        args: spec.args.clone(),
        created: Some(chrono::Utc::now()),
        project: None,
        raw: raw_config(spec, octet),
    }
}

fn raw_config(spec: &RunSpec, octet: u8) -> serde_json::Value {
    serde_json::json!({
        "Image": spec.image,
        "Name": spec.name,
        "Args": spec.args,
        "Ports": spec.ports,
        "IP": format!("{BRIDGE_PREFIX}.{octet}"),
    })
}
