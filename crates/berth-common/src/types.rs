//! Domain types used across the Berth workspace.
//!
//! These form the canonical container schema. Runtime adapters translate
//! whatever their runtime reports into these shapes once, at the adapter
//! boundary, so nothing downstream branches on upstream field spellings.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BerthError, Result};

/// Unique, stable identifier for a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh identifier of the form `c-<12 hex digits>`.
    #[must_use]
    pub fn generate() -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("c-{}", &hex[..12]))
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Runtime-reported status of a container.
///
/// Only the running/not-running distinction carries meaning here; any state
/// the runtime reports beyond that is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContainerStatus {
    /// The container's process is alive.
    Running,
    /// The container exited or was stopped.
    Stopped,
    /// Any other runtime state (`created`, `paused`, `restarting`, ...).
    Other(String),
}

impl ContainerStatus {
    /// Returns whether the container is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl From<String> for ContainerStatus {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "running" => Self::Running,
            "stopped" | "exited" => Self::Stopped,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for ContainerStatus {
    fn from(value: &str) -> Self {
        Self::from(value.to_owned())
    }
}

impl From<ContainerStatus> for String {
    fn from(value: ContainerStatus) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("Running"),
            Self::Stopped => f.write_str("Stopped"),
            Self::Other(state) => f.write_str(state),
        }
    }
}

/// A host port published to a container port.
///
/// Host-port collisions are not checked here; the runtime rejects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PortMappingRepr")]
pub struct PortMapping {
    /// Port on the host side.
    pub host: u16,
    /// Port inside the container.
    pub container: u16,
}

impl PortMapping {
    /// Creates a mapping, rejecting port 0 on either side.
    ///
    /// # Errors
    ///
    /// Returns [`BerthError::InvalidSpec`] if either port is 0.
    pub fn new(host: u16, container: u16) -> Result<Self> {
        if host == 0 || container == 0 {
            return Err(BerthError::invalid_spec(format!(
                "port mapping {host}:{container} must use ports in 1..=65535"
            )));
        }
        Ok(Self { host, container })
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.container)
    }
}

impl FromStr for PortMapping {
    type Err = BerthError;

    fn from_str(s: &str) -> Result<Self> {
        let (host, container) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| BerthError::invalid_spec(format!("expected HOST:CONTAINER, got {s:?}")))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u16>()
                .map_err(|_| BerthError::invalid_spec(format!("invalid port {part:?} in {s:?}")))
        };
        Self::new(parse(host)?, parse(container)?)
    }
}

/// Wire shapes accepted for a port mapping: `"8080:80"` or an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum PortMappingRepr {
    Text(String),
    Pair {
        #[serde(alias = "Host")]
        host: u16,
        #[serde(alias = "Container")]
        container: u16,
    },
}

impl TryFrom<PortMappingRepr> for PortMapping {
    type Error = BerthError;

    fn try_from(value: PortMappingRepr) -> Result<Self> {
        match value {
            PortMappingRepr::Text(text) => text.parse(),
            PortMappingRepr::Pair { host, container } => Self::new(host, container),
        }
    }
}

/// Desired configuration for creating or updating a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSpec {
    /// Image reference. Mandatory and non-empty.
    pub image: String,
    /// Optional container name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Command arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Published ports.
    #[serde(default)]
    pub ports: Vec<PortMapping>,
}

impl RunSpec {
    /// Creates a spec for the given image with everything else empty.
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Self::default()
        }
    }

    /// Sets the container name. An empty name clears it.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = (!name.is_empty()).then_some(name);
        self
    }

    /// Sets the command arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Appends a published port.
    #[must_use]
    pub fn with_port(mut self, mapping: PortMapping) -> Self {
        self.ports.push(mapping);
        self
    }

    /// Checks the spec's invariants.
    ///
    /// # Errors
    ///
    /// Returns [`BerthError::InvalidSpec`] if the image is empty or a port
    /// mapping uses port 0.
    pub fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            return Err(BerthError::invalid_spec("image is required"));
        }
        for mapping in &self.ports {
            let _ = PortMapping::new(mapping.host, mapping.container)?;
        }
        Ok(())
    }
}

/// A container as mirrored from the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    /// Stable identifier; never changes once assigned.
    pub id: ContainerId,
    /// Human-readable name. May be empty or shared with other containers.
    #[serde(default)]
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Runtime-reported status.
    pub status: ContainerStatus,
    /// Address on the internal bridge network, if attached.
    #[serde(default)]
    pub address: Option<String>,
    /// Published ports in runtime order.
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    /// Command arguments of the stored configuration.
    #[serde(default)]
    pub args: Vec<String>,
    /// Creation time, when the runtime reports one.
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    /// Project label, if the runtime groups the container.
    #[serde(default)]
    pub project: Option<String>,
    /// Raw runtime configuration, passed through unmodified.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl Container {
    /// Returns whether the container is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.status.is_running()
    }

    /// Returns the name, or the identifier when the container is unnamed.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.id.as_str()
        } else {
            &self.name
        }
    }

    /// Returns the container's current configuration as a run spec.
    #[must_use]
    pub fn run_spec(&self) -> RunSpec {
        RunSpec {
            image: self.image.clone(),
            name: (!self.name.is_empty()).then(|| self.name.clone()),
            args: self.args.clone(),
            ports: self.ports.clone(),
        }
    }
}

/// A named group of related containers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Project name.
    pub name: String,
    /// Member containers in runtime order.
    pub containers: Vec<Container>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_prefixed_and_distinct() {
        let a = ContainerId::generate();
        let b = ContainerId::generate();
        assert!(a.as_str().starts_with("c-"));
        assert_eq!(a.as_str().len(), 14);
        assert_ne!(a, b);
    }

    #[test]
    fn status_normalizes_runtime_spellings() {
        assert_eq!(ContainerStatus::from("running"), ContainerStatus::Running);
        assert_eq!(ContainerStatus::from("Exited"), ContainerStatus::Stopped);
        assert_eq!(
            ContainerStatus::from("paused"),
            ContainerStatus::Other("paused".into())
        );
        assert!(!ContainerStatus::from("created").is_running());
    }

    #[test]
    fn status_serializes_as_plain_string() {
        let json = serde_json::to_string(&ContainerStatus::Running).unwrap();
        assert_eq!(json, "\"Running\"");
    }

    #[test]
    fn port_mapping_parses_text_form() {
        let p: PortMapping = "8080:80".parse().unwrap();
        assert_eq!(p, PortMapping { host: 8080, container: 80 });
        assert_eq!(p.to_string(), "8080:80");
    }

    #[test]
    fn port_mapping_rejects_zero_and_garbage() {
        assert!("0:80".parse::<PortMapping>().is_err());
        assert!("8080".parse::<PortMapping>().is_err());
        assert!("a:b".parse::<PortMapping>().is_err());
        assert!("70000:80".parse::<PortMapping>().is_err());
    }

    #[test]
    fn port_mapping_accepts_any_wire_shape() {
        let ports: Vec<PortMapping> = serde_json::from_str(
            r#"[{"host":1,"container":2},{"Host":3,"Container":4},"5:6"]"#,
        )
        .unwrap();
        assert_eq!(
            ports,
            vec![
                PortMapping { host: 1, container: 2 },
                PortMapping { host: 3, container: 4 },
                PortMapping { host: 5, container: 6 },
            ]
        );
    }

    #[test]
    fn run_spec_requires_image() {
        assert!(RunSpec::new("").validate().is_err());
        assert!(RunSpec::new("   ").validate().is_err());
        assert!(RunSpec::new("alpine").validate().is_ok());
    }

    #[test]
    fn run_spec_defaults_optional_fields() {
        let spec: RunSpec = serde_json::from_str(r#"{"image":"nginx"}"#).unwrap();
        assert_eq!(spec, RunSpec::new("nginx"));
    }

    #[test]
    fn empty_name_clears_it() {
        assert_eq!(RunSpec::new("x").with_name("").name, None);
        assert_eq!(RunSpec::new("x").with_name("web").name.as_deref(), Some("web"));
    }

    #[test]
    fn unnamed_container_displays_its_id() {
        let c = Container {
            id: ContainerId::new("c-1"),
            name: String::new(),
            image: "alpine".into(),
            status: ContainerStatus::Stopped,
            address: None,
            ports: vec![],
            args: vec!["sh".into()],
            created: None,
            project: None,
            raw: serde_json::Value::Null,
        };
        assert_eq!(c.display_name(), "c-1");
        assert_eq!(c.run_spec().name, None);
        assert_eq!(c.run_spec().args, vec!["sh"]);
    }
}
