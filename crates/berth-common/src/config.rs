//! Global configuration model for Berth.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then command-line flags and environment variables applied by the binary.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{BerthError, Result};

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BerthConfig {
    /// Base directory for Berth state.
    pub data_dir: PathBuf,
    /// Seconds between registry refreshes.
    pub refresh_interval_secs: u64,
    /// Container runtime settings.
    pub runtime: RuntimeSettings,
    /// Address translation settings.
    pub network: NetworkSettings,
    /// API gateway settings.
    pub api: ApiSettings,
    /// Port proxy settings.
    pub proxy: ProxySettings,
}

impl Default for BerthConfig {
    fn default() -> Self {
        Self {
            data_dir: constants::data_dir().clone(),
            refresh_interval_secs: constants::DEFAULT_REFRESH_INTERVAL_SECS,
            runtime: RuntimeSettings::default(),
            network: NetworkSettings::default(),
            api: ApiSettings::default(),
            proxy: ProxySettings::default(),
        }
    }
}

impl BerthConfig {
    /// Loads configuration from a TOML file.
    ///
    /// A missing file yields the defaults; keys absent from the file keep
    /// their default values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting configuration is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| BerthError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = Self::from_toml(&content)?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this model or the
    /// configuration fails validation.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| BerthError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field invariants.
    ///
    /// # Errors
    ///
    /// Returns an error if an interval or timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            return Err(BerthError::Config {
                message: "refresh_interval_secs must be at least 1".into(),
            });
        }
        if self.runtime.timeout_secs == 0 {
            return Err(BerthError::Config {
                message: "runtime.timeout_secs must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Returns the refresh interval.
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Returns the bound applied to each runtime call.
    #[must_use]
    pub const fn runtime_timeout(&self) -> Duration {
        Duration::from_secs(self.runtime.timeout_secs)
    }

    /// Returns the path of the staged-configuration file.
    #[must_use]
    pub fn staged_file(&self) -> PathBuf {
        self.data_dir.join(constants::STAGED_FILE)
    }
}

/// Which runtime adapter drives containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// A Docker-compatible command-line client.
    #[default]
    Cli,
    /// The in-process simulated runtime.
    Memory,
}

/// Container runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Adapter to use.
    pub backend: BackendKind,
    /// CLI binary name or path for the `cli` adapter.
    pub binary: String,
    /// Seconds before a runtime call is abandoned.
    pub timeout_secs: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            binary: constants::DEFAULT_RUNTIME_BINARY.into(),
            timeout_secs: constants::DEFAULT_RUNTIME_TIMEOUT_SECS,
        }
    }
}

/// How internal addresses become host-reachable addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostScheme {
    /// Map the bridge prefix onto a loopback prefix, keeping the last octet.
    #[default]
    Loopback,
    /// Bridge addresses are reachable from the host as-is.
    Direct,
}

/// Address translation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Translation scheme.
    pub scheme: HostScheme,
    /// First three octets of the internal bridge network.
    pub bridge_prefix: String,
    /// First three octets of the host loopback range.
    pub loopback_prefix: String,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            scheme: HostScheme::default(),
            bridge_prefix: constants::DEFAULT_BRIDGE_PREFIX.into(),
            loopback_prefix: constants::DEFAULT_LOOPBACK_PREFIX.into(),
        }
    }
}

/// API gateway settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Socket address to listen on.
    pub listen: SocketAddr,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

/// Port proxy settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Forward translated host endpoints to running containers.
    pub enabled: bool,
}
