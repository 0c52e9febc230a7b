//! System-wide constants and default paths.

use std::path::PathBuf;
use std::sync::OnceLock;

/// Fallback data directory when no home directory is available.
pub const SYSTEM_DATA_DIR: &str = "/var/lib/berth";

/// Returns the data directory, preferring `$HOME/.berth`, falling back to
/// `/var/lib/berth`.
fn resolve_data_dir() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_or_else(|_| PathBuf::from(SYSTEM_DATA_DIR), |home| PathBuf::from(home).join(".berth"))
}

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the resolved data directory for this session.
pub fn data_dir() -> &'static PathBuf {
    DATA_DIR.get_or_init(resolve_data_dir)
}

/// Name of the configuration file inside the data directory.
pub const CONFIG_FILE: &str = "berth.toml";

/// Name of the staged-configuration file used by the CLI runtime backend.
pub const STAGED_FILE: &str = "staged.json";

/// Label carrying the Berth identifier on runtime containers.
pub const ID_LABEL: &str = "io.berth.id";

/// Label the runtime uses to group containers into compose projects.
pub const PROJECT_LABEL: &str = "com.docker.compose.project";

/// Project that containers without a project label belong to.
pub const DEFAULT_PROJECT: &str = "default";

/// Host address returned when an internal address cannot be translated.
pub const DEFAULT_HOST_ADDRESS: std::net::Ipv4Addr = std::net::Ipv4Addr::LOCALHOST;

/// Default bridge network prefix (first three octets).
pub const DEFAULT_BRIDGE_PREFIX: &str = "10.10.0";

/// Default host loopback prefix (first three octets).
pub const DEFAULT_LOOPBACK_PREFIX: &str = "127.0.0";

/// Default interval between registry refreshes, in seconds.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 3;

/// Default bound on a single runtime call, in seconds.
pub const DEFAULT_RUNTIME_TIMEOUT_SECS: u64 = 30;

/// Default listen address of the API gateway.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:3000";

/// Default Docker-compatible CLI binary.
pub const DEFAULT_RUNTIME_BINARY: &str = "docker";

/// Suffix appended to a cloned container's name.
pub const CLONE_SUFFIX: &str = "-copy";

/// Application name used in CLI output.
pub const APP_NAME: &str = "berth";
