//! Wiring shared by every command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;

use berth_common::config::{BackendKind, BerthConfig};
use berth_common::constants;
use berth_common::types::Container;
use berth_runtime::backend;
use berth_runtime::coordinator::Coordinator;
use berth_runtime::registry::Registry;
use berth_runtime::translate::PortTranslator;

use crate::commands::{BackendArg, Cli};

/// Loaded configuration plus the runtime objects built from it.
pub struct Context {
    /// Effective configuration after overrides.
    pub config: BerthConfig,
    /// Lifecycle coordinator, owning the registry.
    pub coordinator: Arc<Coordinator>,
    /// Host-address translator.
    pub translator: PortTranslator,
}

impl Context {
    /// Loads configuration and builds the runtime stack.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is unreadable or invalid, or
    /// the selected backend cannot be constructed.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let config = effective_config(cli)?;
        let translator = PortTranslator::from_settings(&config.network)?;
        let backend = backend::from_config(&config)?;
        let timeout = config.runtime_timeout();
        let registry = Arc::new(Registry::new(Arc::clone(&backend), timeout));
        let coordinator = Arc::new(Coordinator::new(backend, registry, timeout));
        Ok(Self {
            config,
            coordinator,
            translator,
        })
    }

    /// Registry shortcut.
    pub fn registry(&self) -> &Arc<Registry> {
        self.coordinator.registry()
    }

    /// Refreshes the registry once, for commands that run without a server.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be listed.
    pub async fn refreshed(&self) -> anyhow::Result<()> {
        let _ = self
            .registry()
            .refresh()
            .await
            .context("cannot list containers")?;
        Ok(())
    }

    /// Resolves an id or unique name against a fresh registry.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing matches.
    pub fn resolve(&self, id_or_name: &str) -> anyhow::Result<Container> {
        Ok(self.registry().resolve(id_or_name)?)
    }
}

fn effective_config(cli: &Cli) -> anyhow::Result<BerthConfig> {
    let path = cli.config.clone().unwrap_or_else(|| {
        cli.data_dir
            .clone()
            .unwrap_or_else(|| constants::data_dir().clone())
            .join(constants::CONFIG_FILE)
    });
    let mut config = BerthConfig::load(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    apply_overrides(&mut config, cli.data_dir.clone(), cli.backend, cli.runtime_binary.clone());
    config.validate()?;
    Ok(config)
}

fn apply_overrides(
    config: &mut BerthConfig,
    data_dir: Option<PathBuf>,
    backend: Option<BackendArg>,
    binary: Option<String>,
) {
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    if let Some(backend) = backend {
        config.runtime.backend = match backend {
            BackendArg::Cli => BackendKind::Cli,
            BackendArg::Memory => BackendKind::Memory,
        };
    }
    if let Some(binary) = binary {
        config.runtime.binary = binary;
    }
}
