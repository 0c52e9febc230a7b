//! CLI command definitions and dispatch.

pub mod clone;
pub mod images;
pub mod lifecycle;
pub mod logs;
pub mod ps;
pub mod run;
pub mod serve;
pub mod update;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::context::Context;

/// Berth — container lifecycle control for a dashboard or the terminal.
#[derive(Parser, Debug)]
#[command(name = "berth", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to the configuration file.
    #[arg(long, global = true, env = "BERTH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for Berth state.
    #[arg(long, global = true, env = "BERTH_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Runtime adapter to use.
    #[arg(long, global = true, env = "BERTH_BACKEND", value_enum)]
    pub backend: Option<BackendArg>,

    /// Docker-compatible client binary for the `cli` backend.
    #[arg(long, global = true, env = "BERTH_RUNTIME_BINARY")]
    pub runtime_binary: Option<String>,

    /// Log output format.
    #[arg(long, global = true, env = "BERTH_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Log output format.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Runtime adapter selectable from the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendArg {
    /// Docker-compatible command-line client.
    Cli,
    /// In-process simulated runtime.
    Memory,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP API and keep the registry refreshed.
    Serve(serve::ServeArgs),
    /// List containers grouped by project.
    Ps(ps::PsArgs),
    /// List local images.
    Images(images::ImagesArgs),
    /// Print a container's console output.
    Logs(logs::LogsArgs),
    /// Create and start a new container.
    Run(run::RunArgs),
    /// Start stopped containers.
    Start(lifecycle::LifecycleArgs),
    /// Stop running containers.
    Stop(lifecycle::LifecycleArgs),
    /// Remove stopped containers.
    Rm(lifecycle::LifecycleArgs),
    /// Replace a container's configuration, applied on next start.
    Update(update::UpdateArgs),
    /// Print, or run, a copy of a container's configuration.
    Clone(clone::CloneArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded or the command fails.
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let ctx = Context::load(&cli)?;
    match cli.command {
        Command::Serve(args) => serve::execute(ctx, args).await,
        Command::Ps(args) => ps::execute(&ctx, args).await,
        Command::Images(args) => images::execute(&ctx, args).await,
        Command::Logs(args) => logs::execute(&ctx, args).await,
        Command::Run(args) => run::execute(&ctx, args).await,
        Command::Start(args) => lifecycle::start(&ctx, args).await,
        Command::Stop(args) => lifecycle::stop(&ctx, args).await,
        Command::Rm(args) => lifecycle::remove(&ctx, args).await,
        Command::Update(args) => update::execute(&ctx, args).await,
        Command::Clone(args) => clone::execute(&ctx, args).await,
    }
}
