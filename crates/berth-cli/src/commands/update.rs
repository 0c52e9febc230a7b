//! `berth update` — Replace a container's stored configuration.

use clap::Args;

use berth_common::types::{PortMapping, RunSpec};
use berth_runtime::command;

use crate::context::Context;

/// Arguments for the `update` command.
///
/// The new configuration replaces the old one wholesale, except that an
/// omitted image or name keeps the current value.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Container ID or name.
    pub container: String,

    /// New image reference.
    #[arg(long)]
    pub image: Option<String>,

    /// New container name.
    #[arg(long)]
    pub name: Option<String>,

    /// Publish a port as HOST:CONTAINER (repeatable).
    #[arg(short, long)]
    pub publish: Vec<PortMapping>,

    /// Command line to split into arguments, instead of trailing args.
    #[arg(long, conflicts_with = "args")]
    pub command: Option<String>,

    /// New container arguments.
    #[arg(last = true)]
    pub args: Vec<String>,
}

/// Executes the `update` command.
///
/// # Errors
///
/// Returns an error if the container is unknown, busy, or the runtime
/// rejects the change.
pub async fn execute(ctx: &Context, args: UpdateArgs) -> anyhow::Result<()> {
    ctx.refreshed().await?;
    let container = ctx.resolve(&args.container)?;
    let spec = RunSpec {
        image: args.image.unwrap_or_default(),
        name: args.name.filter(|n| !n.is_empty()),
        args: args.command.as_deref().map_or(args.args, command::parse),
        ports: args.publish,
    };
    ctx.coordinator.update(&container.id, spec).await?;
    println!("{}: updated, applies on next start", container.id);
    Ok(())
}
