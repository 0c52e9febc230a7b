//! `berth clone` — Derive a copy of a container's configuration.

use clap::Args;

use crate::context::Context;

/// Arguments for the `clone` command.
#[derive(Args, Debug)]
pub struct CloneArgs {
    /// Container ID or name.
    pub container: String,

    /// Run the copy instead of printing its spec.
    #[arg(long)]
    pub run: bool,
}

/// Executes the `clone` command.
///
/// Only the first published port is carried into the copy.
///
/// # Errors
///
/// Returns an error if the container is unknown or running the copy fails.
pub async fn execute(ctx: &Context, args: CloneArgs) -> anyhow::Result<()> {
    ctx.refreshed().await?;
    let source = ctx.resolve(&args.container)?;
    let spec = ctx.coordinator.clone_spec(&source.id)?;
    if args.run {
        let id = ctx.coordinator.run(spec).await?;
        println!("{id}");
    } else {
        println!("{}", serde_json::to_string_pretty(&spec)?);
    }
    Ok(())
}
