//! `berth run` — Create and start a new container.

use clap::Args;

use berth_common::types::{PortMapping, RunSpec};
use berth_runtime::command;

use crate::context::Context;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Container name.
    #[arg(long)]
    pub name: Option<String>,

    /// Publish a port as HOST:CONTAINER (repeatable).
    #[arg(short, long)]
    pub publish: Vec<PortMapping>,

    /// Command line to split into arguments, instead of trailing args.
    #[arg(long, conflicts_with = "args")]
    pub command: Option<String>,

    /// Image reference.
    pub image: String,

    /// Arguments passed to the container.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl RunArgs {
    /// Builds the run spec described by these arguments.
    #[must_use]
    pub fn to_spec(&self) -> RunSpec {
        let args = self
            .command
            .as_deref()
            .map_or_else(|| self.args.clone(), command::parse);
        RunSpec {
            image: self.image.clone(),
            name: self.name.clone().filter(|n| !n.is_empty()),
            args,
            ports: self.publish.clone(),
        }
    }
}

/// Executes the `run` command and prints the new container's id.
///
/// # Errors
///
/// Returns an error if the spec is invalid or the runtime fails.
pub async fn execute(ctx: &Context, args: RunArgs) -> anyhow::Result<()> {
    let id = ctx.coordinator.run(args.to_spec()).await?;
    println!("{id}");
    Ok(())
}
