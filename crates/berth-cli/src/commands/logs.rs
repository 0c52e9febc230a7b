//! `berth logs` — Print a container's console output.

use clap::Args;

use crate::context::Context;

/// Arguments for the `logs` command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Container ID or name.
    pub container: String,
}

/// Executes the `logs` command.
///
/// # Errors
///
/// Returns an error if the container is unknown or logs are unavailable.
pub async fn execute(ctx: &Context, args: LogsArgs) -> anyhow::Result<()> {
    ctx.refreshed().await?;
    let container = ctx.resolve(&args.container)?;
    let logs = ctx.coordinator.logs(&container.id).await?;

    if logs.is_empty() {
        println!("No logs available for container: {}", args.container);
    } else {
        print!("{logs}");
    }
    Ok(())
}
