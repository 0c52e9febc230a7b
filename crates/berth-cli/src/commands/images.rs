//! `berth images` — List local images.

use clap::Args;

use crate::context::Context;

/// Arguments for the `images` command.
#[derive(Args, Debug)]
pub struct ImagesArgs {}

/// Executes the `images` command.
///
/// # Errors
///
/// Returns an error if the runtime cannot list its images.
pub async fn execute(ctx: &Context, _args: ImagesArgs) -> anyhow::Result<()> {
    let images = ctx.coordinator.images().await?;
    if images.is_empty() {
        println!("No images found.");
        return Ok(());
    }
    println!("IMAGE");
    for image in images {
        println!("{image}");
    }
    Ok(())
}
