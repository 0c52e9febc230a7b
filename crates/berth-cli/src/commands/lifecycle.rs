//! `berth start|stop|rm` — Lifecycle commands over one or more containers.

use clap::Args;

use berth_runtime::coordinator::Outcome;

use crate::context::Context;

/// Arguments shared by `start`, `stop`, and `rm`.
#[derive(Args, Debug)]
pub struct LifecycleArgs {
    /// Container IDs or names.
    #[arg(required = true)]
    pub containers: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Start,
    Stop,
    Remove,
}

/// Executes `start`.
///
/// # Errors
///
/// Returns an error if any container could not be started.
pub async fn start(ctx: &Context, args: LifecycleArgs) -> anyhow::Result<()> {
    apply(ctx, args, Action::Start).await
}

/// Executes `stop`.
///
/// # Errors
///
/// Returns an error if any container could not be stopped.
pub async fn stop(ctx: &Context, args: LifecycleArgs) -> anyhow::Result<()> {
    apply(ctx, args, Action::Stop).await
}

/// Executes `rm`.
///
/// # Errors
///
/// Returns an error if any container could not be removed.
pub async fn remove(ctx: &Context, args: LifecycleArgs) -> anyhow::Result<()> {
    apply(ctx, args, Action::Remove).await
}

/// Applies `action` to each container in turn, reporting every failure.
async fn apply(ctx: &Context, args: LifecycleArgs, action: Action) -> anyhow::Result<()> {
    ctx.refreshed().await?;
    let mut failed = 0usize;
    for target in &args.containers {
        match run_one(ctx, target, action).await {
            Ok(message) => println!("{target}: {message}"),
            Err(e) => {
                eprintln!("{target}: {e}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} container(s) failed", args.containers.len());
    }
    Ok(())
}

async fn run_one(ctx: &Context, target: &str, action: Action) -> anyhow::Result<&'static str> {
    let id = ctx.resolve(target)?.id;
    let message = match action {
        Action::Start => describe(ctx.coordinator.start(&id).await?),
        Action::Stop => describe(ctx.coordinator.stop(&id).await?),
        Action::Remove => {
            ctx.coordinator.remove(&id).await?;
            "removed"
        }
    };
    Ok(message)
}

const fn describe(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Done => "done",
        Outcome::AlreadyRunning => "already running",
        Outcome::NotRunning => "not running",
    }
}
