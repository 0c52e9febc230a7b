//! `berth ps` — List containers grouped by project.

use clap::Args;

use crate::context::Context;
use crate::output::{format_age, format_ports, truncate};

/// Arguments for the `ps` command.
#[derive(Args, Debug)]
pub struct PsArgs {
    /// Show all containers (including stopped).
    #[arg(short, long)]
    pub all: bool,

    /// Only show containers of this project.
    #[arg(long)]
    pub project: Option<String>,

    /// Print the raw project list as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `ps` command.
///
/// # Errors
///
/// Returns an error if the runtime cannot be listed.
pub async fn execute(ctx: &Context, args: PsArgs) -> anyhow::Result<()> {
    ctx.refreshed().await?;
    let snapshot = ctx.registry().snapshot();

    let projects: Vec<_> = snapshot
        .projects
        .iter()
        .filter(|p| args.project.as_deref().is_none_or(|name| p.name == name))
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&projects)?);
        return Ok(());
    }

    let now = chrono::Utc::now();
    let mut shown = 0usize;
    for project in projects {
        let rows: Vec<_> = project
            .containers
            .iter()
            .filter(|c| args.all || c.is_running())
            .collect();
        if rows.is_empty() {
            continue;
        }
        if shown > 0 {
            println!();
        }
        println!("[{}]", project.name);
        println!(
            "{:<16} {:<20} {:<24} {:<10} {:<16} {:<18} {:<6}",
            "CONTAINER ID", "NAME", "IMAGE", "STATUS", "HOST ADDRESS", "PORTS", "AGE"
        );
        for c in rows {
            let host = c
                .address
                .as_deref()
                .map_or_else(|| "-".to_string(), |a| ctx.translator.translate(a).to_string());
            println!(
                "{:<16} {:<20} {:<24} {:<10} {:<16} {:<18} {:<6}",
                c.id,
                truncate(&c.name, 20),
                truncate(&c.image, 24),
                c.status,
                host,
                format_ports(&c.ports),
                format_age(c.created, now),
            );
            shown += 1;
        }
    }

    if shown == 0 {
        println!("No containers found.");
    }
    Ok(())
}
