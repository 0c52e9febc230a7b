//! `berth serve` — Run the HTTP API with scheduled refresh.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Args;
use tokio::sync::watch;

use berth_api::AppState;
use berth_runtime::proxy::ProxyManager;
use berth_runtime::refresh::Refresher;

use crate::context::Context;

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "BERTH_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Forward translated host endpoints to running containers.
    #[arg(long)]
    pub proxy: bool,
}

/// Executes the `serve` command.
///
/// Refreshes the registry on a fixed interval and serves the API until
/// interrupted; both stop together on Ctrl-C.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn execute(ctx: Context, args: ServeArgs) -> anyhow::Result<()> {
    let listen = args.listen.unwrap_or(ctx.config.api.listen);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut refresher = Refresher::new(Arc::clone(ctx.registry()), ctx.config.refresh_interval());
    if args.proxy || ctx.config.proxy.enabled {
        tracing::info!(scheme = ?ctx.translator.scheme(), "port proxy enabled");
        refresher = refresher.with_proxy(Arc::new(ProxyManager::new(ctx.translator)));
    }
    let refresher = refresher.spawn(shutdown_rx);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("binding {listen}"))?;
    let state = AppState {
        coordinator: Arc::clone(&ctx.coordinator),
        translator: ctx.translator,
    };

    let served = berth_api::serve(listener, state, async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for shutdown signal");
            return;
        }
        tracing::info!("shutdown requested");
    })
    .await;

    let _ = shutdown_tx.send(true);
    if let Err(e) = refresher.await {
        tracing::warn!(error = %e, "refresher task ended abnormally");
    }
    served.context("api server failed")?;
    tracing::info!("berth stopped");
    Ok(())
}
