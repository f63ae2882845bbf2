//! Watch-and-serve command.

use anyhow::Result;
use quire_server::{shutdown_signal, BuildManager, ManagerConfig, WatchFilter};

use super::Context;

/// Run the serve command.
pub async fn run(ctx: &Context, port: Option<u16>, open: bool) -> Result<()> {
    let executor = ctx.executor().await?;

    let config = ManagerConfig {
        port: ctx.port(port),
        timings: ctx.timings(),
        server: ctx.server_config(),
        open,
    };
    tracing::info!("Starting server on port {}", config.port);

    let manager = BuildManager::new(executor, WatchFilter::for_book(&ctx.root)?, config);
    manager.run(&ctx.prompt, shutdown_signal()).await?;

    Ok(())
}
