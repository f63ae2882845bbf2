//! Preview server command.

use anyhow::{bail, Result};
use quire_server::{shutdown_signal, StaticServer};

use super::Context;

/// Run the preview command.
pub async fn run(ctx: &Context, port: Option<u16>, open: bool) -> Result<()> {
    let layout = ctx.layout();
    if !quire_build::has_output(&layout) {
        bail!("No _book directory found. Run `quire build` first.");
    }

    let mut server = StaticServer::new(ctx.server_config());
    let addr = server.start(&layout.output, ctx.port(port)).await?;
    tracing::info!("Press Ctrl+C to stop the server");

    if open {
        let url = format!("http://{}", addr);
        if let Err(e) = open::that(&url) {
            tracing::debug!("Could not open browser: {}", e);
        }
    }

    shutdown_signal().await;
    server.stop().await;

    Ok(())
}
