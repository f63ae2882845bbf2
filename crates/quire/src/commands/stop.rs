//! Stop leftover servers.

use anyhow::Result;

use super::Context;

/// Run the stop command.
pub async fn run(ctx: &Context, port: Option<u16>) -> Result<()> {
    tracing::info!("Stopping any running gitbook servers...");

    let killed =
        quire_build::reap_server_ports(ctx.port(port), ctx.config.server.livereload_port).await;
    tracing::debug!("Killed {} process(es)", killed.len());

    tracing::info!("✓ Servers stopped");
    Ok(())
}
