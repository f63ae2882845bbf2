//! One-shot build command.

use anyhow::{bail, Result};
use quire_build::BuildOutcome;
use quire_server::shutdown_signal;

use super::Context;

/// Run the build command. Ctrl+C kills the build and removes its temp output.
pub async fn run(ctx: &Context) -> Result<()> {
    let executor = ctx.executor().await?;
    tracing::debug!("Build command: {}", executor.command());

    match executor.execute_until(shutdown_signal()).await? {
        BuildOutcome::Success => {}
        BuildOutcome::Cancelled => bail!("Build interrupted"),
        BuildOutcome::Failed { .. } => bail!("Build failed"),
    }

    tracing::info!("Output: {}", executor.layout().output.display());
    Ok(())
}
