//! Toolchain setup command.

use anyhow::Result;
use quire_build::Confirm;

use super::Context;

/// Run the setup command.
pub async fn run(ctx: &Context) -> Result<()> {
    let resolver = ctx.resolver();
    let runtime = resolver.ensure_ready(&ctx.prompt).await?;

    tracing::info!("Checking for gitbook-cli...");
    let toolchain = ctx.toolchain();

    if toolchain.is_installed() {
        tracing::info!("✓ gitbook-cli is installed");
    } else {
        if !ctx.prompt.confirm("gitbook-cli is not installed. Install it now?") {
            tracing::info!("Skipped. Install manually with:");
            tracing::info!(
                "  {}",
                runtime.wrap(&format!(
                    "cd {} && npm install gitbook-cli@{}",
                    toolchain.dir().display(),
                    ctx.config.runtime.gitbook_cli_version
                ))
            );
            return Ok(());
        }
        toolchain.install(&runtime).await?;
    }

    tracing::info!("✓ Setup complete! You can now run:");
    tracing::info!("  quire build   # Build the docs");
    tracing::info!("  quire serve   # Build and serve with live rebuilds");
    Ok(())
}
