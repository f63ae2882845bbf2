//! quire: build, watch and serve gitbook documentation sites.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

use commands::plugin::PluginHook;
use commands::Context;

#[derive(Parser)]
#[command(name = "quire")]
#[command(about = "Build, watch and serve gitbook documentation sites")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Project root containing the book
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Path to quire.toml, relative to the project root
    #[arg(short, long, global = true, default_value = "quire.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Answer yes to every prompt
    #[arg(short, long, global = true)]
    yes: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the Node.js runtime and gitbook-cli
    Setup,

    /// Build the book into _book (default)
    Build,

    /// Build, serve and rebuild on change
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Open a browser once serving
        #[arg(long)]
        open: bool,
    },

    /// Serve the existing _book without building
    Preview {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Open a browser once serving
        #[arg(long)]
        open: bool,
    },

    /// Stop leftover servers on the port
    Stop {
        /// Port to free
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run a plugin transform on JSON from stdin
    Plugin {
        #[arg(value_enum)]
        hook: PluginHook,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let load = || Context::load(&cli.root, &cli.config, cli.verbose, cli.yes);

    match cli.command.unwrap_or(Commands::Build) {
        Commands::Setup => commands::setup::run(&load()?).await?,
        Commands::Build => commands::build::run(&load()?).await?,
        Commands::Serve { port, open } => commands::serve::run(&load()?, port, open).await?,
        Commands::Preview { port, open } => commands::preview::run(&load()?, port, open).await?,
        Commands::Stop { port } => commands::stop::run(&load()?, port).await?,
        // Plugin transforms only read stdin; no project or config involved.
        Commands::Plugin { hook } => commands::plugin::run(hook)?,
    }

    Ok(())
}
