//! Plugin transforms over stdin/stdout.

use std::io::{self, Read, Write};

use anyhow::{Context as _, Result};
use clap::ValueEnum;
use quire_plugin::{page_before, Block, BlockRenderer, Page};

/// Which transform to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PluginHook {
    /// `page:before`: page JSON in, page JSON out
    Page,
    /// Render a hint or tabs block: block JSON in, HTML out
    Block,
}

/// Apply `hook` to `input`.
pub fn transform(hook: PluginHook, input: &str) -> Result<String> {
    match hook {
        PluginHook::Page => {
            let page: Page = serde_json::from_str(input).context("Invalid page JSON")?;
            Ok(serde_json::to_string(&page_before(page))?)
        }
        PluginHook::Block => {
            let block = Block::from_json(input)?;
            Ok(BlockRenderer::new()?.render(&block)?)
        }
    }
}

/// Run the plugin command.
pub fn run(hook: PluginHook) -> Result<()> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read stdin")?;

    let output = transform(hook, &input)?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
