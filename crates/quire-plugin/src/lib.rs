//! Hint, tab and embed blocks for gitbook pages.
//!
//! Everything here is a pure string transform: blocks and pages come in as
//! JSON-shaped values and leave as HTML.

pub mod block;
pub mod embed;
pub mod hint;
pub mod page;
pub mod render;
pub mod tabs;
pub mod templates;

pub use block::{Block, Kwargs, RawBlock, Tab};
pub use embed::{embed_html, process_embeds};
pub use hint::HintStyle;
pub use page::{escape_html, page_before, Page};
pub use render::{BlockRenderer, CmarkRenderer, MarkdownRenderer};

/// Errors from plugin input or rendering.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown block `{0}`")]
    UnknownBlock(String),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}
