//! Markdown and block rendering.

use pulldown_cmark::{html, Options, Parser};

use crate::block::Block;
use crate::tabs::tab_views;
use crate::templates::Templates;
use crate::PluginError;

/// Turns a markdown fragment into HTML.
pub trait MarkdownRenderer {
    fn render(&self, markdown: &str) -> String;
}

/// CommonMark with the usual GitHub extensions.
#[derive(Debug, Clone, Copy)]
pub struct CmarkRenderer {
    options: Options,
}

impl Default for CmarkRenderer {
    fn default() -> Self {
        Self {
            options: Options::ENABLE_TABLES
                | Options::ENABLE_FOOTNOTES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS,
        }
    }
}

impl MarkdownRenderer for CmarkRenderer {
    fn render(&self, markdown: &str) -> String {
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, Parser::new_ext(markdown, self.options));
        out
    }
}

/// Renders validated blocks to HTML.
pub struct BlockRenderer<R = CmarkRenderer> {
    markdown: R,
    templates: Templates,
}

impl BlockRenderer<CmarkRenderer> {
    pub fn new() -> Result<Self, PluginError> {
        Self::with_markdown(CmarkRenderer::default())
    }
}

impl<R: MarkdownRenderer> BlockRenderer<R> {
    pub fn with_markdown(markdown: R) -> Result<Self, PluginError> {
        Ok(Self {
            markdown,
            templates: Templates::new()?,
        })
    }

    pub fn render(&self, block: &Block) -> Result<String, PluginError> {
        match block {
            Block::Hint { style, body } => {
                let body = self.markdown.render(body);
                self.templates.hint(*style, &body)
            }
            Block::Tabs(tabs) => self.templates.tabs(&tab_views(tabs, &self.markdown)),
        }
    }
}
