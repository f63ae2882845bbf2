//! The `page:before` hook.

use serde::{Deserialize, Serialize};

use crate::embed::process_embeds;

/// A page as the generator passes it to hooks.
///
/// Fields the hook does not touch are carried through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

/// Escape text for use inside HTML.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

/// Expand embeds, then prepend the description as a hidden element so
/// client-side navigation can pick it up.
pub fn page_before(mut page: Page) -> Page {
    let mut content = process_embeds(&page.content);

    if let Some(description) = page.description.as_deref().filter(|d| !d.is_empty()) {
        content = format!(
            "<div class=\"page-description-data\" style=\"display:none !important;\">{}</div>\n{}",
            escape_html(description),
            content
        );
    }

    page.content = content;
    page
}
