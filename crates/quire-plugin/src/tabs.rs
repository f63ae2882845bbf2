//! Tabbed sections.

use serde::Serialize;

use crate::block::Tab;
use crate::render::MarkdownRenderer;

/// A tab ready for the template: resolved title and rendered body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabView {
    pub title: String,
    pub body: String,
}

/// Title shown for the tab at `index`, numbered from one when untitled.
pub fn tab_title(index: usize, title: Option<&str>) -> String {
    match title {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => format!("Tab {}", index + 1),
    }
}

/// Resolve titles and render bodies. Empty bodies stay empty.
pub fn tab_views<R: MarkdownRenderer + ?Sized>(tabs: &[Tab], markdown: &R) -> Vec<TabView> {
    tabs.iter()
        .enumerate()
        .map(|(i, tab)| TabView {
            title: tab_title(i, tab.title.as_deref()),
            body: if tab.body.is_empty() {
                String::new()
            } else {
                markdown.render(&tab.body)
            },
        })
        .collect()
}
