//! Block templates.

use minijinja::{context, Environment};

use crate::hint::HintStyle;
use crate::tabs::TabView;
use crate::PluginError;

const HINT_TEMPLATE: &str = r##"<div class="hint hint-{{ style }}">
<div class="hint-icon">{{ icon }}</div>
<div class="hint-content">{{ body }}</div>
</div>"##;

const TABS_TEMPLATE: &str = r##"<div class="tabs-container">
<div class="tabs-header">
{%- for tab in tabs -%}
<div class="tab{% if loop.first %} active{% endif %}" data-tab="{{ loop.index0 }}">{{ tab.title }}</div>
{%- endfor -%}
</div>
<div class="tabs-body">
{%- for tab in tabs -%}
<div class="tab-content{% if loop.first %} active{% endif %}" data-tab="{{ loop.index0 }}">{{ tab.body }}</div>
{%- endfor -%}
</div>
</div>"##;

/// Templates for the block HTML.
///
/// Template names carry no `.html` suffix, so values are inserted verbatim:
/// bodies arrive as rendered HTML and titles as authored.
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, PluginError> {
        let mut env = Environment::new();
        env.add_template("hint", HINT_TEMPLATE)?;
        env.add_template("tabs", TABS_TEMPLATE)?;
        Ok(Self { env })
    }

    pub fn hint(&self, style: HintStyle, body: &str) -> Result<String, PluginError> {
        let tmpl = self.env.get_template("hint")?;
        Ok(tmpl.render(context! {
            style => style.as_str(),
            icon => style.icon(),
            body => body,
        })?)
    }

    pub fn tabs(&self, tabs: &[TabView]) -> Result<String, PluginError> {
        let tmpl = self.env.get_template("tabs")?;
        Ok(tmpl.render(context! { tabs => tabs })?)
    }
}
