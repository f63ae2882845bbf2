//! Block input as handed over by the generator, and its validated form.

use serde::Deserialize;

use crate::hint::HintStyle;
use crate::PluginError;

/// Keyword arguments on a block tag, e.g. `{% hint style="warning" %}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Kwargs {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub style: Option<String>,
}

/// A block exactly as the generator describes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawBlock {
    pub name: String,

    #[serde(default)]
    pub kwargs: Option<Kwargs>,

    #[serde(default)]
    pub body: Option<String>,

    /// Child blocks, for blocks like `tabs` that contain `tab` sections
    #[serde(default)]
    pub blocks: Vec<RawBlock>,
}

impl RawBlock {
    fn kwargs(&self) -> Kwargs {
        self.kwargs.clone().unwrap_or_default()
    }
}

/// One section of a `tabs` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub title: Option<String>,
    pub body: String,
}

/// A block the plugin knows how to render.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawBlock")]
pub enum Block {
    Hint { style: HintStyle, body: String },
    Tabs(Vec<Tab>),
}

impl Block {
    pub fn from_json(json: &str) -> Result<Self, PluginError> {
        let raw: RawBlock = serde_json::from_str(json)?;
        Self::try_from(raw)
    }
}

impl TryFrom<RawBlock> for Block {
    type Error = PluginError;

    fn try_from(raw: RawBlock) -> Result<Self, Self::Error> {
        match raw.name.as_str() {
            "hint" => {
                let style = raw.kwargs().style.as_deref().map(HintStyle::parse);
                Ok(Self::Hint {
                    style: style.unwrap_or_default(),
                    body: raw.body.unwrap_or_default(),
                })
            }
            // Only `tab` children carry content; `endtab` markers are dropped.
            "tabs" => Ok(Self::Tabs(
                raw.blocks
                    .into_iter()
                    .filter(|b| b.name == "tab")
                    .map(|b| Tab {
                        title: b.kwargs().title,
                        body: b.body.unwrap_or_default(),
                    })
                    .collect(),
            )),
            other => Err(PluginError::UnknownBlock(other.to_string())),
        }
    }
}
