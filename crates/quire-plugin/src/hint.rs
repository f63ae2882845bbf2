//! Hint callouts.

use serde::Serialize;

/// Visual style of a hint block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HintStyle {
    #[default]
    Info,
    Warning,
    Danger,
    Success,
}

impl HintStyle {
    /// Parse a style name. Anything unrecognised is `Info`.
    pub fn parse(style: &str) -> Self {
        match style {
            "warning" => Self::Warning,
            "danger" => Self::Danger,
            "success" => Self::Success,
            _ => Self::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Danger => "danger",
            Self::Success => "success",
        }
    }

    /// HTML entity shown next to the hint.
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Info => "&#9432;",
            Self::Warning | Self::Danger => "&#9888;",
            Self::Success => "&#10003;",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Danger => "Danger",
            Self::Success => "Success",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_styles() {
        assert_eq!(HintStyle::parse("info"), HintStyle::Info);
        assert_eq!(HintStyle::parse("warning"), HintStyle::Warning);
        assert_eq!(HintStyle::parse("danger"), HintStyle::Danger);
        assert_eq!(HintStyle::parse("success"), HintStyle::Success);
    }

    #[test]
    fn unknown_styles_fall_back_to_info() {
        assert_eq!(HintStyle::parse("tip"), HintStyle::Info);
        assert_eq!(HintStyle::parse(""), HintStyle::Info);
        assert_eq!(HintStyle::parse("WARNING"), HintStyle::Info);
    }

    #[test]
    fn warning_and_danger_share_an_icon() {
        assert_eq!(HintStyle::Warning.icon(), HintStyle::Danger.icon());
        assert_eq!(HintStyle::Info.icon(), "&#9432;");
        assert_eq!(HintStyle::Success.icon(), "&#10003;");
        assert_eq!(HintStyle::Danger.title(), "Danger");
    }
}
