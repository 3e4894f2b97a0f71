#![forbid(unsafe_code)]

//! Mount-time configuration.

use std::fmt;

use mida_core::RevealConfig;
use serde::Deserialize;

/// Where to find the page's pieces, plus reveal timings.
///
/// Every field has a default matching the stock markup, so `{}` (or no
/// options at all) mounts the standard page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MountOptions {
    /// Selector for token elements, in page order.
    pub token_selector: String,
    /// Attribute on a token that carries its letter.
    pub letter_attribute: String,
    pub tick_id: String,
    pub noise_id: String,
    pub panel_id: String,
    pub subliminal_id: String,
    /// Selector for layers, scoped to the subliminal container.
    pub layer_selector: String,
    /// Root of the takeover rewrite. Falls back to `<body>` when absent.
    pub root_id: String,
    /// Attribute that shields a subtree from the takeover when set to `"true"`.
    pub protect_attribute: String,
    pub reveal: RevealConfig,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            token_selector: ".token".to_owned(),
            letter_attribute: "data-letter".to_owned(),
            tick_id: "tick".to_owned(),
            noise_id: "glitchNoise".to_owned(),
            panel_id: "revealPanel".to_owned(),
            subliminal_id: "subliminal".to_owned(),
            layer_selector: ".subliminal-layer".to_owned(),
            root_id: "pageRoot".to_owned(),
            protect_attribute: "data-protect".to_owned(),
            reveal: RevealConfig::default(),
        }
    }
}

/// Rejected mount options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionsError {
    /// Not valid JSON, or a field had the wrong type.
    Invalid(String),
}

impl fmt::Display for OptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(msg) => write!(f, "invalid mount options: {msg}"),
        }
    }
}

impl std::error::Error for OptionsError {}

impl MountOptions {
    /// Parse options from JSON. `null` and blank input give the defaults.
    pub fn from_json(json: &str) -> Result<Self, OptionsError> {
        let trimmed = json.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(Self::default());
        }
        serde_json::from_str(trimmed).map_err(|err| OptionsError::Invalid(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_input_gives_defaults() {
        assert_eq!(MountOptions::from_json("").unwrap(), MountOptions::default());
        assert_eq!(MountOptions::from_json("null").unwrap(), MountOptions::default());
        assert_eq!(MountOptions::from_json("{}").unwrap(), MountOptions::default());
    }

    #[test]
    fn partial_options_keep_other_defaults() {
        let opts = MountOptions::from_json(
            r#"{"rootId": "story", "reveal": {"reveal_delay_ms": 1000}}"#,
        )
        .unwrap();
        assert_eq!(opts.root_id, "story");
        assert_eq!(opts.token_selector, ".token");
        assert_eq!(opts.reveal.reveal_delay_ms, 1000);
        assert_eq!(opts.reveal.fallback_delay_ms, 200);
    }

    #[test]
    fn wrong_type_is_rejected() {
        let err = MountOptions::from_json(r#"{"tickId": 4}"#).unwrap_err();
        assert!(err.to_string().starts_with("invalid mount options"));
    }
}
