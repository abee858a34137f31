//! Overlay configuration
//!
//! Plain data read once at startup. Every field has a default so a settings
//! file only needs the values it changes:
//!
//! ```toml
//! font_size = 18.0
//! alpha_when_not_focused = 0.35
//!
//! [[toggle_visibility]]
//! key_a = "F10"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::OverlayResult;
use crate::key::{HostKey, KeyRemap};

/// One or two physical keys that must be held together
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyPair {
    pub key_a: HostKey,
    pub key_b: HostKey,
}

impl Default for KeyPair {
    fn default() -> Self {
        Self {
            key_a: HostKey::Invalid,
            key_b: HostKey::Invalid,
        }
    }
}

impl KeyPair {
    /// Single-key chord
    pub const fn single(key: HostKey) -> Self {
        Self {
            key_a: key,
            key_b: HostKey::Invalid,
        }
    }

    /// Two-key chord
    pub const fn pair(key_a: HostKey, key_b: HostKey) -> Self {
        Self { key_a, key_b }
    }

    /// True if `key` is one of the valid sides of the chord
    pub fn contains(&self, key: HostKey) -> bool {
        (self.key_a.is_valid() && key == self.key_a) || (self.key_b.is_valid() && key == self.key_b)
    }

    /// True if every valid side is held and at least one side is valid
    pub fn matches(&self, pressed: &[HostKey]) -> bool {
        let sides = [self.key_a, self.key_b];
        let mut valid = sides.iter().filter(|key| key.is_valid()).peekable();
        valid.peek().is_some() && valid.all(|key| pressed.contains(key))
    }
}

/// Host key aliased to another before classification
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAlias {
    pub from: HostKey,
    pub to: HostKey,
}

/// Configuration consumed by the overlay runtime
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    /// Font file or directory of faces; `None` uses the runtime's built-in face
    pub font: Option<PathBuf>,
    pub font_size: f32,
    pub alpha_when_focused: f32,
    pub alpha_when_not_focused: f32,
    pub blur_strength: f32,
    pub toggle_demos: Vec<KeyPair>,
    pub toggle_visibility: Vec<KeyPair>,
    pub toggle_controls: Vec<KeyPair>,
    pub default_visibility: bool,
    pub default_controls: bool,
    /// Let the immediate-mode layer draw its own cursor while focused
    pub draw_cursor: bool,
    pub include_demos: bool,
    pub key_aliases: Vec<KeyAlias>,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            font: None,
            font_size: 16.0,
            alpha_when_focused: 1.0,
            alpha_when_not_focused: 0.5,
            blur_strength: 1.0,
            toggle_demos: vec![
                KeyPair::single(HostKey::PageUp),
                KeyPair::pair(HostKey::GamepadSpecialLeft, HostKey::GamepadDPadRight),
            ],
            toggle_visibility: vec![
                KeyPair::single(HostKey::Home),
                KeyPair::pair(HostKey::GamepadSpecialLeft, HostKey::GamepadDPadDown),
            ],
            toggle_controls: vec![
                KeyPair::single(HostKey::Insert),
                KeyPair::pair(HostKey::GamepadSpecialLeft, HostKey::GamepadDPadUp),
            ],
            default_visibility: true,
            default_controls: false,
            draw_cursor: true,
            include_demos: true,
            key_aliases: Vec::new(),
        }
    }
}

impl OverlaySettings {
    /// Parse settings from TOML text
    pub fn from_toml_str(text: &str) -> OverlayResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> OverlayResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&text)?;
        tracing::debug!(target: "dear-imgui-overlay", "Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Alias table for the input routers
    pub fn key_remap(&self) -> KeyRemap {
        KeyRemap::new(self.key_aliases.iter().map(|alias| (alias.from, alias.to)))
    }
}
