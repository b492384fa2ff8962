//! Modifier key definitions and state tracking
//!
//! Provides the eight side-specific modifier keys, the side-independent
//! flags the hotkey backend works with, and decomposition of the raw
//! CGEventFlags word into per-side key state.

use serde::{Deserialize, Serialize};

use super::backend::KeyParseError;
use super::trigger::TriggerKeySet;

/// Modifier flag masks from macOS CGEventFlags
pub mod flags {
    /// Shift key modifier flag (either side)
    pub const SHIFT: u64 = 0x0002_0000;
    /// Control key modifier flag (either side)
    pub const CONTROL: u64 = 0x0004_0000;
    /// Option/Alt key modifier flag (either side)
    pub const OPTION: u64 = 0x0008_0000;
    /// Command key modifier flag (either side)
    pub const COMMAND: u64 = 0x0010_0000;

    // Device-dependent bits, reported alongside the flags above.
    pub const LEFT_CONTROL: u64 = 0x0000_0001;
    pub const LEFT_SHIFT: u64 = 0x0000_0002;
    pub const RIGHT_SHIFT: u64 = 0x0000_0004;
    pub const LEFT_COMMAND: u64 = 0x0000_0008;
    pub const RIGHT_COMMAND: u64 = 0x0000_0010;
    pub const LEFT_OPTION: u64 = 0x0000_0020;
    pub const RIGHT_OPTION: u64 = 0x0000_0040;
    pub const RIGHT_CONTROL: u64 = 0x0000_2000;
}

/// Side-independent logical modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Shift,
    Control,
    Option,
    Command,
}

impl Modifier {
    /// Display glyph used in compact renderings
    pub fn glyph(self) -> &'static str {
        match self {
            Modifier::Shift => "⇧",
            Modifier::Control => "⌃",
            Modifier::Option => "⌥",
            Modifier::Command => "⌘",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Modifier::Shift => "Shift",
            Modifier::Control => "Control",
            Modifier::Option => "Option",
            Modifier::Command => "Command",
        }
    }

    /// Side-independent mask bit in the raw flags word
    fn mask(self) -> u64 {
        match self {
            Modifier::Shift => flags::SHIFT,
            Modifier::Control => flags::CONTROL,
            Modifier::Option => flags::OPTION,
            Modifier::Command => flags::COMMAND,
        }
    }
}

/// One of the eight physical modifier keys.
///
/// Declaration order is the canonical display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKey {
    LeftShift,
    LeftControl,
    LeftOption,
    LeftCommand,
    RightCommand,
    RightOption,
    RightControl,
    RightShift,
}

impl ModifierKey {
    pub const ALL: [ModifierKey; 8] = [
        ModifierKey::LeftShift,
        ModifierKey::LeftControl,
        ModifierKey::LeftOption,
        ModifierKey::LeftCommand,
        ModifierKey::RightCommand,
        ModifierKey::RightOption,
        ModifierKey::RightControl,
        ModifierKey::RightShift,
    ];

    /// The logical modifier this key produces
    pub fn modifier(self) -> Modifier {
        match self {
            ModifierKey::LeftShift | ModifierKey::RightShift => Modifier::Shift,
            ModifierKey::LeftControl | ModifierKey::RightControl => Modifier::Control,
            ModifierKey::LeftOption | ModifierKey::RightOption => Modifier::Option,
            ModifierKey::LeftCommand | ModifierKey::RightCommand => Modifier::Command,
        }
    }

    pub fn is_left(self) -> bool {
        matches!(
            self,
            ModifierKey::LeftShift
                | ModifierKey::LeftControl
                | ModifierKey::LeftOption
                | ModifierKey::LeftCommand
        )
    }

    /// The same logical modifier on the other side of the keyboard
    pub fn sibling(self) -> ModifierKey {
        match self {
            ModifierKey::LeftShift => ModifierKey::RightShift,
            ModifierKey::LeftControl => ModifierKey::RightControl,
            ModifierKey::LeftOption => ModifierKey::RightOption,
            ModifierKey::LeftCommand => ModifierKey::RightCommand,
            ModifierKey::RightCommand => ModifierKey::LeftCommand,
            ModifierKey::RightOption => ModifierKey::LeftOption,
            ModifierKey::RightControl => ModifierKey::LeftControl,
            ModifierKey::RightShift => ModifierKey::LeftShift,
        }
    }

    pub fn glyph(self) -> &'static str {
        self.modifier().glyph()
    }

    /// Glyph with a side marker, e.g. `‹⌘` or `⌘›`
    pub fn directional_glyph(self) -> String {
        if self.is_left() {
            format!("‹{}", self.glyph())
        } else {
            format!("{}›", self.glyph())
        }
    }

    pub fn name(self) -> String {
        let side = if self.is_left() { "Left" } else { "Right" };
        format!("{} {}", side, self.modifier().name())
    }

    /// Bit used by the packed representations in this module and `trigger`
    pub(crate) fn bit(self) -> u8 {
        1u8 << (self as u8)
    }

    fn device_mask(self) -> u64 {
        match self {
            ModifierKey::LeftShift => flags::LEFT_SHIFT,
            ModifierKey::LeftControl => flags::LEFT_CONTROL,
            ModifierKey::LeftOption => flags::LEFT_OPTION,
            ModifierKey::LeftCommand => flags::LEFT_COMMAND,
            ModifierKey::RightCommand => flags::RIGHT_COMMAND,
            ModifierKey::RightOption => flags::RIGHT_OPTION,
            ModifierKey::RightControl => flags::RIGHT_CONTROL,
            ModifierKey::RightShift => flags::RIGHT_SHIFT,
        }
    }
}

/// Accepts `left_command`, `right-option`, `rcmd`, `lshift` and friends
impl std::str::FromStr for ModifierKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let (left, rest) = if let Some(rest) = normalized.strip_prefix("left_") {
            (true, rest)
        } else if let Some(rest) = normalized.strip_prefix("right_") {
            (false, rest)
        } else if let Some(rest) = normalized.strip_prefix('l') {
            (true, rest)
        } else if let Some(rest) = normalized.strip_prefix('r') {
            (false, rest)
        } else {
            return Err(KeyParseError::UnknownModifier(s.to_string()));
        };

        let key = match rest {
            "shift" => ModifierKey::LeftShift,
            "control" | "ctrl" | "ctl" => ModifierKey::LeftControl,
            "option" | "alt" | "opt" => ModifierKey::LeftOption,
            "command" | "cmd" => ModifierKey::LeftCommand,
            _ => return Err(KeyParseError::UnknownModifier(s.to_string())),
        };
        Ok(if left { key } else { key.sibling() })
    }
}

impl std::fmt::Display for ModifierKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Side-independent modifier flags, as the hotkey backend sees them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModifierFlags {
    pub shift: bool,
    pub control: bool,
    pub option: bool,
    pub command: bool,
}

impl ModifierFlags {
    /// Side-independent view of a raw flags word
    pub fn from_raw(raw: RawModifierFlags) -> Self {
        Self {
            shift: raw.0 & flags::SHIFT != 0,
            control: raw.0 & flags::CONTROL != 0,
            option: raw.0 & flags::OPTION != 0,
            command: raw.0 & flags::COMMAND != 0,
        }
    }

    pub fn contains(&self, modifier: Modifier) -> bool {
        match modifier {
            Modifier::Shift => self.shift,
            Modifier::Control => self.control,
            Modifier::Option => self.option,
            Modifier::Command => self.command,
        }
    }

    pub fn insert(&mut self, modifier: Modifier) {
        match modifier {
            Modifier::Shift => self.shift = true,
            Modifier::Control => self.control = true,
            Modifier::Option => self.option = true,
            Modifier::Command => self.command = true,
        }
    }

    /// Check if all modifiers are released
    pub fn is_empty(&self) -> bool {
        !self.shift && !self.control && !self.option && !self.command
    }

    /// Side-independent raw word for these flags
    pub fn to_raw(self) -> RawModifierFlags {
        let mut bits = 0;
        for modifier in [
            Modifier::Shift,
            Modifier::Control,
            Modifier::Option,
            Modifier::Command,
        ] {
            if self.contains(modifier) {
                bits |= modifier.mask();
            }
        }
        RawModifierFlags(bits)
    }
}

/// Raw modifier flags word as delivered by the input source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawModifierFlags(pub u64);

impl RawModifierFlags {
    /// Raw word with both the logical and device bits of every key set
    pub fn from_keys(keys: &[ModifierKey]) -> Self {
        keys.iter().fold(Self(0), |acc, key| {
            Self(acc.0 | key.modifier().mask() | key.device_mask())
        })
    }
}

/// Tracks which of the eight modifier keys are currently pressed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    pressed: u8,
}

impl ModifierState {
    /// Decompose a raw flags word into per-side key state.
    ///
    /// A cleared logical bit releases both sides even if stale device bits
    /// remain. A set logical bit with no device bit for either side marks
    /// both sides as held.
    pub fn from_flags(raw: RawModifierFlags) -> Self {
        let mut pressed = 0u8;
        for key in ModifierKey::ALL.iter().filter(|k| k.is_left()) {
            let left = *key;
            let right = key.sibling();
            if raw.0 & left.modifier().mask() == 0 {
                continue;
            }
            let left_down = raw.0 & left.device_mask() != 0;
            let right_down = raw.0 & right.device_mask() != 0;
            if !left_down && !right_down {
                pressed |= left.bit() | right.bit();
                continue;
            }
            if left_down {
                pressed |= left.bit();
            }
            if right_down {
                pressed |= right.bit();
            }
        }
        Self { pressed }
    }

    pub fn is_pressed(&self, key: ModifierKey) -> bool {
        self.pressed & key.bit() != 0
    }

    /// Check if all modifiers are released
    pub fn is_empty(&self) -> bool {
        self.pressed == 0
    }

    /// Currently pressed keys in canonical order
    pub fn trigger_keys(&self) -> TriggerKeySet {
        ModifierKey::ALL
            .iter()
            .copied()
            .filter(|key| self.is_pressed(*key))
            .collect()
    }
}
