//! Hotkey module for global keyboard event handling
//!
//! Tracks side-specific modifier keys from macOS CGEventTap flag changes,
//! models trigger key sets, and registers key + modifier combinations
//! with a backend the event tap consults.

mod backend;
pub mod keymap;
mod keys;
mod listener;
mod trigger;

pub use backend::{
    EventTapBackend, HotkeyBackend, HotkeyId, HotkeyRegistry, KeyParseError, LogicalKey,
    Registration, SharedRegistry,
};
pub use keys::{flags, Modifier, ModifierFlags, ModifierKey, ModifierState, RawModifierFlags};
pub use listener::{HotkeyError, HotkeyListener, InputEvent};
pub use trigger::TriggerKeySet;
