//! Hotkey registration backend
//!
//! The engine reserves key + modifier combinations through [`HotkeyBackend`].
//! [`EventTapBackend`] keeps registrations in a registry shared with the
//! event tap, which matches key-down events against it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::keymap;
use super::keys::ModifierFlags;

/// A non-modifier key that can be bound: a letter, digit or symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "char", into = "char")]
pub struct LogicalKey(char);

/// Errors from parsing keys and key lists
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("'{0}' is not a bindable key")]
    Unbindable(char),

    #[error("unknown modifier key: {0}")]
    UnknownModifier(String),
}

impl LogicalKey {
    /// Letters are stored uppercase
    pub fn new(c: char) -> Result<Self, KeyParseError> {
        if c.is_ascii_alphanumeric() || c.is_ascii_punctuation() {
            Ok(Self(c.to_ascii_uppercase()))
        } else {
            Err(KeyParseError::Unbindable(c))
        }
    }

    pub fn as_char(self) -> char {
        self.0
    }

    /// Parse every character of `s` as a key
    pub fn parse_list(s: &str) -> Result<Vec<LogicalKey>, KeyParseError> {
        s.chars().map(LogicalKey::new).collect()
    }
}

impl TryFrom<char> for LogicalKey {
    type Error = KeyParseError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        LogicalKey::new(c)
    }
}

impl From<LogicalKey> for char {
    fn from(key: LogicalKey) -> Self {
        key.0
    }
}

impl std::fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle for one backend registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HotkeyId(pub u32);

impl std::fmt::Display for HotkeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reserves key + modifier combinations with the OS.
///
/// Presses of a registered combination arrive on the input channel as
/// [`InputEvent::HotkeyPressed`](super::InputEvent::HotkeyPressed), carrying
/// the key and modifiers so a swallowed keystroke can still be forwarded
/// after its registration is gone.
pub trait HotkeyBackend {
    /// Reserve a combination. Returns `None` if it is invalid or taken.
    fn register(&mut self, key: LogicalKey, modifiers: ModifierFlags) -> Option<HotkeyId>;

    /// Release a previous registration.
    fn unregister(&mut self, id: HotkeyId);

    /// Re-deliver a swallowed keystroke to the next consumer.
    fn forward(&mut self, _key: LogicalKey, _modifiers: ModifierFlags) {}
}

/// A combination held by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub key: LogicalKey,
    pub modifiers: ModifierFlags,
}

/// Registry shared between [`EventTapBackend`] and the listener thread
#[derive(Debug, Default)]
pub struct HotkeyRegistry {
    next_id: u32,
    entries: HashMap<HotkeyId, Registration>,
}

impl HotkeyRegistry {
    /// Find the registration for an exact key + modifier match
    pub fn lookup(&self, key: LogicalKey, modifiers: ModifierFlags) -> Option<HotkeyId> {
        self.entries
            .iter()
            .find(|(_, reg)| reg.key == key && reg.modifiers == modifiers)
            .map(|(id, _)| *id)
    }

    pub fn get(&self, id: HotkeyId) -> Option<Registration> {
        self.entries.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type SharedRegistry = Arc<Mutex<HotkeyRegistry>>;

/// Backend that registers combinations in a registry consulted by the event tap
#[derive(Debug, Clone, Default)]
pub struct EventTapBackend {
    registry: SharedRegistry,
}

impl EventTapBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to hand to the listener
    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }
}

impl HotkeyBackend for EventTapBackend {
    fn register(&mut self, key: LogicalKey, modifiers: ModifierFlags) -> Option<HotkeyId> {
        if modifiers.is_empty() {
            return None;
        }
        // The tap only recognizes keys it can map back from a keycode
        if keymap::keycode_for(key).is_none() {
            warn!(%key, "no keycode for key, cannot register");
            return None;
        }
        let mut registry = match self.registry.lock() {
            Ok(registry) => registry,
            Err(e) => {
                warn!("hotkey registry poisoned: {}", e);
                return None;
            }
        };
        if registry.lookup(key, modifiers).is_some() {
            debug!(%key, ?modifiers, "combination already registered");
            return None;
        }
        registry.next_id = registry.next_id.wrapping_add(1);
        let id = HotkeyId(registry.next_id);
        registry.entries.insert(id, Registration { key, modifiers });
        Some(id)
    }

    fn unregister(&mut self, id: HotkeyId) {
        if let Ok(mut registry) = self.registry.lock() {
            if registry.entries.remove(&id).is_none() {
                warn!(%id, "unregistering unknown hotkey");
            }
        }
    }

    fn forward(&mut self, key: LogicalKey, modifiers: ModifierFlags) {
        debug!(%key, ?modifiers, "forwarding keystroke");
        super::listener::repost_key(key, modifiers);
    }
}
