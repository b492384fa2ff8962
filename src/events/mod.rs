//! Events published by the keys manager
//!
//! Every state transition is broadcast as a [`KeysEvent`] so the UI and IPC
//! subscribers can follow held keys, group activity and multi-taps.

use serde::{Deserialize, Serialize};

use crate::hotkey::{LogicalKey, TriggerKeySet};
use crate::state::HotkeyGroupKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeysEvent {
    /// The set of held modifier keys changed
    TriggerKeysChanged { keys: TriggerKeySet },

    /// A group registered its hotkeys
    GroupRegistered { group: HotkeyGroupKind },

    /// A group unregistered its hotkeys
    GroupUnregistered { group: HotkeyGroupKind },

    /// A hotkey was delivered to the handler
    HotkeyFired {
        group: HotkeyGroupKind,
        key: LogicalKey,
    },

    /// A chord was tapped `count` times in a row
    MultiTap { keys: TriggerKeySet, count: u32 },

    /// An armed test capture matched
    TestCaptured { keys: TriggerKeySet },
}

impl std::fmt::Display for KeysEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeysEvent::TriggerKeysChanged { keys } => write!(f, "TRIGGER_KEYS {}", keys),
            KeysEvent::GroupRegistered { group } => write!(f, "GROUP_REGISTERED {}", group),
            KeysEvent::GroupUnregistered { group } => write!(f, "GROUP_UNREGISTERED {}", group),
            KeysEvent::HotkeyFired { group, key } => {
                write!(f, "HOTKEY_FIRED {} {}", group, key)
            }
            KeysEvent::MultiTap { keys, count } => write!(f, "MULTI_TAP {} x{}", keys, count),
            KeysEvent::TestCaptured { keys } => write!(f, "TEST_CAPTURED {}", keys),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::ModifierKey;

    #[test]
    fn test_event_serialization() {
        let event = KeysEvent::MultiTap {
            keys: TriggerKeySet::from([ModifierKey::LeftCommand]),
            count: 2,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("multi_tap"));
        assert!(json.contains("left_command"));
        assert!(json.contains("\"count\":2"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"hotkey_fired","group":"secondary_alt","key":"k"}"#;
        let event: KeysEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            KeysEvent::HotkeyFired {
                group: HotkeyGroupKind::SecondaryAlt,
                key: LogicalKey::new('K').unwrap(),
            }
        );
    }
}
