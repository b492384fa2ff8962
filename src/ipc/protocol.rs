//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::KeysEvent;
use crate::hotkey::{LogicalKey, TriggerKeySet};
use crate::state::HotkeyGroupKind;

/// Requests from UI to daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current daemon status
    GetStatus,

    /// Ask whether every key of a combination is held
    IsHeld { keys: TriggerKeySet },

    /// Set the modifiers of a configured group
    SetModifiers {
        group: HotkeyGroupKind,
        keys: TriggerKeySet,
    },

    /// Set the keys bound in a group
    SetKeys {
        group: HotkeyGroupKind,
        keys: Vec<LogicalKey>,
    },

    /// Capture the next hotkey press on a combination
    ArmTestCapture {
        keys: TriggerKeySet,
        #[serde(default)]
        forward: bool,
    },

    /// Ping to check connectivity
    Ping,

    /// Subscribe to event notifications
    Subscribe,
}

/// Responses from daemon to UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Answer to `is_held`
    Held { held: bool },

    /// Request accepted
    Ok,

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification from daemon to UI (for subscribed clients)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Engine event occurred
    Event { event: KeysEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Modifier keys currently held
    pub held: TriggerKeySet,

    /// Groups whose hotkeys are registered
    pub registered_groups: Vec<HotkeyGroupKind>,

    /// Whether the global listener is running
    pub listener_active: bool,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            held: TriggerKeySet::new(),
            registered_groups: Vec::new(),
            listener_active: false,
            uptime_secs: 0,
        }
    }
}

impl DaemonStatus {
    /// Fold an engine event into the snapshot
    pub fn apply(&mut self, event: &KeysEvent) {
        match event {
            KeysEvent::TriggerKeysChanged { keys } => self.held = keys.clone(),
            KeysEvent::GroupRegistered { group } => {
                if !self.registered_groups.contains(group) {
                    self.registered_groups.push(*group);
                    self.registered_groups.sort();
                }
            }
            KeysEvent::GroupUnregistered { group } => {
                self.registered_groups.retain(|g| g != group);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::ModifierKey;

    #[test]
    fn test_request_serialization() {
        let req = Request::SetModifiers {
            group: HotkeyGroupKind::Primary,
            keys: TriggerKeySet::from([ModifierKey::LeftControl]),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("set_modifiers"));
        assert!(json.contains("left_control"));
    }

    #[test]
    fn test_request_deserialization() {
        let json = r#"{"type":"arm_test_capture","keys":["right_shift","right_option"]}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        match req {
            Request::ArmTestCapture { keys, forward } => {
                assert_eq!(keys.len(), 2);
                assert!(!forward);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(DaemonStatus::default());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("status"));
        assert!(json.contains("registered_groups"));
    }

    #[test]
    fn test_status_tracks_events() {
        let mut status = DaemonStatus::default();
        status.apply(&KeysEvent::GroupRegistered { group: HotkeyGroupKind::Alt });
        status.apply(&KeysEvent::GroupRegistered { group: HotkeyGroupKind::Primary });
        status.apply(&KeysEvent::GroupRegistered { group: HotkeyGroupKind::Alt });
        assert_eq!(
            status.registered_groups,
            vec![HotkeyGroupKind::Primary, HotkeyGroupKind::Alt]
        );
        status.apply(&KeysEvent::GroupUnregistered { group: HotkeyGroupKind::Primary });
        assert_eq!(status.registered_groups, vec![HotkeyGroupKind::Alt]);

        let held = TriggerKeySet::from([ModifierKey::RightCommand]);
        status.apply(&KeysEvent::TriggerKeysChanged { keys: held.clone() });
        assert_eq!(status.held, held);
    }
}
