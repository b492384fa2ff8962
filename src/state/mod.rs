//! Hotkey group state
//!
//! - `groups`: group kinds and the policy deriving their modifier sets
//! - `lifecycle`: per-group registration with the backend
//! - `multi_tap`: repeated taps of the same chord
//! - `capture`: one-shot capture used when recording a hotkey
//! - `machine`: the keys manager tying it together

mod capture;
mod groups;
mod lifecycle;
mod machine;
mod multi_tap;

pub use capture::{EventDisposition, OneShot, TestCapture};
pub use groups::{derive, validate, Derivation, GroupPolicy, HotkeyGroupKind};
pub use lifecycle::{HotkeyGroup, HotkeyHandler, ManagedHotkey};
pub use machine::{Command, KeysManager, ManagerOptions};
pub use multi_tap::{MultiTapDetector, DEFAULT_THRESHOLD};
