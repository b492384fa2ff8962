//! modkey-daemon: global modifier-key hotkey coordination for macOS
//!
//! Tracks which modifier keys are held, keeps each hotkey group registered
//! only while its modifier set is held, and exposes configuration and live
//! state over a local socket.

pub mod config;
pub mod events;
pub mod hotkey;
pub mod ipc;
pub mod lifecycle;
pub mod settings;
pub mod state;
