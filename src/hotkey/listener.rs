//! Global input listener using macOS CGEventTap
//!
//! Monitors system-wide modifier changes and key-down events. Key-downs
//! that match a registered hotkey are swallowed and delivered to the engine.
//! Runs on a dedicated thread with its own CFRunLoop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
#[cfg(not(target_os = "macos"))]
use tracing::debug;

use super::backend::{HotkeyId, LogicalKey, SharedRegistry};
use super::keys::{ModifierFlags, RawModifierFlags};
use crate::state::Command;

/// Events delivered to the engine, in order, on a single channel
#[derive(Debug, Clone)]
pub enum InputEvent {
    /// Raw modifier flags changed
    FlagsChanged(RawModifierFlags),
    /// A registered hotkey was pressed; its keystroke has been swallowed
    HotkeyPressed {
        id: HotkeyId,
        key: LogicalKey,
        modifiers: ModifierFlags,
    },
    /// Event tap was disabled by macOS (needs re-enabling)
    TapDisabled,
    /// Configuration request from the IPC layer
    Command(Command),
}

/// Errors that can occur in the hotkey listener
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("hotkey listener is already running")]
    AlreadyRunning,

    #[error("failed to create event tap - check Accessibility permissions")]
    EventTapCreation,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    #[error("global hotkeys are not supported on this platform")]
    Unsupported,
}

/// Global listener feeding modifier changes and hotkey presses to the engine
pub struct HotkeyListener {
    #[cfg_attr(not(target_os = "macos"), allow(dead_code))]
    event_tx: mpsc::Sender<InputEvent>,
    #[cfg_attr(not(target_os = "macos"), allow(dead_code))]
    registry: SharedRegistry,
    running: Arc<AtomicBool>,
}

impl HotkeyListener {
    /// Create a new listener matching key-downs against `registry`
    pub fn new(event_tx: mpsc::Sender<InputEvent>, registry: SharedRegistry) -> Self {
        Self {
            event_tx,
            registry,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the listener
    ///
    /// This spawns a dedicated thread that runs a CFRunLoop to receive
    /// CGEventTap callbacks. The listener runs until `stop()` is called
    /// or the program exits.
    #[cfg(target_os = "macos")]
    pub fn start(&self) -> Result<(), HotkeyError> {
        use tracing::{error, info};

        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyRunning);
        }

        let event_tx = self.event_tx.clone();
        let registry = Arc::clone(&self.registry);
        let running = Arc::clone(&self.running);

        std::thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                info!("hotkey listener thread started");

                if let Err(e) = macos::run_event_loop(event_tx, registry, running.clone()) {
                    error!(?e, "hotkey listener error");
                }

                running.store(false, Ordering::SeqCst);
                info!("hotkey listener thread stopped");
            })
            .map_err(|e| HotkeyError::ThreadSpawn(e.to_string()))?;

        Ok(())
    }

    #[cfg(not(target_os = "macos"))]
    pub fn start(&self) -> Result<(), HotkeyError> {
        debug!("no global event tap on this platform");
        Err(HotkeyError::Unsupported)
    }

    /// Stop the listener
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the listener is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Post a synthetic press of `key` with `modifiers` past our own tap
#[cfg(target_os = "macos")]
pub fn repost_key(key: LogicalKey, modifiers: ModifierFlags) {
    macos::repost_key(key, modifiers)
}

#[cfg(not(target_os = "macos"))]
pub fn repost_key(key: LogicalKey, modifiers: ModifierFlags) {
    debug!(%key, ?modifiers, "key forwarding unavailable on this platform");
}

#[cfg(target_os = "macos")]
mod macos {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
    use core_graphics::event::{
        CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions,
        CGEventTapPlacement, CGEventType, EventField,
    };
    use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
    use tokio::sync::mpsc;
    use tracing::{debug, error, info, warn};

    use super::{HotkeyError, InputEvent};
    use crate::hotkey::backend::{LogicalKey, SharedRegistry};
    use crate::hotkey::keymap;
    use crate::hotkey::keys::{ModifierFlags, RawModifierFlags};

    /// Marks events we post ourselves so the tap lets them through
    const REPOST_MARKER: i64 = 0x6d6f_646b;

    enum TapMessage {
        Flags(u64),
        Hotkey {
            id: crate::hotkey::HotkeyId,
            key: LogicalKey,
            modifiers: ModifierFlags,
        },
        Disabled,
    }

    /// Run the CFRunLoop with the event tap
    pub(super) fn run_event_loop(
        event_tx: mpsc::Sender<InputEvent>,
        registry: SharedRegistry,
        running: Arc<AtomicBool>,
    ) -> Result<(), HotkeyError> {
        // Track the last raw flags to detect changes
        let mut last_flags = RawModifierFlags::default();

        let (callback_tx, callback_rx) = std::sync::mpsc::channel::<TapMessage>();

        // CGEventTap callback - must be fast and non-blocking
        let callback = move |_proxy: core_graphics::event::CGEventTapProxy,
                             event_type: CGEventType,
                             event: &CGEvent|
              -> Option<CGEvent> {
            if event.get_integer_value_field(EventField::EVENT_SOURCE_USER_DATA) == REPOST_MARKER {
                return Some(event.clone());
            }
            match event_type {
                CGEventType::FlagsChanged => {
                    let _ = callback_tx.send(TapMessage::Flags(event.get_flags().bits()));
                }
                CGEventType::KeyDown => {
                    let code =
                        event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
                    let modifiers =
                        ModifierFlags::from_raw(RawModifierFlags(event.get_flags().bits()));
                    let hit = keymap::key_for_keycode(code).and_then(|key| {
                        let id = registry.lock().ok()?.lookup(key, modifiers)?;
                        Some((id, key))
                    });
                    if let Some((id, key)) = hit {
                        let _ = callback_tx.send(TapMessage::Hotkey { id, key, modifiers });
                        // Swallow the keystroke
                        event.set_type(CGEventType::Null);
                    }
                }
                CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                    let _ = callback_tx.send(TapMessage::Disabled);
                }
                _ => {}
            }
            Some(event.clone())
        };

        let tap = CGEventTap::new(
            CGEventTapLocation::Session,
            CGEventTapPlacement::HeadInsertEventTap,
            CGEventTapOptions::Default,
            vec![CGEventType::FlagsChanged, CGEventType::KeyDown],
            callback,
        )
        .map_err(|_| {
            error!("failed to create event tap - is Accessibility permission granted?");
            HotkeyError::EventTapCreation
        })?;

        tap.enable();

        let run_loop_source = tap
            .mach_port
            .create_runloop_source(0)
            .map_err(|_| HotkeyError::EventTapCreation)?;
        let run_loop = CFRunLoop::get_current();

        unsafe {
            run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
        }

        info!("event tap created and enabled");

        while running.load(Ordering::SeqCst) {
            unsafe {
                CFRunLoop::run_in_mode(
                    kCFRunLoopDefaultMode,
                    std::time::Duration::from_millis(20),
                    true,
                );
            }

            while let Ok(message) = callback_rx.try_recv() {
                let event = match message {
                    TapMessage::Flags(bits) => {
                        let flags = RawModifierFlags(bits);
                        if flags == last_flags {
                            continue;
                        }
                        debug!(?last_flags, ?flags, "modifier flags changed");
                        last_flags = flags;
                        InputEvent::FlagsChanged(flags)
                    }
                    TapMessage::Hotkey { id, key, modifiers } => {
                        InputEvent::HotkeyPressed { id, key, modifiers }
                    }
                    TapMessage::Disabled => {
                        warn!("event tap disabled, re-enabling");
                        tap.enable();
                        InputEvent::TapDisabled
                    }
                };

                // We are not in an async context
                if event_tx.blocking_send(event).is_err() {
                    warn!("failed to send input event - channel closed?");
                    running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }

        Ok(())
    }

    pub(super) fn repost_key(key: LogicalKey, modifiers: ModifierFlags) {
        let Some(code) = keymap::keycode_for(key) else {
            debug!(%key, "no keycode to forward");
            return;
        };
        let Ok(source) = CGEventSource::new(CGEventSourceStateID::HIDSystemState) else {
            warn!("failed to create event source for forwarding");
            return;
        };
        let flags = CGEventFlags::from_bits_truncate(modifiers.to_raw().0);
        for down in [true, false] {
            if let Ok(event) = CGEvent::new_keyboard_event(source.clone(), code, down) {
                event.set_flags(flags);
                event.set_integer_value_field(EventField::EVENT_SOURCE_USER_DATA, REPOST_MARKER);
                event.post(CGEventTapLocation::Session);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::backend::EventTapBackend;

    #[test]
    fn test_listener_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = HotkeyListener::new(tx, EventTapBackend::new().registry());
        assert!(!listener.is_running());
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_start_unsupported() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = HotkeyListener::new(tx, EventTapBackend::new().registry());
        assert!(matches!(listener.start(), Err(HotkeyError::Unsupported)));
    }
}
