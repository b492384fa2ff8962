//! The keys manager
//!
//! Owns live modifier state and every hotkey group, and decides after each
//! input event which groups are registered. All work happens synchronously
//! on the task that drains the input channel.

use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::events::KeysEvent;
use crate::hotkey::{
    HotkeyBackend, HotkeyId, InputEvent, LogicalKey, ModifierState, RawModifierFlags,
    TriggerKeySet,
};
use crate::settings::{HotkeySettings, SettingsStore, SettingsSync};

use super::capture::{EventDisposition, OneShot, TestCapture};
use super::groups::{validate, GroupPolicy, HotkeyGroupKind};
use super::lifecycle::{HotkeyGroup, HotkeyHandler};
use super::multi_tap::{MultiTapDetector, DEFAULT_THRESHOLD};

/// Configuration requests delivered through the input channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Replace a configured group's modifier set
    SetModifiers {
        group: HotkeyGroupKind,
        keys: TriggerKeySet,
    },
    /// Replace a group's key list
    SetKeys {
        group: HotkeyGroupKind,
        keys: Vec<LogicalKey>,
    },
    /// Capture the next press of `keys`
    ArmTestCapture { keys: TriggerKeySet, forward: bool },
}

#[derive(Debug, Clone, Copy)]
pub struct ManagerOptions {
    /// Never register with the backend (UI previews and tests of the host)
    pub preview_mode: bool,
    pub multi_tap_threshold: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            preview_mode: false,
            multi_tap_threshold: DEFAULT_THRESHOLD,
        }
    }
}

pub struct KeysManager<B: HotkeyBackend, H: HotkeyHandler> {
    backend: B,
    handler: H,
    preview_mode: bool,
    /// Live modifier key state
    state: ModifierState,
    /// Held keys as of the last flags change
    trigger_keys: TriggerKeySet,
    policy: GroupPolicy,
    /// One entry per kind, in `HotkeyGroupKind::ALL` order
    groups: Vec<HotkeyGroup>,
    multi_tap: MultiTapDetector,
    capture: TestCapture,
    event_tx: broadcast::Sender<KeysEvent>,
}

fn publish(tx: &broadcast::Sender<KeysEvent>, event: KeysEvent) {
    debug!(%event, "publishing");
    // No subscribers is fine
    let _ = tx.send(event);
}

impl<B: HotkeyBackend, H: HotkeyHandler> KeysManager<B, H> {
    /// Create a manager with every group empty and unregistered
    pub fn new(
        backend: B,
        handler: H,
        options: ManagerOptions,
        event_tx: broadcast::Sender<KeysEvent>,
    ) -> Self {
        let groups = HotkeyGroupKind::ALL
            .iter()
            .map(|kind| HotkeyGroup::new(*kind, TriggerKeySet::new(), Vec::new()))
            .collect();

        Self {
            backend,
            handler,
            preview_mode: options.preview_mode,
            state: ModifierState::default(),
            trigger_keys: TriggerKeySet::new(),
            policy: GroupPolicy::default(),
            groups,
            multi_tap: MultiTapDetector::new(options.multi_tap_threshold),
            capture: TestCapture::new(),
            event_tx,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn group(&self, kind: HotkeyGroupKind) -> &HotkeyGroup {
        &self.groups[kind.index()]
    }

    pub fn groups(&self) -> &[HotkeyGroup] {
        &self.groups
    }

    pub fn policy(&self) -> &GroupPolicy {
        &self.policy
    }

    /// Keys held as of the last flags change
    pub fn trigger_keys(&self) -> &TriggerKeySet {
        &self.trigger_keys
    }

    /// Whether every key of `keys` is held right now
    pub fn is_held(&self, keys: &TriggerKeySet) -> bool {
        keys.all_held(&self.state)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<KeysEvent> {
        self.event_tx.subscribe()
    }

    /// Entry point for raw modifier flag changes
    pub fn on_flags_changed(&mut self, raw: RawModifierFlags) {
        self.on_flags_changed_at(raw, Instant::now());
    }

    pub fn on_flags_changed_at(&mut self, raw: RawModifierFlags, now: Instant) {
        self.state = ModifierState::from_flags(raw);

        let keys = self.state.trigger_keys();
        if keys != self.trigger_keys {
            debug!(from = %self.trigger_keys, to = %keys, "trigger keys changed");
            self.trigger_keys = keys.clone();
            publish(&self.event_tx, KeysEvent::TriggerKeysChanged { keys: keys.clone() });

            if !keys.is_empty() {
                let count = self.multi_tap.tap(&keys, now);
                publish(&self.event_tx, KeysEvent::MultiTap { keys, count });
            }
        }

        self.refresh();
    }

    /// Bring every group's registration in line with the held keys
    fn refresh(&mut self) {
        for group in self.groups.iter_mut() {
            if group.should_register(&self.state, self.preview_mode) {
                if group.register(&mut self.backend, &mut self.handler) {
                    publish(&self.event_tx, KeysEvent::GroupRegistered { group: group.kind() });
                }
            } else if group.unregister(&mut self.backend, &mut self.handler) {
                publish(&self.event_tx, KeysEvent::GroupUnregistered { group: group.kind() });
            }
        }
    }

    fn teardown(&mut self) {
        for group in self.groups.iter_mut() {
            if group.unregister(&mut self.backend, &mut self.handler) {
                publish(&self.event_tx, KeysEvent::GroupUnregistered { group: group.kind() });
            }
        }
    }

    /// Unregister everything, rebuild all groups from the policy, then
    /// re-register whatever is held.
    fn rebuild(&mut self) {
        self.teardown();
        for group in self.groups.iter_mut() {
            let modifiers = self.policy.set_for(group.kind()).clone();
            let keys = group.keys().to_vec();
            group.reconfigure(modifiers, keys);
        }
        self.refresh();
    }

    pub fn set_primary_modifiers(&mut self, keys: TriggerKeySet) {
        self.set_modifiers(HotkeyGroupKind::Primary, keys);
    }

    pub fn set_secondary_modifiers(&mut self, keys: TriggerKeySet) {
        self.set_modifiers(HotkeyGroupKind::Secondary, keys);
    }

    pub fn set_special_modifiers(&mut self, keys: TriggerKeySet) {
        self.set_modifiers(HotkeyGroupKind::Special, keys);
    }

    /// Replace a configured set and rebuild every group
    pub fn set_modifiers(&mut self, kind: HotkeyGroupKind, keys: TriggerKeySet) {
        if !kind.is_configured() {
            warn!(group = %kind, "modifiers of derived groups cannot be set");
            return;
        }
        let keys = validate(keys);
        info!(group = %kind, modifiers = %keys, "modifiers configured");
        self.policy.set_configured(kind, keys);
        self.rebuild();
    }

    /// Replace one group's key list
    pub fn set_keys(&mut self, kind: HotkeyGroupKind, keys: Vec<LogicalKey>) {
        let group = &mut self.groups[kind.index()];
        if group.unregister(&mut self.backend, &mut self.handler) {
            publish(&self.event_tx, KeysEvent::GroupUnregistered { group: kind });
        }
        let modifiers = group.modifiers().clone();
        group.reconfigure(modifiers, keys);
        info!(group = %kind, keys = group.keys().len(), "key list configured");
        self.refresh();
    }

    /// Load a full configuration in one rebuild
    pub fn apply_settings(&mut self, settings: &HotkeySettings) {
        self.teardown();
        self.policy = settings.policy();
        for group in self.groups.iter_mut() {
            let kind = group.kind();
            group.reconfigure(self.policy.set_for(kind).clone(), settings.keys_for(kind));
        }
        info!("settings applied");
        self.refresh();
    }

    /// Snapshot of the current configuration
    pub fn settings(&self) -> HotkeySettings {
        let mut settings = HotkeySettings {
            special: TriggerKeySet::new(),
            primary: TriggerKeySet::new(),
            secondary: TriggerKeySet::new(),
            keys: Default::default(),
        };
        for kind in HotkeyGroupKind::ALL {
            if let Some(set) = self.policy.configured(kind) {
                settings.set_modifier_set(kind, set.clone());
            }
            settings.set_keys(kind, self.group(kind).keys().to_vec());
        }
        settings
    }

    /// Arm a one-shot capture of the next hotkey press on `combo`
    pub fn arm_test_capture(&mut self, combo: TriggerKeySet, one_shot: OneShot, forward: bool) {
        info!(combo = %combo, forward, "test capture armed");
        self.capture.arm(combo, one_shot, forward);
    }

    pub fn is_capture_armed(&self) -> bool {
        self.capture.is_armed()
    }

    /// A registered hotkey fired
    pub fn on_hotkey_pressed(&mut self, id: HotkeyId) -> EventDisposition {
        let Some((kind, key, modifiers)) = self.groups.iter().find_map(|g| {
            g.hotkey(id)
                .map(|h| (g.kind(), h.key, g.modifiers().clone()))
        }) else {
            debug!(%id, "press for unknown hotkey");
            return EventDisposition::Forward;
        };

        // Delivery can race the release of a modifier
        if !modifiers.all_held(&self.state) {
            debug!(group = %kind, %key, "modifiers released before delivery");
            return EventDisposition::Forward;
        }

        if let Some(disposition) = self.capture.intercept(&modifiers) {
            publish(&self.event_tx, KeysEvent::TestCaptured { keys: modifiers });
            return disposition;
        }

        info!(group = %kind, %key, "hotkey fired");
        self.handler.on_hotkey(kind, key);
        publish(&self.event_tx, KeysEvent::HotkeyFired { group: kind, key });
        EventDisposition::Consume
    }

    /// Apply a configuration command. Returns true if configuration changed.
    pub fn apply_command(&mut self, command: Command) -> bool {
        match command {
            Command::SetModifiers { group, keys } => {
                self.set_modifiers(group, keys);
                group.is_configured()
            }
            Command::SetKeys { group, keys } => {
                self.set_keys(group, keys);
                true
            }
            Command::ArmTestCapture { keys, forward } => {
                let combo = keys.clone();
                self.arm_test_capture(
                    keys,
                    Box::new(move || debug!(%combo, "test capture delivered")),
                    forward,
                );
                false
            }
        }
    }

    /// Process one input event
    pub fn handle(&mut self, event: InputEvent) -> bool {
        match event {
            InputEvent::FlagsChanged(raw) => {
                self.on_flags_changed(raw);
                false
            }
            InputEvent::HotkeyPressed { id, key, modifiers } => {
                // The registration may already be gone, so forward what the tap saw
                if self.on_hotkey_pressed(id) == EventDisposition::Forward {
                    self.backend.forward(key, modifiers);
                }
                false
            }
            InputEvent::TapDisabled => {
                warn!("event tap disabled, events may be missed");
                false
            }
            InputEvent::Command(command) => self.apply_command(command),
        }
    }

    /// Drain the input channel, persisting configuration changes
    pub async fn run<S: SettingsStore>(
        &mut self,
        mut input_rx: mpsc::Receiver<InputEvent>,
        sync: &mut SettingsSync<S>,
    ) {
        info!("keys manager started");

        while let Some(event) = input_rx.recv().await {
            if self.handle(event) {
                if let Err(e) = sync.push_from(self) {
                    warn!(?e, "failed to persist settings");
                }
            }
        }

        info!("keys manager stopped");
    }

    /// Unregister every group
    pub fn shutdown(&mut self) {
        self.teardown();
    }
}

impl<B: HotkeyBackend, H: HotkeyHandler> Drop for KeysManager<B, H> {
    fn drop(&mut self) {
        self.teardown();
    }
}
