//! Per-group hotkey registration lifecycle
//!
//! Each group is either Unregistered or Registered. Both transitions are
//! guarded by the `registered` flag, so repeating one is a no-op.

use tracing::{debug, info, warn};

use crate::hotkey::{HotkeyBackend, HotkeyId, LogicalKey, ModifierFlags, ModifierState, TriggerKeySet};

use super::groups::HotkeyGroupKind;

/// Callbacks the host implements to react to hotkey groups
pub trait HotkeyHandler {
    /// A hotkey of `group` fired with `key`
    fn on_hotkey(&mut self, group: HotkeyGroupKind, key: LogicalKey);

    /// `group` is about to register its hotkeys
    fn will_register(&mut self, _group: HotkeyGroupKind) {}

    /// `group` has unregistered its hotkeys
    fn did_unregister(&mut self, _group: HotkeyGroupKind) {}
}

/// One backend registration owned by a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagedHotkey {
    pub id: HotkeyId,
    pub key: LogicalKey,
    pub modifiers: ModifierFlags,
}

/// A group's configuration plus its live registrations
#[derive(Debug, Clone)]
pub struct HotkeyGroup {
    kind: HotkeyGroupKind,
    modifiers: TriggerKeySet,
    keys: Vec<LogicalKey>,
    registered: bool,
    hotkeys: Vec<ManagedHotkey>,
}

impl HotkeyGroup {
    pub fn new(kind: HotkeyGroupKind, modifiers: TriggerKeySet, keys: Vec<LogicalKey>) -> Self {
        Self {
            kind,
            modifiers,
            keys,
            registered: false,
            hotkeys: Vec::new(),
        }
    }

    pub fn kind(&self) -> HotkeyGroupKind {
        self.kind
    }

    pub fn modifiers(&self) -> &TriggerKeySet {
        &self.modifiers
    }

    pub fn keys(&self) -> &[LogicalKey] {
        &self.keys
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn hotkeys(&self) -> &[ManagedHotkey] {
        &self.hotkeys
    }

    /// Whether the group should be registered for the given key state
    pub fn should_register(&self, state: &ModifierState, suppressed: bool) -> bool {
        !suppressed
            && !self.keys.is_empty()
            && !self.modifiers.is_empty()
            && self.modifiers.all_held(state)
    }

    /// Find the registration behind a backend handle
    pub fn hotkey(&self, id: HotkeyId) -> Option<&ManagedHotkey> {
        self.hotkeys.iter().find(|h| h.id == id)
    }

    /// Replace configuration. Must be unregistered first.
    pub(crate) fn reconfigure(&mut self, modifiers: TriggerKeySet, keys: Vec<LogicalKey>) {
        debug_assert!(!self.registered, "{} reconfigured while registered", self.kind);
        self.modifiers = modifiers;
        self.keys = keys;
    }

    /// Register one hotkey per key. Returns false if already registered.
    pub fn register<B, H>(&mut self, backend: &mut B, handler: &mut H) -> bool
    where
        B: HotkeyBackend + ?Sized,
        H: HotkeyHandler + ?Sized,
    {
        if self.registered {
            return false;
        }
        debug_assert!(self.hotkeys.is_empty(), "{} has stale hotkeys", self.kind);

        handler.will_register(self.kind);

        let modifiers = self.modifiers.normalize();
        for key in &self.keys {
            match backend.register(*key, modifiers) {
                Some(id) => self.hotkeys.push(ManagedHotkey {
                    id,
                    key: *key,
                    modifiers,
                }),
                None => warn!(group = %self.kind, %key, "hotkey registration declined"),
            }
        }
        self.registered = true;

        info!(
            group = %self.kind,
            modifiers = %self.modifiers,
            registered = self.hotkeys.len(),
            requested = self.keys.len(),
            "group registered"
        );
        true
    }

    /// Unregister every hotkey. Returns false if already unregistered.
    pub fn unregister<B, H>(&mut self, backend: &mut B, handler: &mut H) -> bool
    where
        B: HotkeyBackend + ?Sized,
        H: HotkeyHandler + ?Sized,
    {
        if !self.registered {
            return false;
        }

        for hotkey in self.hotkeys.drain(..) {
            debug!(group = %self.kind, key = %hotkey.key, id = %hotkey.id, "unregistering hotkey");
            backend.unregister(hotkey.id);
        }
        self.registered = false;

        info!(group = %self.kind, "group unregistered");
        handler.did_unregister(self.kind);
        true
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording doubles shared by the state tests

    use std::collections::HashSet;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum BackendCall {
        Register(LogicalKey, ModifierFlags),
        Unregister(HotkeyId),
        Forward(LogicalKey, ModifierFlags),
    }

    #[derive(Debug, Default)]
    pub struct RecordingBackend {
        pub calls: Vec<BackendCall>,
        pub declined: HashSet<char>,
        pub live: HashSet<HotkeyId>,
        next: u32,
    }

    impl RecordingBackend {
        pub fn registrations(&self) -> usize {
            self.calls
                .iter()
                .filter(|c| matches!(c, BackendCall::Register(..)))
                .count()
        }

        pub fn unregistrations(&self) -> usize {
            self.calls
                .iter()
                .filter(|c| matches!(c, BackendCall::Unregister(..)))
                .count()
        }
    }

    impl HotkeyBackend for RecordingBackend {
        fn register(&mut self, key: LogicalKey, modifiers: ModifierFlags) -> Option<HotkeyId> {
            self.calls.push(BackendCall::Register(key, modifiers));
            if self.declined.contains(&key.as_char()) {
                return None;
            }
            self.next += 1;
            let id = HotkeyId(self.next);
            self.live.insert(id);
            Some(id)
        }

        fn unregister(&mut self, id: HotkeyId) {
            assert!(self.live.remove(&id), "double unregister of {id}");
            self.calls.push(BackendCall::Unregister(id));
        }

        fn forward(&mut self, key: LogicalKey, modifiers: ModifierFlags) {
            self.calls.push(BackendCall::Forward(key, modifiers));
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum HandlerCall {
        Fired(HotkeyGroupKind, LogicalKey),
        WillRegister(HotkeyGroupKind),
        DidUnregister(HotkeyGroupKind),
    }

    #[derive(Debug, Default)]
    pub struct RecordingHandler {
        pub calls: Vec<HandlerCall>,
    }

    impl RecordingHandler {
        pub fn fired(&self) -> Vec<(HotkeyGroupKind, LogicalKey)> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    HandlerCall::Fired(g, k) => Some((*g, *k)),
                    _ => None,
                })
                .collect()
        }
    }

    impl HotkeyHandler for RecordingHandler {
        fn on_hotkey(&mut self, group: HotkeyGroupKind, key: LogicalKey) {
            self.calls.push(HandlerCall::Fired(group, key));
        }

        fn will_register(&mut self, group: HotkeyGroupKind) {
            self.calls.push(HandlerCall::WillRegister(group));
        }

        fn did_unregister(&mut self, group: HotkeyGroupKind) {
            self.calls.push(HandlerCall::DidUnregister(group));
        }
    }

    pub fn keys(s: &str) -> Vec<LogicalKey> {
        LogicalKey::parse_list(s).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::hotkey::{ModifierKey::*, RawModifierFlags};

    fn group() -> HotkeyGroup {
        HotkeyGroup::new(
            HotkeyGroupKind::Primary,
            TriggerKeySet::from([LeftControl, LeftCommand]),
            keys("abc"),
        )
    }

    #[test]
    fn test_register_builds_one_hotkey_per_key() {
        let (mut backend, mut handler) = (RecordingBackend::default(), RecordingHandler::default());
        let mut group = group();
        assert!(group.register(&mut backend, &mut handler));
        assert!(group.is_registered());
        assert_eq!(group.hotkeys().len(), 3);
        assert_eq!(backend.registrations(), 3);
        assert_eq!(handler.calls, vec![HandlerCall::WillRegister(HotkeyGroupKind::Primary)]);
    }

    #[test]
    fn test_register_is_idempotent() {
        let (mut backend, mut handler) = (RecordingBackend::default(), RecordingHandler::default());
        let mut group = group();
        assert!(group.register(&mut backend, &mut handler));
        assert!(!group.register(&mut backend, &mut handler));
        assert_eq!(backend.registrations(), 3);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let (mut backend, mut handler) = (RecordingBackend::default(), RecordingHandler::default());
        let mut group = group();
        assert!(!group.unregister(&mut backend, &mut handler));
        group.register(&mut backend, &mut handler);
        assert!(group.unregister(&mut backend, &mut handler));
        assert!(!group.unregister(&mut backend, &mut handler));
        assert_eq!(backend.unregistrations(), 3);
        assert!(group.hotkeys().is_empty());
        assert_eq!(
            handler.calls.last(),
            Some(&HandlerCall::DidUnregister(HotkeyGroupKind::Primary))
        );
    }

    #[test]
    fn test_declined_key_is_skipped() {
        let mut backend = RecordingBackend::default();
        backend.declined.insert('B');
        let mut handler = RecordingHandler::default();
        let mut group = group();
        group.register(&mut backend, &mut handler);
        assert!(group.is_registered());
        let bound: Vec<char> = group.hotkeys().iter().map(|h| h.key.as_char()).collect();
        assert_eq!(bound, vec!['A', 'C']);
    }

    #[test]
    fn test_should_register_conditions() {
        let held = ModifierState::from_flags(RawModifierFlags::from_keys(&[LeftControl, LeftCommand]));
        let group = group();
        assert!(group.should_register(&held, false));
        assert!(!group.should_register(&held, true));
        assert!(!group.should_register(&ModifierState::default(), false));

        let no_keys = HotkeyGroup::new(HotkeyGroupKind::Primary, group.modifiers().clone(), vec![]);
        assert!(!no_keys.should_register(&held, false));

        let no_mods = HotkeyGroup::new(HotkeyGroupKind::Primary, TriggerKeySet::new(), keys("a"));
        assert!(!no_mods.should_register(&held, false));
    }
}
