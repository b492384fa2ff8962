//! Trigger key sets
//!
//! A trigger key set is an ordered, duplicate-free list of modifier keys
//! that compares as a set. Order only matters for display.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::keys::{Modifier, ModifierFlags, ModifierKey, ModifierState};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<ModifierKey>", into = "Vec<ModifierKey>")]
pub struct TriggerKeySet {
    keys: Vec<ModifierKey>,
}

impl TriggerKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_mask(mask: u8) -> Self {
        ModifierKey::ALL
            .iter()
            .copied()
            .filter(|key| mask & key.bit() != 0)
            .collect()
    }

    pub(crate) fn mask(&self) -> u8 {
        self.keys.iter().fold(0, |acc, key| acc | key.bit())
    }

    /// Keys in insertion order
    pub fn keys(&self) -> &[ModifierKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: ModifierKey) -> bool {
        self.keys.contains(&key)
    }

    /// True if every key in `self` is also in `other`
    pub fn is_subset(&self, other: &TriggerKeySet) -> bool {
        self.mask() & !other.mask() == 0
    }

    /// Append `key` if it is not already present
    pub fn with(mut self, key: ModifierKey) -> Self {
        if !self.contains(key) {
            self.keys.push(key);
        }
        self
    }

    /// True for a non-empty set made of Shift keys alone
    pub fn is_shift_only(&self) -> bool {
        !self.is_empty() && self.keys.iter().all(|k| k.modifier() == Modifier::Shift)
    }

    /// Side-independent flags implied by the set
    pub fn normalize(&self) -> ModifierFlags {
        let mut flags = ModifierFlags::default();
        for key in &self.keys {
            flags.insert(key.modifier());
        }
        flags
    }

    /// True iff every key in the set is pressed. An empty set is never held.
    pub fn all_held(&self, state: &ModifierState) -> bool {
        !self.is_empty() && self.keys.iter().all(|key| state.is_pressed(*key))
    }

    /// Add or remove `key`.
    ///
    /// `forced_on` picks the direction; `None` flips current membership.
    /// Adding drops the other-side sibling. Removing that leaves only Shift
    /// keys yields the empty set.
    pub fn toggling(&self, key: ModifierKey, forced_on: Option<bool>) -> TriggerKeySet {
        let on = forced_on.unwrap_or(!self.contains(key));
        let mut keys: Vec<ModifierKey> = self
            .keys
            .iter()
            .copied()
            .filter(|k| *k != key && *k != key.sibling())
            .collect();

        if on {
            // Preserve the sibling-free prefix and put the new key last
            keys.push(key);
            return TriggerKeySet { keys };
        }

        // Removing `key` keeps its sibling if it was present
        if self.contains(key.sibling()) {
            keys.push(key.sibling());
        }
        let result = TriggerKeySet { keys };
        if result.is_shift_only() {
            TriggerKeySet::new()
        } else {
            result
        }
    }

    fn canonical(&self) -> Vec<ModifierKey> {
        let mut keys = self.keys.clone();
        keys.sort();
        keys
    }

    /// Compact glyph string, e.g. `⌃⌘`
    pub fn symbols(&self) -> String {
        self.canonical().iter().map(|k| k.glyph()).collect()
    }

    /// Glyph string with side markers, e.g. `‹⌃‹⌘`
    pub fn directional_symbols(&self) -> String {
        self.canonical()
            .iter()
            .map(|k| k.directional_glyph())
            .collect()
    }

    /// Human-readable names, e.g. `Left Control + Left Command`
    pub fn names(&self) -> String {
        self.canonical()
            .iter()
            .map(|k| k.name())
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

impl PartialEq for TriggerKeySet {
    fn eq(&self, other: &Self) -> bool {
        self.mask() == other.mask()
    }
}

impl Eq for TriggerKeySet {}

impl Hash for TriggerKeySet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mask().hash(state);
    }
}

impl FromIterator<ModifierKey> for TriggerKeySet {
    fn from_iter<I: IntoIterator<Item = ModifierKey>>(iter: I) -> Self {
        iter.into_iter().fold(TriggerKeySet::new(), |set, key| set.with(key))
    }
}

impl From<Vec<ModifierKey>> for TriggerKeySet {
    fn from(keys: Vec<ModifierKey>) -> Self {
        keys.into_iter().collect()
    }
}

impl From<TriggerKeySet> for Vec<ModifierKey> {
    fn from(set: TriggerKeySet) -> Self {
        set.keys
    }
}

impl<const N: usize> From<[ModifierKey; N]> for TriggerKeySet {
    fn from(keys: [ModifierKey; N]) -> Self {
        keys.into_iter().collect()
    }
}

impl std::fmt::Display for TriggerKeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "(none)")
        } else {
            write!(f, "{}", self.directional_symbols())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::keys::RawModifierFlags;
    use ModifierKey::*;

    fn all_sets() -> impl Iterator<Item = TriggerKeySet> {
        (0..=u8::MAX).map(TriggerKeySet::from_mask)
    }

    fn held(keys: &[ModifierKey]) -> ModifierState {
        ModifierState::from_flags(RawModifierFlags::from_keys(keys))
    }

    #[test]
    fn test_equality_ignores_order() {
        let a = TriggerKeySet::from([LeftControl, LeftCommand]);
        let b = TriggerKeySet::from([LeftCommand, LeftControl]);
        assert_eq!(a, b);
        assert_ne!(a, TriggerKeySet::from([LeftControl, RightCommand]));
    }

    #[test]
    fn test_permutations_agree() {
        let state = held(&[LeftControl, RightOption, LeftCommand]);
        for set in all_sets() {
            let reversed: TriggerKeySet = set.keys().iter().rev().copied().collect();
            assert_eq!(set, reversed);
            assert_eq!(set.normalize(), reversed.normalize());
            assert_eq!(set.all_held(&state), reversed.all_held(&state));
        }
    }

    #[test]
    fn test_empty_set_never_held() {
        let state = held(&ModifierKey::ALL);
        assert!(!TriggerKeySet::new().all_held(&state));
    }

    #[test]
    fn test_all_held_requires_every_key() {
        let set = TriggerKeySet::from([LeftControl, LeftCommand]);
        assert!(set.all_held(&held(&[LeftControl, LeftCommand, RightShift])));
        assert!(!set.all_held(&held(&[LeftControl])));
        assert!(!set.all_held(&held(&[LeftControl, RightCommand])));
    }

    #[test]
    fn test_normalize() {
        let flags = TriggerKeySet::from([RightOption, LeftCommand]).normalize();
        assert!(flags.option && flags.command);
        assert!(!flags.shift && !flags.control);
    }

    #[test]
    fn test_toggling_adds_and_removes() {
        let set = TriggerKeySet::from([LeftControl]);
        let added = set.toggling(LeftCommand, None);
        assert_eq!(added, TriggerKeySet::from([LeftControl, LeftCommand]));
        let removed = added.toggling(LeftCommand, None);
        assert_eq!(removed, set);
        assert_eq!(set.toggling(LeftControl, Some(true)), set);
    }

    #[test]
    fn test_opposite_side_exclusivity() {
        for set in all_sets() {
            let result = set.toggling(RightCommand, Some(true));
            assert!(result.contains(RightCommand));
            assert!(!result.contains(LeftCommand));

            let result = set.toggling(LeftCommand, Some(true));
            assert!(result.contains(LeftCommand));
            assert!(!result.contains(RightCommand));
        }
    }

    #[test]
    fn test_shift_only_collapse() {
        let shift_combos = [vec![], vec![LeftShift], vec![RightShift], vec![LeftShift, RightShift]];
        for shifts in &shift_combos {
            for key in ModifierKey::ALL.iter().filter(|k| k.modifier() != Modifier::Shift) {
                let set: TriggerKeySet = shifts.iter().copied().chain([*key]).collect();
                assert!(set.toggling(*key, Some(false)).is_empty(), "{set:?} minus {key:?}");
            }
        }
    }

    #[test]
    fn test_removal_keeping_non_shift_survives() {
        let set = TriggerKeySet::from([LeftShift, LeftControl, LeftCommand]);
        let result = set.toggling(LeftCommand, Some(false));
        assert_eq!(result, TriggerKeySet::from([LeftShift, LeftControl]));
    }

    #[test]
    fn test_renderers_use_canonical_order() {
        let set = TriggerKeySet::from([RightShift, LeftCommand, LeftControl]);
        assert_eq!(set.symbols(), "⌃⌘⇧");
        assert_eq!(set.directional_symbols(), "‹⌃‹⌘⇧›");
        assert_eq!(set.names(), "Left Control + Left Command + Right Shift");
    }

    #[test]
    fn test_serde_as_key_list() {
        let set = TriggerKeySet::from([LeftControl, RightOption]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["left_control","right_option"]"#);
        let back: TriggerKeySet = serde_json::from_str(r#"["right_option","left_control","left_control"]"#).unwrap();
        assert_eq!(back, set);
        assert_eq!(back.len(), 2);
    }
}
