//! Hotkey groups and the rules deriving their modifier sets
//!
//! `primary` and `secondary` are configured base sets. Each base yields three
//! dependent sets by layering right Option, right Shift or left Shift on top,
//! provided the base does not already use that modifier. `special` is
//! configured on its own and used as-is.

use serde::{Deserialize, Serialize};

use crate::hotkey::{ModifierKey, TriggerKeySet};

/// The independently toggleable hotkey groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotkeyGroupKind {
    Special,
    Primary,
    Secondary,
    Alt,
    RightShift,
    LeftShift,
    SecondaryAlt,
    SecondaryRightShift,
    SecondaryLeftShift,
}

/// Where a group's modifier set comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    /// Configured directly
    Configured,
    /// A base set with one more key layered on
    Layered { base: HotkeyGroupKind, layer: ModifierKey },
}

impl HotkeyGroupKind {
    pub const ALL: [HotkeyGroupKind; 9] = [
        HotkeyGroupKind::Special,
        HotkeyGroupKind::Primary,
        HotkeyGroupKind::Secondary,
        HotkeyGroupKind::Alt,
        HotkeyGroupKind::RightShift,
        HotkeyGroupKind::LeftShift,
        HotkeyGroupKind::SecondaryAlt,
        HotkeyGroupKind::SecondaryRightShift,
        HotkeyGroupKind::SecondaryLeftShift,
    ];

    pub fn derivation(self) -> Derivation {
        use HotkeyGroupKind::*;
        let layered = |base, layer| Derivation::Layered { base, layer };
        match self {
            Special | Primary | Secondary => Derivation::Configured,
            Alt => layered(Primary, ModifierKey::RightOption),
            RightShift => layered(Primary, ModifierKey::RightShift),
            LeftShift => layered(Primary, ModifierKey::LeftShift),
            SecondaryAlt => layered(Secondary, ModifierKey::RightOption),
            SecondaryRightShift => layered(Secondary, ModifierKey::RightShift),
            SecondaryLeftShift => layered(Secondary, ModifierKey::LeftShift),
        }
    }

    /// True for groups whose set the user configures
    pub fn is_configured(self) -> bool {
        self.derivation() == Derivation::Configured
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for HotkeyGroupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HotkeyGroupKind::Special => "special",
            HotkeyGroupKind::Primary => "primary",
            HotkeyGroupKind::Secondary => "secondary",
            HotkeyGroupKind::Alt => "alt",
            HotkeyGroupKind::RightShift => "right_shift",
            HotkeyGroupKind::LeftShift => "left_shift",
            HotkeyGroupKind::SecondaryAlt => "secondary_alt",
            HotkeyGroupKind::SecondaryRightShift => "secondary_right_shift",
            HotkeyGroupKind::SecondaryLeftShift => "secondary_left_shift",
        };
        write!(f, "{}", name)
    }
}

/// Layer `layer` onto `base`, or the empty set when the base is empty or
/// already uses the layered modifier on either side.
pub fn derive(base: &TriggerKeySet, layer: ModifierKey) -> TriggerKeySet {
    if base.is_empty() || base.normalize().contains(layer.modifier()) {
        return TriggerKeySet::new();
    }
    base.clone().with(layer)
}

/// Configured base sets and every set derived from them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupPolicy {
    special: TriggerKeySet,
    primary: TriggerKeySet,
    secondary: TriggerKeySet,
    derived: [TriggerKeySet; 9],
}

impl GroupPolicy {
    pub fn new(special: TriggerKeySet, primary: TriggerKeySet, secondary: TriggerKeySet) -> Self {
        let mut policy = Self {
            special,
            primary,
            secondary,
            derived: Default::default(),
        };
        policy.rederive();
        policy
    }

    /// Replace one configured set and recompute everything.
    ///
    /// Derived kinds are ignored.
    pub fn set_configured(&mut self, kind: HotkeyGroupKind, set: TriggerKeySet) {
        match kind {
            HotkeyGroupKind::Special => self.special = set,
            HotkeyGroupKind::Primary => self.primary = set,
            HotkeyGroupKind::Secondary => self.secondary = set,
            _ => return,
        }
        self.rederive();
    }

    /// Effective modifier set of a group; empty means disabled
    pub fn set_for(&self, kind: HotkeyGroupKind) -> &TriggerKeySet {
        &self.derived[kind.index()]
    }

    pub fn is_enabled(&self, kind: HotkeyGroupKind) -> bool {
        !self.set_for(kind).is_empty()
    }

    /// The configured set of `kind`; `None` for derived kinds
    pub fn configured(&self, kind: HotkeyGroupKind) -> Option<&TriggerKeySet> {
        match kind {
            HotkeyGroupKind::Special => Some(&self.special),
            HotkeyGroupKind::Primary => Some(&self.primary),
            HotkeyGroupKind::Secondary => Some(&self.secondary),
            _ => None,
        }
    }

    // Always recomputes every group from scratch
    fn rederive(&mut self) {
        for kind in HotkeyGroupKind::ALL {
            let set = match kind.derivation() {
                Derivation::Configured => self.configured(kind).cloned(),
                Derivation::Layered { base, layer } => {
                    self.configured(base).map(|base| derive(base, layer))
                }
            };
            self.derived[kind.index()] = set.unwrap_or_default();
        }
    }
}

/// Shift-only sets are never valid triggers
pub fn validate(set: TriggerKeySet) -> TriggerKeySet {
    if set.is_shift_only() {
        TriggerKeySet::new()
    } else {
        set
    }
}
