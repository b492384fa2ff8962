//! Persisted hotkey settings
//!
//! Holds the configured modifier sets and per-group key lists.
//! [`SettingsSync`] keeps a store and a running [`KeysManager`] in step.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::hotkey::{HotkeyBackend, LogicalKey, ModifierKey, TriggerKeySet};
use crate::state::{validate, GroupPolicy, HotkeyGroupKind, HotkeyHandler, KeysManager};

/// Errors reading or writing settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeySettings {
    pub special: TriggerKeySet,
    pub primary: TriggerKeySet,
    pub secondary: TriggerKeySet,
    /// Keys bound in each group; missing groups bind nothing
    pub keys: BTreeMap<HotkeyGroupKind, Vec<LogicalKey>>,
}

impl Default for HotkeySettings {
    fn default() -> Self {
        let mut keys = BTreeMap::new();
        let letters = ('A'..='Z').filter_map(|c| LogicalKey::new(c).ok()).collect();
        let digits = ('0'..='9').filter_map(|c| LogicalKey::new(c).ok()).collect();
        keys.insert(HotkeyGroupKind::Primary, letters);
        keys.insert(HotkeyGroupKind::Alt, digits);

        Self {
            special: TriggerKeySet::new(),
            primary: TriggerKeySet::from([ModifierKey::LeftControl, ModifierKey::LeftCommand]),
            secondary: TriggerKeySet::new(),
            keys,
        }
    }
}

impl HotkeySettings {
    /// Effective modifier set of any group, derived ones included
    pub fn modifier_set(&self, kind: HotkeyGroupKind) -> TriggerKeySet {
        self.policy().set_for(kind).clone()
    }

    /// Set a configured group's modifiers. Derived groups are rejected.
    pub fn set_modifier_set(&mut self, kind: HotkeyGroupKind, set: TriggerKeySet) -> bool {
        match kind {
            HotkeyGroupKind::Special => self.special = set,
            HotkeyGroupKind::Primary => self.primary = set,
            HotkeyGroupKind::Secondary => self.secondary = set,
            _ => return false,
        }
        true
    }

    pub fn keys_for(&self, kind: HotkeyGroupKind) -> Vec<LogicalKey> {
        self.keys.get(&kind).cloned().unwrap_or_default()
    }

    pub fn set_keys(&mut self, kind: HotkeyGroupKind, keys: Vec<LogicalKey>) {
        if keys.is_empty() {
            self.keys.remove(&kind);
        } else {
            self.keys.insert(kind, keys);
        }
    }

    /// Policy over the stored sets; shift-only sets read as empty
    pub fn policy(&self) -> GroupPolicy {
        GroupPolicy::new(
            validate(self.special.clone()),
            validate(self.primary.clone()),
            validate(self.secondary.clone()),
        )
    }
}

/// Where settings are loaded from and saved to
pub trait SettingsStore {
    fn load(&self) -> Result<HotkeySettings, SettingsError>;
    fn save(&mut self, settings: &HotkeySettings) -> Result<(), SettingsError>;
}

/// JSON file store; a missing file reads as defaults
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> Result<HotkeySettings, SettingsError> {
        if !self.path.exists() {
            debug!(path = ?self.path, "no settings file, using defaults");
            return Ok(HotkeySettings::default());
        }
        let data = std::fs::read(&self.path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn save(&mut self, settings: &HotkeySettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(settings)?;
        // Write then rename so a crash never leaves a torn file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        info!(path = ?self.path, "settings saved");
        Ok(())
    }
}

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub settings: HotkeySettings,
    pub saves: usize,
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<HotkeySettings, SettingsError> {
        Ok(self.settings.clone())
    }

    fn save(&mut self, settings: &HotkeySettings) -> Result<(), SettingsError> {
        self.settings = settings.clone();
        self.saves += 1;
        Ok(())
    }
}

/// Two-way binding between a settings store and a manager.
///
/// Remembers the last snapshot exchanged so pushes only write real changes.
pub struct SettingsSync<S> {
    store: S,
    last: HotkeySettings,
}

impl<S: SettingsStore> SettingsSync<S> {
    pub fn new(store: S) -> Result<Self, SettingsError> {
        let last = store.load()?;
        Ok(Self { store, last })
    }

    pub fn settings(&self) -> &HotkeySettings {
        &self.last
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Store to manager
    pub fn pull_into<B, H>(&self, manager: &mut KeysManager<B, H>)
    where
        B: HotkeyBackend,
        H: HotkeyHandler,
    {
        manager.apply_settings(&self.last);
    }

    /// Manager to store. Returns whether anything was written.
    pub fn push_from<B, H>(&mut self, manager: &KeysManager<B, H>) -> Result<bool, SettingsError>
    where
        B: HotkeyBackend,
        H: HotkeyHandler,
    {
        let current = manager.settings();
        if current == self.last {
            return Ok(false);
        }
        self.store.save(&current)?;
        self.last = current;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::ModifierKey::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("modkey-settings-{}-{}", std::process::id(), name))
            .join("hotkeys.json")
    }

    #[test]
    fn test_defaults() {
        let settings = HotkeySettings::default();
        assert_eq!(settings.keys_for(HotkeyGroupKind::Primary).len(), 26);
        assert!(settings.keys_for(HotkeyGroupKind::Secondary).is_empty());
        assert_eq!(
            settings.modifier_set(HotkeyGroupKind::Alt),
            TriggerKeySet::from([LeftControl, LeftCommand, RightOption])
        );
    }

    #[test]
    fn test_modifier_set_round_trip() {
        let mut settings = HotkeySettings::default();
        let set = TriggerKeySet::from([RightControl, RightOption]);
        assert!(settings.set_modifier_set(HotkeyGroupKind::Secondary, set.clone()));
        assert_eq!(settings.modifier_set(HotkeyGroupKind::Secondary), set);
        assert!(!settings.set_modifier_set(HotkeyGroupKind::Alt, set));
    }

    #[test]
    fn test_shift_only_set_reads_as_empty() {
        let settings: HotkeySettings =
            serde_json::from_str(r#"{"primary":["left_shift","right_shift"]}"#).unwrap();
        assert_eq!(settings.primary, TriggerKeySet::from([LeftShift, RightShift]));
        assert!(settings.modifier_set(HotkeyGroupKind::Primary).is_empty());
        assert!(settings.modifier_set(HotkeyGroupKind::Alt).is_empty());
        assert!(!settings.policy().is_enabled(HotkeyGroupKind::Primary));
    }

    #[test]
    fn test_json_file_store() {
        let path = temp_path("roundtrip");
        let mut store = JsonFileStore::new(&path);
        assert_eq!(store.load().unwrap(), HotkeySettings::default());

        let mut settings = HotkeySettings::default();
        settings.special = TriggerKeySet::from([RightCommand, RightOption]);
        settings.set_keys(HotkeyGroupKind::Special, LogicalKey::parse_list("xy").unwrap());
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: HotkeySettings =
            serde_json::from_str(r#"{"secondary":["right_control"]}"#).unwrap();
        assert_eq!(settings.secondary, TriggerKeySet::from([RightControl]));
        assert_eq!(settings.primary, HotkeySettings::default().primary);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let path = temp_path("invalid");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(SettingsError::Json(_))));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
