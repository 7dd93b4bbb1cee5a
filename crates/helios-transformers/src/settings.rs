//! Per-transformer settings store.
//!
//! Each transformer declares its options as a `&'static [SettingDescriptor]`
//! list. The list is loaded into a [`TransformerSettings`] once, when the
//! transformer is constructed, and the store then hands out typed read and
//! write access to the current values.
//!
//! ```
//! use helios_transformers::settings::{SettingDescriptor, SettingValue, TransformerSettings};
//!
//! const OPTIONS: &[SettingDescriptor] = &[
//!     SettingDescriptor::boolean("uppercase", "Uppercase hex digits", false),
//!     SettingDescriptor::integer("bytes_per_row", "Bytes per row", 16),
//! ];
//!
//! let settings = TransformerSettings::from_descriptors(OPTIONS).unwrap();
//! assert_eq!(settings.size(), 2);
//! settings.set("uppercase", SettingValue::Bool(true)).unwrap();
//! assert_eq!(settings.get_bool("uppercase"), Some(true));
//! ```

use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{SettingsError, TransformerError, TransformerResult};

/// The closed set of value kinds a setting may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    /// On/off switch.
    Bool,
    /// Signed integer.
    Integer,
    /// Free-form text.
    Text,
    /// Filesystem path, stored as text.
    Path,
    /// One of a fixed list of options.
    Choice(&'static [&'static str]),
}

impl SettingKind {
    /// Returns true if `value` can be stored under this kind.
    pub fn accepts(&self, value: &SettingValue) -> bool {
        match (self, value) {
            (SettingKind::Bool, SettingValue::Bool(_)) => true,
            (SettingKind::Integer, SettingValue::Integer(_)) => true,
            (SettingKind::Text | SettingKind::Path, SettingValue::Text(_)) => true,
            (SettingKind::Choice(options), SettingValue::Text(s)) => options.contains(&s.as_str()),
            _ => false,
        }
    }
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingKind::Bool => write!(f, "bool"),
            SettingKind::Integer => write!(f, "integer"),
            SettingKind::Text => write!(f, "text"),
            SettingKind::Path => write!(f, "path"),
            SettingKind::Choice(options) => write!(f, "one of [{}]", options.join(", ")),
        }
    }
}

/// A setting's current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl SettingValue {
    /// Short description used in error messages.
    fn describe(&self) -> String {
        match self {
            SettingValue::Bool(b) => format!("bool {}", b),
            SettingValue::Integer(i) => format!("integer {}", i),
            SettingValue::Text(s) => format!("text \"{}\"", s),
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(b) => write!(f, "{}", b),
            SettingValue::Integer(i) => write!(f, "{}", i),
            SettingValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Default value of a descriptor, usable in `const` context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingDefault {
    Bool(bool),
    Integer(i64),
    Text(&'static str),
}

impl SettingDefault {
    fn to_value(self) -> SettingValue {
        match self {
            SettingDefault::Bool(b) => SettingValue::Bool(b),
            SettingDefault::Integer(i) => SettingValue::Integer(i),
            SettingDefault::Text(s) => SettingValue::Text(s.to_string()),
        }
    }
}

/// A compile-time declaration of one configurable option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingDescriptor {
    /// Key, unique within one transformer.
    pub key: &'static str,
    /// Human-readable label.
    pub label: &'static str,
    /// Declared value kind.
    pub kind: SettingKind,
    /// Value the setting starts with and returns to on reset.
    pub default: SettingDefault,
}

impl SettingDescriptor {
    /// Declares a boolean setting.
    pub const fn boolean(key: &'static str, label: &'static str, default: bool) -> Self {
        Self {
            key,
            label,
            kind: SettingKind::Bool,
            default: SettingDefault::Bool(default),
        }
    }

    /// Declares an integer setting.
    pub const fn integer(key: &'static str, label: &'static str, default: i64) -> Self {
        Self {
            key,
            label,
            kind: SettingKind::Integer,
            default: SettingDefault::Integer(default),
        }
    }

    /// Declares a free-form text setting.
    pub const fn text(key: &'static str, label: &'static str, default: &'static str) -> Self {
        Self {
            key,
            label,
            kind: SettingKind::Text,
            default: SettingDefault::Text(default),
        }
    }

    /// Declares a path setting.
    pub const fn path(key: &'static str, label: &'static str, default: &'static str) -> Self {
        Self {
            key,
            label,
            kind: SettingKind::Path,
            default: SettingDefault::Text(default),
        }
    }

    /// Declares a setting restricted to `options`.
    pub const fn choice(
        key: &'static str,
        label: &'static str,
        options: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        Self {
            key,
            label,
            kind: SettingKind::Choice(options),
            default: SettingDefault::Text(default),
        }
    }

    /// Returns the default as a runtime value.
    pub fn default_value(&self) -> SettingValue {
        self.default.to_value()
    }

    /// Checks that the descriptor is a well-formed closed option.
    pub fn validate(&self) -> TransformerResult<()> {
        if self.key.is_empty() {
            return Err(TransformerError::unsupported_configuration(
                self.key,
                "setting key must not be empty",
            ));
        }
        if let SettingKind::Choice(options) = self.kind {
            if options.is_empty() {
                return Err(TransformerError::unsupported_configuration(
                    self.key,
                    "choice setting must declare at least one option",
                ));
            }
        }
        if !self.kind.accepts(&self.default_value()) {
            return Err(TransformerError::unsupported_configuration(
                self.key,
                format!(
                    "default {} does not match declared kind {}",
                    self.default_value().describe(),
                    self.kind
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct SettingEntry {
    descriptor: SettingDescriptor,
    value: SettingValue,
}

/// Keyed collection of one transformer's configurable options.
///
/// Entries keep the order in which they were first registered. Writes are
/// serialized by an internal lock; callers that need read-modify-write
/// sequences across several keys must serialize those themselves.
#[derive(Debug, Default)]
pub struct TransformerSettings {
    entries: RwLock<Vec<SettingEntry>>,
}

impl TransformerSettings {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store populated from `descriptors`.
    pub fn from_descriptors(descriptors: &[SettingDescriptor]) -> TransformerResult<Self> {
        let settings = Self::new();
        for descriptor in descriptors {
            settings.register_setting(*descriptor)?;
        }
        Ok(settings)
    }

    /// Registers a setting at its default value. A repeated key replaces the
    /// earlier declaration in place.
    pub fn register_setting(&self, descriptor: SettingDescriptor) -> TransformerResult<()> {
        descriptor.validate()?;

        let entry = SettingEntry {
            descriptor,
            value: descriptor.default_value(),
        };
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|e| e.descriptor.key == descriptor.key) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        Ok(())
    }

    /// Number of distinct keys.
    pub fn size(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no settings are registered.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Registered keys, in registration order.
    pub fn keys(&self) -> Vec<&'static str> {
        self.entries.read().iter().map(|e| e.descriptor.key).collect()
    }

    /// Registered descriptors, in registration order.
    pub fn descriptors(&self) -> Vec<SettingDescriptor> {
        self.entries.read().iter().map(|e| e.descriptor).collect()
    }

    /// Returns the descriptor for `key`.
    pub fn descriptor(&self, key: &str) -> Option<SettingDescriptor> {
        self.entries
            .read()
            .iter()
            .find(|e| e.descriptor.key == key)
            .map(|e| e.descriptor)
    }

    /// Returns the current value of `key`.
    pub fn get(&self, key: &str) -> Option<SettingValue> {
        self.entries
            .read()
            .iter()
            .find(|e| e.descriptor.key == key)
            .map(|e| e.value.clone())
    }

    /// Returns the current value of a boolean setting.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            SettingValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the current value of an integer setting.
    pub fn get_integer(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            SettingValue::Integer(i) => Some(i),
            _ => None,
        }
    }

    /// Returns the current value of a text, path, or choice setting.
    pub fn get_text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            SettingValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Stores `value` under `key` after checking it against the declared kind.
    pub fn set(&self, key: &str, value: SettingValue) -> Result<(), SettingsError> {
        let mut entries = self.entries.write();
        let entry = entries
            .iter_mut()
            .find(|e| e.descriptor.key == key)
            .ok_or_else(|| SettingsError::UnknownKey {
                key: key.to_string(),
            })?;

        if !entry.descriptor.kind.accepts(&value) {
            return Err(SettingsError::KindMismatch {
                key: key.to_string(),
                expected: entry.descriptor.kind.to_string(),
                actual: value.describe(),
            });
        }

        entry.value = value;
        Ok(())
    }

    /// Parses `raw` according to the declared kind of `key` and stores it.
    pub fn set_from_str(&self, key: &str, raw: &str) -> Result<(), SettingsError> {
        let descriptor = self.descriptor(key).ok_or_else(|| SettingsError::UnknownKey {
            key: key.to_string(),
        })?;

        let mismatch = || SettingsError::KindMismatch {
            key: key.to_string(),
            expected: descriptor.kind.to_string(),
            actual: format!("\"{}\"", raw),
        };

        let value = match descriptor.kind {
            SettingKind::Bool => SettingValue::Bool(raw.parse().map_err(|_| mismatch())?),
            SettingKind::Integer => SettingValue::Integer(raw.parse().map_err(|_| mismatch())?),
            SettingKind::Text | SettingKind::Path | SettingKind::Choice(_) => {
                SettingValue::Text(raw.to_string())
            }
        };
        self.set(key, value)
    }

    /// Restores `key` to its declared default.
    pub fn reset(&self, key: &str) -> Result<(), SettingsError> {
        let mut entries = self.entries.write();
        let entry = entries
            .iter_mut()
            .find(|e| e.descriptor.key == key)
            .ok_or_else(|| SettingsError::UnknownKey {
                key: key.to_string(),
            })?;
        entry.value = entry.descriptor.default_value();
        Ok(())
    }

    /// Current values as a JSON object, for persistence.
    pub fn snapshot(&self) -> serde_json::Map<String, serde_json::Value> {
        self.entries
            .read()
            .iter()
            .map(|e| {
                let value = serde_json::to_value(&e.value).unwrap_or(serde_json::Value::Null);
                (e.descriptor.key.to_string(), value)
            })
            .collect()
    }

    /// Applies persisted values. Entries that cannot be applied are skipped
    /// and returned.
    pub fn apply(&self, values: &serde_json::Map<String, serde_json::Value>) -> Vec<SettingsError> {
        let mut errors = Vec::new();
        for (key, raw) in values {
            let result = match serde_json::from_value::<SettingValue>(raw.clone()) {
                Ok(value) => self.set(key, value),
                Err(_) => Err(SettingsError::KindMismatch {
                    key: key.clone(),
                    expected: self
                        .descriptor(key)
                        .map(|d| d.kind.to_string())
                        .unwrap_or_else(|| "a scalar".to_string()),
                    actual: raw.to_string(),
                }),
            };
            if let Err(e) = result {
                errors.push(e);
            }
        }
        errors
    }
}
