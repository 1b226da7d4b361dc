//! Field value model shared by every engine component.
//!
//! A step's live answers are held in a [`FieldValueMap`]: one entry per field
//! key. Keys follow the widget naming of the schema:
//!   * radio groups and select members use their `name` directly
//!   * checkbox options are keyed `"{name}-{optionIndex}"` and hold a flag
//!   * a checkbox group may instead store the selected option labels as a
//!     list under its bare `name`
//!
//! Typical usage:
//! ```
//! use autofill::values::{FieldValue, FieldValueMap};
//!
//! let mut values = FieldValueMap::new();
//! values.set("contract", "yes");
//! values.set("extras-0", true);
//! assert_eq!(values.text("contract"), Some("yes"));
//! assert!(values.flag("extras-0"));
//! ```
//
// NOTE: Keep this module free of scheduling concerns; the predicate and the
// reconciler both rely on it being plain data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single stored answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// True when the value carries an actual answer: a non-empty string, a
    /// `true` flag or a non-empty list.
    pub fn is_filled(&self) -> bool {
        match self {
            FieldValue::Flag(b) => *b,
            FieldValue::Text(s) => !s.is_empty(),
            FieldValue::List(items) => !items.is_empty(),
        }
    }

    /// Like [`is_filled`](Self::is_filled), but a text value equal to the
    /// select placeholder does not count.
    pub fn is_meaningful(&self, placeholder: &str) -> bool {
        match self {
            FieldValue::Text(s) => !s.is_empty() && s != placeholder,
            other => other.is_filled(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Flag(b) => write!(f, "{b}"),
            FieldValue::Text(s) => write!(f, "{s:?}"),
            FieldValue::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

/// Key of the indexed flag for checkbox option `index` of group `name`.
pub fn checkbox_key(name: &str, index: usize) -> String {
    format!("{name}-{index}")
}

/// Live answers of one wizard step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldValueMap {
    entries: BTreeMap<String, FieldValue>,
}

impl FieldValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) the value for a key.
    pub fn set(&mut self, key: &str, value: impl Into<FieldValue>) {
        self.entries.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.entries.remove(key)
    }

    /// Text value for a key, if it holds one.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_text)
    }

    /// True only when the key holds `Flag(true)`.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some(FieldValue::Flag(true)))
    }

    pub fn is_filled(&self, key: &str) -> bool {
        self.get(key).is_some_and(FieldValue::is_filled)
    }

    pub fn is_meaningful(&self, key: &str, placeholder: &str) -> bool {
        self.get(key).is_some_and(|v| v.is_meaningful(placeholder))
    }

    /// Add or remove one label in the list stored under a checkbox group name.
    ///
    /// Any non-list value previously stored under the key is replaced.
    pub fn toggle_checkbox_label(&mut self, name: &str, label: &str, checked: bool) {
        let mut items = match self.entries.remove(name) {
            Some(FieldValue::List(items)) => items,
            _ => Vec::new(),
        };
        if checked {
            if !items.iter().any(|l| l == label) {
                items.push(label.to_string());
            }
        } else {
            items.retain(|l| l != label);
        }
        self.entries.insert(name.to_string(), FieldValue::List(items));
    }

    /// Overlay `other` onto `self`, keeping every key of `self` that already
    /// holds a meaningful value. Returns the keys actually taken from `other`.
    pub fn merge_missing(&mut self, other: &FieldValueMap, placeholder: &str) -> Vec<String> {
        let mut taken = Vec::new();
        for (key, value) in other.iter() {
            if self.is_meaningful(key, placeholder) {
                continue;
            }
            self.entries.insert(key.clone(), value.clone());
            taken.push(key.clone());
        }
        taken
    }

    /// Number of keys holding a meaningful value.
    pub fn meaningful_count(&self, placeholder: &str) -> usize {
        self.entries
            .values()
            .filter(|v| v.is_meaningful(placeholder))
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FieldValueMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
