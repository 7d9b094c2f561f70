//! Normalized link-field values

use super::RecordId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Set of linked record ids
///
/// Stores have been observed returning a link field either as a single id
/// or as a list of ids. [`LinkSet::from_value`] accepts both; everything
/// downstream only ever sees a set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkSet(BTreeSet<RecordId>);

impl LinkSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a raw field value
    ///
    /// `null` → empty, a string → one id, an array → its string members.
    /// Anything else carries no ids.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(id) if !id.is_empty() => std::iter::once(RecordId::new(id.as_str())).collect(),
            Value::Array(items) => items
                .iter()
                .filter_map(|item| item.as_str())
                .filter(|id| !id.is_empty())
                .map(RecordId::from)
                .collect(),
            _ => Self::new(),
        }
    }

    /// Render as the list shape stores accept
    pub fn to_value(&self) -> Value {
        Value::Array(
            self.0
                .iter()
                .map(|id| Value::String(id.as_str().to_string()))
                .collect(),
        )
    }

    /// Add one id; returns `false` if it was already present
    pub fn insert(&mut self, id: RecordId) -> bool {
        self.0.insert(id)
    }

    /// Set union
    pub fn union(&self, other: &LinkSet) -> LinkSet {
        self.0.union(&other.0).cloned().collect()
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.0.contains(id)
    }

    pub fn is_superset(&self, other: &LinkSet) -> bool {
        self.0.is_superset(&other.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordId> {
        self.0.iter()
    }
}

impl FromIterator<RecordId> for LinkSet {
    fn from_iter<I: IntoIterator<Item = RecordId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for LinkSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(RecordId::from).collect())
    }
}

impl IntoIterator for LinkSet {
    type Item = RecordId;
    type IntoIter = std::collections::btree_set::IntoIter<RecordId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
