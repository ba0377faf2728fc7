use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Two partial mappings disagree on the canonical form of the same tag.
///
/// Chunks cover disjoint tag sets, so this points at a prompt or partitioning
/// defect rather than something to resolve silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("conflicting canonical tags for {tag:?}: {existing:?} vs {incoming:?}")]
pub struct TagMappingConflict {
    pub tag: String,
    pub existing: String,
    pub incoming: String,
}

/// Corpus-wide mapping from original tag to canonical tag.
///
/// Keys are unique and iterate in sorted order. Tags without an entry are
/// treated as already canonical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagMapping(BTreeMap<String, String>);

impl TagMapping {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the canonical tag recorded for `tag`, if any.
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.0.get(tag).map(String::as_str)
    }

    /// Returns the canonical form of `tag`, falling back to `tag` itself.
    ///
    /// # Examples
    ///
    /// ```
    /// use postenrich::models::TagMapping;
    ///
    /// let mapping: TagMapping = [("Get Ready".to_string(), "GRWM".to_string())]
    ///     .into_iter()
    ///     .collect();
    ///
    /// assert_eq!(mapping.canonical("Get Ready"), "GRWM");
    /// assert_eq!(mapping.canonical("Budget"), "Budget");
    /// ```
    pub fn canonical<'a>(&'a self, tag: &'a str) -> &'a str {
        self.get(tag).unwrap_or(tag)
    }

    /// Iterates over `(original, canonical)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merges a partial mapping into this one.
    ///
    /// A key that is already present with the same value is accepted. A key
    /// present with a different value fails the whole merge and leaves `self`
    /// unchanged, so the result never depends on merge order.
    ///
    /// # Errors
    ///
    /// Returns `TagMappingConflict` for the first conflicting key.
    pub fn merge(&mut self, other: TagMapping) -> Result<(), TagMappingConflict> {
        if let Some(conflict) = self.find_conflict(&other) {
            return Err(conflict);
        }

        for (tag, canonical) in other.0 {
            if let Entry::Vacant(entry) = self.0.entry(tag) {
                entry.insert(canonical);
            }
        }
        Ok(())
    }

    fn find_conflict(&self, other: &TagMapping) -> Option<TagMappingConflict> {
        other.iter().find_map(|(tag, incoming)| {
            self.get(tag)
                .filter(|existing| *existing != incoming)
                .map(|existing| TagMappingConflict {
                    tag: tag.to_string(),
                    existing: existing.to_string(),
                    incoming: incoming.to_string(),
                })
        })
    }
}

impl From<BTreeMap<String, String>> for TagMapping {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl IntoIterator for TagMapping {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(String, String)> for TagMapping {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
