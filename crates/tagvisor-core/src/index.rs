//! Tag association index.
//!
//! Maps keys (live task handlers) to their tag sets and answers superset
//! queries through an inverted `tag -> keys` index.

use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
};

use tagvisor_model::{Tag, Tags};

/// Keys associated with immutable tag sets.
///
/// Not synchronised; the executor only touches it with its lock held.
#[derive(Debug)]
pub struct TagIndex<K> {
    /// Tags indexed by key.
    entries: HashMap<K, Tags>,
    /// Index: tag -> keys carrying that tag.
    by_tag: HashMap<Tag, HashSet<K>>,
}

impl<K: Eq + Hash + Clone> TagIndex<K> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            by_tag: HashMap::new(),
        }
    }

    /// Associate `key` with `tags`, replacing a previous association.
    pub fn add(&mut self, key: K, tags: Tags) {
        self.remove(&key);
        for tag in tags.iter() {
            self.by_tag
                .entry(tag.to_string())
                .or_default()
                .insert(key.clone());
        }
        self.entries.insert(key, tags);
    }

    /// Drop the association of `key`; returns the stored key if present.
    pub fn remove(&mut self, key: &K) -> Option<K> {
        let (stored, tags) = self.entries.remove_entry(key)?;
        for tag in tags.iter() {
            if let Some(keys) = self.by_tag.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.by_tag.remove(tag);
                }
            }
        }
        Some(stored)
    }

    /// All keys whose tags are a superset of `filter`, in no particular order.
    ///
    /// An empty filter returns every key. Otherwise candidates come from the
    /// rarest tag of the filter and are checked against the rest.
    pub fn associated(&self, filter: &Tags) -> Vec<K> {
        self.matching(filter).cloned().collect()
    }

    pub fn count(&self, filter: &Tags) -> usize {
        self.matching(filter).count()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn tags_of(&self, key: &K) -> Option<&Tags> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn matching<'a>(&'a self, filter: &'a Tags) -> Box<dyn Iterator<Item = &'a K> + 'a> {
        if filter.is_empty() {
            return Box::new(self.entries.keys());
        }

        let mut rarest: Option<&HashSet<K>> = None;
        for tag in filter.iter() {
            match self.by_tag.get(tag) {
                // a tag nobody carries: nothing can match
                None => return Box::new(std::iter::empty()),
                Some(keys) if rarest.is_none_or(|r| keys.len() < r.len()) => rarest = Some(keys),
                Some(_) => {}
            }
        }

        match rarest {
            Some(candidates) => Box::new(candidates.iter().filter(move |key| {
                self.entries
                    .get(*key)
                    .is_some_and(|tags| tags.matches(filter))
            })),
            None => Box::new(std::iter::empty()),
        }
    }
}

impl<K: Eq + Hash + Clone> Default for TagIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}
