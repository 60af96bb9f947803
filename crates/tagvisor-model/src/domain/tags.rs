use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

use super::Tag;

/// Immutable set of tags.
///
/// Attached to a handler at submission and never changed afterwards. As a
/// filter, an empty set matches every handler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(BTreeSet<Tag>);

impl Tags {
    /// The empty set (matches everything when used as a filter).
    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    pub fn of<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Tag>,
    {
        Self(tags.into_iter().map(Into::into).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Membership rule of a task set: `self ⊇ filter`.
    pub fn matches(&self, filter: &Tags) -> bool {
        self.0.is_superset(&filter.0)
    }

    /// A new set holding the tags of both sides.
    ///
    /// Used by `sub()` to narrow a filter; specificity only grows.
    pub fn union(&self, other: &Tags) -> Tags {
        Tags(self.0.union(&other.0).cloned().collect())
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, tag) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(tag)?;
        }
        f.write_str("}")
    }
}

impl From<&str> for Tags {
    fn from(tag: &str) -> Self {
        Tags::of([tag])
    }
}

impl From<String> for Tags {
    fn from(tag: String) -> Self {
        Tags::of([tag])
    }
}

impl<const N: usize> From<[&str; N]> for Tags {
    fn from(tags: [&str; N]) -> Self {
        Tags::of(tags)
    }
}

impl From<&[&str]> for Tags {
    fn from(tags: &[&str]) -> Self {
        Tags::of(tags.iter().copied())
    }
}

impl From<Vec<String>> for Tags {
    fn from(tags: Vec<String>) -> Self {
        Tags::of(tags)
    }
}

impl<S: Into<Tag>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Tags::of(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superset_matching() {
        let tags = Tags::from(["A", "B"]);

        assert!(tags.matches(&Tags::from("A")));
        assert!(tags.matches(&Tags::from("B")));
        assert!(tags.matches(&Tags::from(["A", "B"])));
        assert!(!tags.matches(&Tags::from(["A", "C"])));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Tags::none().matches(&Tags::none()));
        assert!(Tags::from("x").matches(&Tags::none()));
    }

    #[test]
    fn union_narrows_filter() {
        let parent = Tags::from("A");
        let child = parent.union(&Tags::from(["B", "A"]));

        assert_eq!(child, Tags::from(["A", "B"]));
        assert_eq!(parent.len(), 1);
    }

    #[test]
    fn duplicates_collapse() {
        let tags = Tags::of(vec!["x", "x", "y"]);
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn display_is_sorted() {
        assert_eq!(Tags::from(["b", "a"]).to_string(), "{a,b}");
        assert_eq!(Tags::none().to_string(), "{}");
    }

    #[test]
    fn serde_transparent_array() {
        let json = serde_json::to_string(&Tags::from(["b", "a"])).unwrap();
        assert_eq!(json, r#"["a","b"]"#);

        let back: Tags = serde_json::from_str(&json).unwrap();
        assert!(back.contains("a"));
        assert!(back.contains("b"));
    }
}
