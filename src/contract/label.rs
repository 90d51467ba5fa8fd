//! Tags, markers and the label sets the planner reasons about.

use std::{cmp::Ordering, collections::BTreeSet, fmt, hash::Hash};

use crate::tree::EntityClass;

/// A session-global boolean property of the compilation state, e.g. `Parsed`.
///
/// Identity is the name: two tags with the same name are the same tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    name: &'static str,
}

impl Tag {
    /// Declares a tag.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Tag { name }
    }

    /// Returns the tag name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A boolean property attached to one node instance, e.g. `Inlined` on a method.
///
/// A marker declares the entity classes it may be placed on. Identity, ordering and
/// hashing only consider the name.
#[derive(Debug, Clone, Copy)]
pub struct Marker {
    name: &'static str,
    valid_on: EntityClass,
}

impl Marker {
    /// Declares a marker that may be placed on nodes of the given classes.
    #[must_use]
    pub const fn new(name: &'static str, valid_on: EntityClass) -> Self {
        Marker { name, valid_on }
    }

    /// Returns the marker name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Entity classes this marker may be attached to
    #[must_use]
    pub const fn valid_on(&self) -> EntityClass {
        self.valid_on
    }

    /// Returns `true` if the marker may be attached to a node of `class`.
    #[must_use]
    pub fn is_valid_on(&self, class: EntityClass) -> bool {
        self.valid_on.intersects(class)
    }
}

impl PartialEq for Marker {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Marker {}

impl PartialOrd for Marker {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Marker {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(other.name)
    }
}

impl Hash for Marker {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)
    }
}

/// Either kind of label a contract can mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagOrMarker {
    /// A session-global tag
    Tag(Tag),
    /// A per-node marker
    Marker(Marker),
}

impl TagOrMarker {
    /// Returns the label name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tag(tag) => tag.name(),
            Self::Marker(marker) => marker.name(),
        }
    }

    /// Returns the tag, if this label is one
    #[must_use]
    pub fn as_tag(&self) -> Option<Tag> {
        match self {
            Self::Tag(tag) => Some(*tag),
            Self::Marker(_) => None,
        }
    }

    /// Returns the marker, if this label is one
    #[must_use]
    pub fn as_marker(&self) -> Option<Marker> {
        match self {
            Self::Tag(_) => None,
            Self::Marker(marker) => Some(*marker),
        }
    }
}

impl From<Tag> for TagOrMarker {
    fn from(tag: Tag) -> Self {
        Self::Tag(tag)
    }
}

impl From<Marker> for TagOrMarker {
    fn from(marker: Marker) -> Self {
        Self::Marker(marker)
    }
}

impl fmt::Display for TagOrMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(tag) => tag.fmt(f),
            Self::Marker(marker) => marker.fmt(f),
        }
    }
}

/// An ordered set of tags and markers.
///
/// Used both for contract clauses (`needs`, `adds`, ...) and for the working state the
/// planner and the plan builder simulate.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelSet(BTreeSet<TagOrMarker>);

impl LabelSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        LabelSet(BTreeSet::new())
    }

    /// Inserts a label, returning whether it was newly added.
    pub fn insert(&mut self, label: impl Into<TagOrMarker>) -> bool {
        self.0.insert(label.into())
    }

    /// Removes a label, returning whether it was present.
    pub fn remove(&mut self, label: impl Into<TagOrMarker>) -> bool {
        self.0.remove(&label.into())
    }

    /// Returns `true` if the label is present.
    #[must_use]
    pub fn contains(&self, label: impl Into<TagOrMarker>) -> bool {
        self.0.contains(&label.into())
    }

    /// Number of labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates in label order.
    pub fn iter(&self) -> impl Iterator<Item = &TagOrMarker> + '_ {
        self.0.iter()
    }

    /// Iterates over the tags only.
    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.0.iter().filter_map(TagOrMarker::as_tag)
    }

    /// Iterates over the markers only.
    pub fn markers(&self) -> impl Iterator<Item = Marker> + '_ {
        self.0.iter().filter_map(TagOrMarker::as_marker)
    }

    /// Returns `true` if every label of `self` is in `other`.
    #[must_use]
    pub fn is_subset(&self, other: &LabelSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Returns `true` if the sets share no label.
    #[must_use]
    pub fn is_disjoint(&self, other: &LabelSet) -> bool {
        self.0.is_disjoint(&other.0)
    }

    /// Labels present in both sets.
    #[must_use]
    pub fn intersection(&self, other: &LabelSet) -> LabelSet {
        LabelSet(self.0.intersection(&other.0).copied().collect())
    }

    /// Labels of `self` missing from `other`.
    #[must_use]
    pub fn difference(&self, other: &LabelSet) -> LabelSet {
        LabelSet(self.0.difference(&other.0).copied().collect())
    }

    /// Adds every label of `other`.
    pub fn union_with(&mut self, other: &LabelSet) {
        self.0.extend(other.0.iter().copied());
    }

    /// Removes every label of `other`.
    pub fn subtract(&mut self, other: &LabelSet) {
        for label in &other.0 {
            self.0.remove(label);
        }
    }
}

impl<L: Into<TagOrMarker>> FromIterator<L> for LabelSet {
    fn from_iter<T: IntoIterator<Item = L>>(iter: T) -> Self {
        LabelSet(iter.into_iter().map(Into::into).collect())
    }
}

impl<L: Into<TagOrMarker>> Extend<L> for LabelSet {
    fn extend<T: IntoIterator<Item = L>>(&mut self, iter: T) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

impl<'a> IntoIterator for &'a LabelSet {
    type Item = &'a TagOrMarker;
    type IntoIter = std::collections::btree_set::Iter<'a, TagOrMarker>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            label.fmt(f)?;
        }
        f.write_str("}")
    }
}
