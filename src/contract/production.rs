use std::{fmt, hash::Hash};

use crate::contract::{label::LabelSet, Tag};

/// A named deliverable the driver wants to exist when the plan finishes.
///
/// A production is satisfied once every one of its defining tags holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Production {
    name: &'static str,
    requires: &'static [Tag],
}

impl Production {
    /// Declares a production defined by `requires`.
    #[must_use]
    pub const fn new(name: &'static str, requires: &'static [Tag]) -> Self {
        Production { name, requires }
    }

    /// Returns the production name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Tags that define the production
    #[must_use]
    pub const fn requires(&self) -> &'static [Tag] {
        self.requires
    }

    /// Returns `true` if every defining tag is in `state`.
    #[must_use]
    pub fn is_satisfied_by(&self, state: &LabelSet) -> bool {
        self.requires.iter().all(|tag| state.contains(*tag))
    }

    /// Defining tags absent from `state`.
    pub fn missing_in<'a>(&'a self, state: &'a LabelSet) -> impl Iterator<Item = Tag> + 'a {
        self.requires
            .iter()
            .copied()
            .filter(move |tag| !state.contains(*tag))
    }
}

impl fmt::Display for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
