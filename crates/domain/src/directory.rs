//! Directory listing entries.

use serde::{Deserialize, Serialize};

use crate::id::ComponentId;

/// Pattern prefix selecting components related to a given id.
pub const RELATED_PATTERN_PREFIX: &str = "@related=";

/// A `(name, id, category)` triple describing one registered component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub id: ComponentId,
    pub category: String,
}

/// A parsed `list` pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListPattern<'a> {
    /// Every registered component.
    All,
    /// Components related to the given id (raw text, not parsed).
    RelatedTo(&'a str),
    /// A pattern nothing matches.
    Unmatched,
}

impl<'a> ListPattern<'a> {
    #[must_use]
    pub fn parse(pattern: &'a str) -> Self {
        if pattern.is_empty() {
            return Self::All;
        }
        match pattern.strip_prefix(RELATED_PATTERN_PREFIX) {
            Some(id) if !id.is_empty() => Self::RelatedTo(id),
            _ => Self::Unmatched,
        }
    }
}

/// Whether a component name marks it as provisional (never auto-activated).
#[must_use]
pub fn is_provisional(name: &str) -> bool {
    name.starts_with('#')
}
