use serde::{Deserialize, Serialize};

use super::TagId;

/// A user-defined label, resolved by title to a stable id.
///
/// Titles are unique: the storage layer never holds two tags with the same
/// title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    id: TagId,
    title: String,
}

impl Tag {
    /// Creates a new tag.
    ///
    /// # Examples
    ///
    /// ```
    /// use notemaker::{Tag, TagId};
    ///
    /// let tag = Tag::new(TagId::new(1), "work");
    /// assert_eq!(tag.id(), TagId::new(1));
    /// assert_eq!(tag.title(), "work");
    /// ```
    pub fn new(id: TagId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
        }
    }

    /// Returns the tag's unique identifier.
    pub fn id(&self) -> TagId {
        self.id
    }

    /// Returns the tag's title.
    pub fn title(&self) -> &str {
        &self.title
    }
}
