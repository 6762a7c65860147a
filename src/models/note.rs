use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{ColorId, NoteId, TagId};

/// A user-authored note: a title, free-form content and an optional tag and
/// color.
///
/// A note without an id has never been saved. Saving it assigns an id;
/// saving a note that already has one replaces the stored row in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    id: Option<NoteId>,
    title: String,
    content: String,
    tag_id: Option<TagId>,
    color_id: Option<ColorId>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

impl Note {
    /// Creates a new, unsaved note with no tag and no color.
    ///
    /// # Examples
    ///
    /// ```
    /// use notemaker::Note;
    ///
    /// let note = Note::new("Groceries", "milk, eggs");
    /// assert!(note.id().is_none());
    /// assert_eq!(note.title(), "Groceries");
    /// assert_eq!(note.tag_id(), None);
    /// ```
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        NoteBuilder::new().title(title).content(content).build()
    }

    /// Returns the note's id, or `None` if it has not been saved yet.
    pub fn id(&self) -> Option<NoteId> {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn tag_id(&self) -> Option<TagId> {
        self.tag_id
    }

    pub fn color_id(&self) -> Option<ColorId> {
        self.color_id
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn updated_at(&self) -> OffsetDateTime {
        self.updated_at
    }

    /// Returns a copy of this note carrying the given id.
    pub fn with_id(mut self, id: NoteId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Builder for constructing `Note` instances with optional fields.
///
/// # Examples
///
/// ```
/// use notemaker::{NoteBuilder, NoteId, TagId};
///
/// let note = NoteBuilder::new()
///     .id(NoteId::new(1))
///     .title("Standup")
///     .content("ship the release")
///     .tag_id(Some(TagId::new(2)))
///     .build();
///
/// assert_eq!(note.id(), Some(NoteId::new(1)));
/// assert_eq!(note.tag_id(), Some(TagId::new(2)));
/// assert_eq!(note.color_id(), None);
/// ```
#[derive(Debug, Default)]
pub struct NoteBuilder {
    id: Option<NoteId>,
    title: Option<String>,
    content: Option<String>,
    tag_id: Option<TagId>,
    color_id: Option<ColorId>,
    created_at: Option<OffsetDateTime>,
    updated_at: Option<OffsetDateTime>,
}

impl NoteBuilder {
    /// Creates a new `NoteBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the note ID.
    pub fn id(mut self, id: NoteId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the note title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the note content.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Sets the tag reference. `None` means no tag.
    pub fn tag_id(mut self, tag_id: Option<TagId>) -> Self {
        self.tag_id = tag_id;
        self
    }

    /// Sets the color reference. `None` means the default color.
    pub fn color_id(mut self, color_id: Option<ColorId>) -> Self {
        self.color_id = color_id;
        self
    }

    /// Sets the created timestamp.
    pub fn created_at(mut self, created_at: OffsetDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Sets the updated timestamp.
    pub fn updated_at(mut self, updated_at: OffsetDateTime) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Builds the `Note`, using empty text and the current time for fields
    /// that were not set.
    pub fn build(self) -> Note {
        let now = OffsetDateTime::now_utc();
        Note {
            id: self.id,
            title: self.title.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            tag_id: self.tag_id,
            color_id: self.color_id,
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        }
    }
}
