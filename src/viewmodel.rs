//! Screen-scoped view-models.
//!
//! Each view-model takes its repository as a constructor argument, exposes
//! observable state through `tokio::sync::watch` receivers and revokes all
//! of its background work on teardown.

mod notes_overview;
mod save_note;

pub use notes_overview::{NoteOverviewItem, NotesOverviewViewModel};
pub use save_note::{NoteScreenMode, SaveNoteViewData, SaveNoteViewModel};
