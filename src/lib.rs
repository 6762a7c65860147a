pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod repository;
pub mod screen;
pub mod tags;
pub mod viewmodel;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use db::Database;
pub use error::{StoreError, StoreResult, ValidationError};
pub use models::{Color, ColorId, Note, NoteBuilder, NoteId, Tag, TagId};
pub use repository::{LiveNotes, Repository, SqliteRepository};
pub use screen::{ScreenEvent, ScreenEvents, ScreenScope, ViewState};
pub use viewmodel::{
    NoteOverviewItem, NoteScreenMode, NotesOverviewViewModel, SaveNoteViewData,
    SaveNoteViewModel,
};
