mod color;
mod ids;
mod note;
mod tag;

pub use color::Color;
pub use ids::{ColorId, NoteId, TagId};
pub use note::{Note, NoteBuilder};
pub use tag::Tag;
