use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

use crate::error::{StoreResult, ValidationError};
use crate::models::{Color, NoteBuilder, NoteId, TagId};
use crate::repository::Repository;
use crate::screen::{ScreenEvent, ScreenEvents, ScreenScope, ViewState};
use crate::tags;

/// Whether a note screen creates a new note or edits a stored one.
///
/// Fixed for the life of the screen instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteScreenMode {
    Create,
    Edit(NoteId),
}

impl NoteScreenMode {
    pub fn note_id(self) -> Option<NoteId> {
        match self {
            Self::Create => None,
            Self::Edit(id) => Some(id),
        }
    }
}

/// What the note screen renders: the note's text, its tag title (empty for
/// none) and its color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveNoteViewData {
    pub title: String,
    pub content: String,
    pub tag: String,
    pub color: Color,
}

impl SaveNoteViewData {
    fn blank() -> Self {
        Self {
            title: String::new(),
            content: String::new(),
            tag: String::new(),
            color: Color::default_color(),
        }
    }
}

/// State shared between the view-model and the work it spawns.
struct Shared {
    view_data: watch::Sender<ViewState<SaveNoteViewData>>,
    colors: watch::Sender<ViewState<Vec<Color>>>,
    events: mpsc::UnboundedSender<ScreenEvent>,
    /// Color picked on this screen; `None` keeps whatever the note has.
    selected_color: Mutex<Option<Color>>,
    /// Note stored by the last successful save.
    saved: watch::Sender<Option<NoteId>>,
}

impl Shared {
    fn selected_color(&self) -> Option<Color> {
        self.selected_color
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn saved(&self, note_id: NoteId) {
        self.saved.send_replace(Some(note_id));
        self.close();
    }

    fn close(&self) {
        // The receiver may be gone already; nobody is left to close then.
        let _ = self.events.send(ScreenEvent::Close);
    }
}

/// View-model of the create/edit note screen.
///
/// Intents (`save_note`, `delete_note`, ...) return immediately; their
/// storage work runs in the background and lands in [`view_data`] or as a
/// [`ScreenEvent::Close`]. Writes are applied one at a time in the order
/// the intents were called. Dropping the view-model or calling
/// [`teardown`](Self::teardown) revokes all of it.
///
/// [`view_data`]: Self::view_data
pub struct SaveNoteViewModel {
    repository: Arc<dyn Repository>,
    mode: NoteScreenMode,
    scope: ScreenScope,
    shared: Arc<Shared>,
    events: Mutex<Option<ScreenEvents>>,
    writer: Mutex<Option<mpsc::UnboundedSender<WriteJob>>>,
}

impl SaveNoteViewModel {
    pub fn new(repository: Arc<dyn Repository>, mode: NoteScreenMode) -> Self {
        let (view_data, _) = watch::channel(ViewState::Loading);
        let (colors, _) = watch::channel(ViewState::Loading);
        let (events_tx, events) = ScreenEvents::channel();
        let (saved, _) = watch::channel(None);

        Self {
            repository,
            mode,
            scope: ScreenScope::new(),
            shared: Arc::new(Shared {
                view_data,
                colors,
                events: events_tx,
                selected_color: Mutex::new(None),
                saved,
            }),
            events: Mutex::new(Some(events)),
            writer: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> NoteScreenMode {
        self.mode
    }

    pub fn view_data(&self) -> watch::Receiver<ViewState<SaveNoteViewData>> {
        self.shared.view_data.subscribe()
    }

    pub fn colors(&self) -> watch::Receiver<ViewState<Vec<Color>>> {
        self.shared.colors.subscribe()
    }

    /// Id of the note stored by the last successful save. Set before the
    /// matching [`ScreenEvent::Close`] is sent.
    pub fn saved_note(&self) -> Option<NoteId> {
        *self.shared.saved.borrow()
    }

    /// Hands out the screen's event receiver. Only the first call gets it.
    pub fn take_events(&self) -> Option<ScreenEvents> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Loads what the screen shows.
    ///
    /// A new note is ready at once with blank fields. An existing note is
    /// loaded with its tag title and color; if it no longer exists the
    /// state stays `Loading`.
    pub fn fetch_view_data(&self) {
        let NoteScreenMode::Edit(note_id) = self.mode else {
            let shared = Arc::clone(&self.shared);
            self.scope.publish(|| {
                let mut data = SaveNoteViewData::blank();
                if let Some(color) = shared.selected_color() {
                    data.color = color;
                }
                shared.view_data.send_replace(ViewState::Ready(data));
            });
            return;
        };

        let repository = Arc::clone(&self.repository);
        let shared = Arc::clone(&self.shared);
        let scope = self.scope.clone();

        self.scope.spawn(async move {
            match load_view_data(repository.as_ref(), note_id).await {
                Ok(Some(mut data)) => {
                    scope.publish(|| {
                        if let Some(color) = shared.selected_color() {
                            data.color = color;
                        }
                        shared.view_data.send_replace(ViewState::Ready(data));
                    });
                }
                Ok(None) => warn!(%note_id, "note to edit no longer exists"),
                Err(e) => error!(%note_id, error = %e, "error while fetching note"),
            }
        });
    }

    /// Loads the color palette.
    pub fn fetch_colors(&self) {
        let repository = Arc::clone(&self.repository);
        let shared = Arc::clone(&self.shared);
        let scope = self.scope.clone();

        self.scope.spawn(async move {
            match repository.fetch_colors().await {
                Ok(colors) => {
                    scope.publish(|| {
                        shared.colors.send_replace(ViewState::Ready(colors));
                    });
                }
                Err(e) => error!(error = %e, "error while fetching colors"),
            }
        });
    }

    /// Saves the note, then closes the screen.
    ///
    /// The tag is resolved by name and created if it does not exist yet; an
    /// empty tag means none. A blank title is rejected before anything is
    /// stored.
    pub fn save_note(&self, title: &str, content: &str, tag: &str) -> Result<(), ValidationError> {
        if title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }

        self.enqueue(WriteJob::Save {
            draft: Draft {
                title: title.to_string(),
                content: content.to_string(),
                selected_color: self.shared.selected_color(),
            },
            tag: tag.to_string(),
        });

        Ok(())
    }

    /// Picks a color for the note.
    ///
    /// The screen shows the new color right away. When editing a stored
    /// note the change is saved immediately, keeping the note's tag; a blank
    /// title then yields `Err(EmptyTitle)` and only the selection changes.
    /// A new note keeps the color until [`save_note`](Self::save_note).
    pub fn color_note(
        &self,
        title: &str,
        content: &str,
        color: Color,
    ) -> Result<(), ValidationError> {
        *self
            .shared
            .selected_color
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(color.clone());

        let shared = &self.shared;
        self.scope.publish(|| {
            let tag = shared
                .view_data
                .borrow()
                .ready()
                .map(|data| data.tag.clone())
                .unwrap_or_default();
            shared
                .view_data
                .send_replace(ViewState::Ready(SaveNoteViewData {
                    title: title.to_string(),
                    content: content.to_string(),
                    tag,
                    color: color.clone(),
                }));
        });

        if self.mode == NoteScreenMode::Create {
            return Ok(());
        }
        if title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }

        self.enqueue(WriteJob::Color(Draft {
            title: title.to_string(),
            content: content.to_string(),
            selected_color: Some(color),
        }));

        Ok(())
    }

    /// Deletes the note being edited, then closes the screen.
    pub fn delete_note(&self) -> Result<(), ValidationError> {
        let NoteScreenMode::Edit(note_id) = self.mode else {
            return Err(ValidationError::NotPersisted);
        };

        self.enqueue(WriteJob::Delete(note_id));

        Ok(())
    }

    /// Queues a write behind every earlier one from this screen.
    ///
    /// The worker draining the queue starts on first use and stops with the
    /// screen's scope.
    fn enqueue(&self, job: WriteJob) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let jobs = writer.get_or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            self.scope.spawn(apply_writes(
                Arc::clone(&self.repository),
                Arc::clone(&self.shared),
                self.scope.clone(),
                self.mode,
                rx,
            ));
            tx
        });
        // Only fails once the scope is revoked.
        let _ = jobs.send(job);
    }

    /// Revokes all outstanding work. Nothing is published afterwards.
    pub fn teardown(&self) {
        self.scope.revoke();
    }
}

impl Drop for SaveNoteViewModel {
    fn drop(&mut self) {
        self.scope.revoke();
    }
}

struct Draft {
    title: String,
    content: String,
    selected_color: Option<Color>,
}

/// A storage write requested by an intent.
enum WriteJob {
    Save { draft: Draft, tag: String },
    Color(Draft),
    Delete(NoteId),
}

enum TagChoice {
    Set(Option<TagId>),
    /// Keep the stored note's tag.
    Keep,
}

async fn load_view_data(
    repository: &dyn Repository,
    note_id: NoteId,
) -> StoreResult<Option<SaveNoteViewData>> {
    let Some(note) = repository.fetch_note(note_id).await? else {
        return Ok(None);
    };

    let tag = tags::resolve_tag_title(repository, note.tag_id()).await?;
    let color = match note.color_id() {
        Some(color_id) => repository.fetch_color(color_id).await?,
        None => None,
    };

    Ok(Some(SaveNoteViewData {
        title: note.title().to_string(),
        content: note.content().to_string(),
        tag,
        color: color.unwrap_or_default(),
    }))
}

/// Applies queued writes in order until the queue or the scope closes.
async fn apply_writes(
    repository: Arc<dyn Repository>,
    shared: Arc<Shared>,
    scope: ScreenScope,
    mode: NoteScreenMode,
    mut jobs: mpsc::UnboundedReceiver<WriteJob>,
) {
    while let Some(job) = jobs.recv().await {
        match job {
            WriteJob::Save { draft, tag } => {
                match save(repository.as_ref(), mode, draft, &tag).await {
                    Ok(note_id) => {
                        debug!(%note_id, "note saved");
                        scope.publish(|| shared.saved(note_id));
                    }
                    Err(e) => error!(error = %e, "error while saving note"),
                }
            }
            WriteJob::Color(draft) => {
                match persist(repository.as_ref(), mode, draft, TagChoice::Keep).await {
                    Ok(note_id) => debug!(%note_id, "note color saved"),
                    Err(e) => error!(error = %e, "error while saving note color"),
                }
            }
            WriteJob::Delete(note_id) => match repository.delete_note(note_id).await {
                Ok(_) => {
                    debug!(%note_id, "note deleted");
                    scope.publish(|| shared.close());
                }
                Err(e) => error!(%note_id, error = %e, "error while deleting note"),
            },
        }
    }
}

async fn save(
    repository: &dyn Repository,
    mode: NoteScreenMode,
    draft: Draft,
    tag: &str,
) -> StoreResult<NoteId> {
    let tag_id = tags::resolve_tag_id(repository, tag).await?;
    persist(repository, mode, draft, TagChoice::Set(tag_id)).await
}

/// Inserts or replaces the note behind the screen.
///
/// Fields the screen does not own (tag on `Keep`, color with no selection)
/// come from the stored note when editing.
async fn persist(
    repository: &dyn Repository,
    mode: NoteScreenMode,
    draft: Draft,
    tag: TagChoice,
) -> StoreResult<NoteId> {
    let stored = match mode {
        NoteScreenMode::Edit(id) => repository.fetch_note(id).await?,
        NoteScreenMode::Create => None,
    };

    let tag_id = match tag {
        TagChoice::Set(tag_id) => tag_id,
        TagChoice::Keep => stored.as_ref().and_then(|note| note.tag_id()),
    };
    let color_id = match draft.selected_color {
        Some(color) => Some(color.id()),
        None => stored.as_ref().and_then(|note| note.color_id()),
    };

    let mut builder = NoteBuilder::new()
        .title(draft.title)
        .content(draft.content)
        .tag_id(tag_id)
        .color_id(color_id);
    if let Some(id) = mode.note_id() {
        builder = builder.id(id);
    }

    repository.insert_note(builder.build()).await
}
