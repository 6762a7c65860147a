//! Asynchronous facade over the note, tag and color storage.
//!
//! View-models only talk to [`Repository`]. [`SqliteRepository`] is the
//! production implementation: every call runs on tokio's blocking pool so
//! the caller's context never waits on SQLite.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::db::Database;
use crate::error::StoreResult;
use crate::models::{Color, ColorId, Note, NoteId, Tag, TagId};

/// Storage operations as one asynchronous surface.
///
/// Single-row lookups return `Ok(None)` when the row does not exist.
#[async_trait]
pub trait Repository: Send + Sync {
    /// All notes in insertion order.
    async fn fetch_notes(&self) -> StoreResult<Vec<Note>>;

    /// Live notes sequence: the current list, then a fresh list after every
    /// note mutation. Dropping the returned value releases the subscription.
    fn observe_notes(&self) -> LiveNotes;

    async fn fetch_notes_by_ids(&self, ids: Vec<NoteId>) -> StoreResult<Vec<Note>>;

    async fn fetch_note(&self, id: NoteId) -> StoreResult<Option<Note>>;

    /// Inserts a new note or replaces the stored note with the same id.
    async fn insert_note(&self, note: Note) -> StoreResult<NoteId>;

    async fn insert_notes(&self, notes: Vec<Note>) -> StoreResult<Vec<NoteId>>;

    /// Returns `false` when there was nothing to delete.
    async fn delete_note(&self, id: NoteId) -> StoreResult<bool>;

    async fn fetch_tags(&self) -> StoreResult<Vec<Tag>>;

    async fn fetch_tag(&self, id: TagId) -> StoreResult<Option<Tag>>;

    async fn fetch_tags_by_ids(&self, ids: Vec<TagId>) -> StoreResult<Vec<Tag>>;

    /// Exact-match lookup of a tag id by title.
    async fn fetch_tag_id(&self, title: &str) -> StoreResult<Option<TagId>>;

    async fn add_tag(&self, title: &str) -> StoreResult<TagId>;

    /// Atomic lookup-or-insert of a tag by title.
    async fn get_or_create_tag(&self, title: &str) -> StoreResult<TagId>;

    async fn fetch_colors(&self) -> StoreResult<Vec<Color>>;

    async fn fetch_color(&self, id: ColorId) -> StoreResult<Option<Color>>;
}

/// A cancelable live sequence of note lists.
///
/// Consecutive changes may be coalesced; the latest list always arrives.
pub struct LiveNotes {
    rx: mpsc::Receiver<StoreResult<Vec<Note>>>,
    _guard: DropGuard,
}

impl LiveNotes {
    /// Wraps a channel fed by a producer that stops once `token` is
    /// cancelled. The token is cancelled when this value is dropped.
    pub fn new(rx: mpsc::Receiver<StoreResult<Vec<Note>>>, token: CancellationToken) -> Self {
        Self {
            rx,
            _guard: token.drop_guard(),
        }
    }

    /// Waits for the next list. `None` once the producer has stopped.
    pub async fn next(&mut self) -> Option<StoreResult<Vec<Note>>> {
        self.rx.recv().await
    }
}

/// [`Repository`] backed by a SQLite [`Database`].
pub struct SqliteRepository {
    db: Arc<Mutex<Database>>,
    changes: watch::Sender<u64>,
}

impl SqliteRepository {
    pub fn new(db: Database) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            db: Arc::new(Mutex::new(db)),
            changes,
        }
    }

    /// Runs `f` against the database on the blocking pool.
    async fn run<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        run_blocking(Arc::clone(&self.db), f).await
    }

    /// Like [`run`](Self::run), then wakes live note sequences if `f`
    /// succeeded.
    async fn mutate<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let value = self.run(f).await?;
        self.changes.send_modify(|version| *version += 1);
        Ok(value)
    }
}

async fn run_blocking<T, F>(db: Arc<Mutex<Database>>, f: F) -> StoreResult<T>
where
    F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let db = db.lock().unwrap_or_else(PoisonError::into_inner);
        f(&db)
    })
    .await?
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn fetch_notes(&self) -> StoreResult<Vec<Note>> {
        self.run(|db| db.list_notes()).await
    }

    fn observe_notes(&self) -> LiveNotes {
        let (tx, rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let mut changes = self.changes.subscribe();
        let db = Arc::clone(&self.db);

        tokio::spawn(async move {
            loop {
                // Mark seen before loading so a write racing the load
                // triggers another round.
                changes.borrow_and_update();
                let notes = run_blocking(Arc::clone(&db), |db| db.list_notes()).await;

                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    sent = tx.send(notes) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        LiveNotes::new(rx, token)
    }

    async fn fetch_notes_by_ids(&self, ids: Vec<NoteId>) -> StoreResult<Vec<Note>> {
        self.run(move |db| db.find_notes_by_ids(&ids)).await
    }

    async fn fetch_note(&self, id: NoteId) -> StoreResult<Option<Note>> {
        self.run(move |db| db.find_note(id)).await
    }

    async fn insert_note(&self, note: Note) -> StoreResult<NoteId> {
        self.mutate(move |db| db.upsert_note(&note)).await
    }

    async fn insert_notes(&self, notes: Vec<Note>) -> StoreResult<Vec<NoteId>> {
        self.mutate(move |db| db.upsert_notes(&notes)).await
    }

    async fn delete_note(&self, id: NoteId) -> StoreResult<bool> {
        self.mutate(move |db| db.delete_note(id)).await
    }

    async fn fetch_tags(&self) -> StoreResult<Vec<Tag>> {
        self.run(|db| db.list_tags()).await
    }

    async fn fetch_tag(&self, id: TagId) -> StoreResult<Option<Tag>> {
        self.run(move |db| db.find_tag(id)).await
    }

    async fn fetch_tags_by_ids(&self, ids: Vec<TagId>) -> StoreResult<Vec<Tag>> {
        self.run(move |db| db.find_tags_by_ids(&ids)).await
    }

    async fn fetch_tag_id(&self, title: &str) -> StoreResult<Option<TagId>> {
        let title = title.to_owned();
        self.run(move |db| db.find_tag_id_by_title(&title)).await
    }

    async fn add_tag(&self, title: &str) -> StoreResult<TagId> {
        let title = title.to_owned();
        self.run(move |db| db.insert_tag(&title)).await
    }

    async fn get_or_create_tag(&self, title: &str) -> StoreResult<TagId> {
        let title = title.to_owned();
        self.run(move |db| db.get_or_create_tag(&title)).await
    }

    async fn fetch_colors(&self) -> StoreResult<Vec<Color>> {
        self.run(|db| db.list_colors()).await
    }

    async fn fetch_color(&self, id: ColorId) -> StoreResult<Option<Color>> {
        self.run(move |db| db.find_color(id)).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn repository() -> SqliteRepository {
        SqliteRepository::new(Database::in_memory().expect("failed to create in-memory database"))
    }

    #[tokio::test]
    async fn insert_then_fetch_round_trips() {
        let repo = repository();
        let tag = repo.add_tag("work").await.unwrap();

        let id = repo
            .insert_note(
                crate::NoteBuilder::new()
                    .title("A")
                    .content("B")
                    .tag_id(Some(tag))
                    .build(),
            )
            .await
            .unwrap();

        let note = repo.fetch_note(id).await.unwrap().expect("note should exist");
        assert_eq!(note.title(), "A");
        assert_eq!(note.content(), "B");
        assert_eq!(note.tag_id(), Some(tag));
    }

    #[tokio::test]
    async fn fetch_tag_id_distinguishes_missing_from_present() {
        let repo = repository();
        assert_eq!(repo.fetch_tag_id("none").await.unwrap(), None);

        let id = repo.add_tag("some").await.unwrap();
        assert_eq!(repo.fetch_tag_id("some").await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn concurrent_get_or_create_yields_one_row() {
        let repo = Arc::new(repository());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move { repo.get_or_create_tag("work").await.unwrap() })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }

        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(repo.fetch_tags().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn live_notes_emits_current_list_then_updates() {
        let repo = repository();
        repo.insert_note(Note::new("first", "")).await.unwrap();

        let mut live = repo.observe_notes();
        let initial = live.next().await.unwrap().unwrap();
        assert_eq!(initial.len(), 1);

        repo.insert_note(Note::new("second", "")).await.unwrap();
        let updated = tokio::time::timeout(Duration::from_secs(5), live.next())
            .await
            .expect("live sequence should push an update")
            .unwrap()
            .unwrap();
        assert_eq!(updated.len(), 2);
    }

    #[tokio::test]
    async fn live_notes_reflects_deletes() {
        let repo = repository();
        let id = repo.insert_note(Note::new("doomed", "")).await.unwrap();

        let mut live = repo.observe_notes();
        assert_eq!(live.next().await.unwrap().unwrap().len(), 1);

        assert!(repo.delete_note(id).await.unwrap());
        let after = tokio::time::timeout(Duration::from_secs(5), live.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(after.is_empty());
    }
}
