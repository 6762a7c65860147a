//! Repository test double shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Notify, watch};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::models::{Color, ColorId, Note, NoteId, Tag, TagId};
use crate::repository::{LiveNotes, Repository, SqliteRepository};

/// Wraps an in-memory [`SqliteRepository`], counting calls, injecting a
/// failure on demand and optionally holding note inserts until released.
pub struct CountingRepository {
    inner: SqliteRepository,
    calls: AtomicUsize,
    fail_next: AtomicBool,
    hold_inserts: AtomicBool,
    insert_started: Notify,
    release: watch::Sender<bool>,
}

impl CountingRepository {
    pub fn new() -> Self {
        let (release, _) = watch::channel(false);
        Self {
            inner: SqliteRepository::new(
                Database::in_memory().expect("failed to create in-memory database"),
            ),
            calls: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
            hold_inserts: AtomicBool::new(false),
            insert_started: Notify::new(),
            release,
        }
    }

    /// Number of repository calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Makes the next call fail with a database error.
    pub fn fail_next_call(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Blocks every `insert_note` until [`release_inserts`](Self::release_inserts).
    pub fn hold_inserts(&self) {
        self.hold_inserts.store(true, Ordering::SeqCst);
    }

    pub fn release_inserts(&self) {
        self.release.send_replace(true);
    }

    /// Resolves once a held insert has started.
    pub async fn insert_started(&self) {
        self.insert_started.notified().await;
    }

    pub async fn note_count(&self) -> usize {
        self.inner.fetch_notes().await.expect("fetch notes").len()
    }

    pub async fn tag_count(&self) -> usize {
        self.inner.fetch_tags().await.expect("fetch tags").len()
    }

    fn record(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Database(rusqlite::Error::InvalidQuery));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for CountingRepository {
    async fn fetch_notes(&self) -> StoreResult<Vec<Note>> {
        self.record()?;
        self.inner.fetch_notes().await
    }

    fn observe_notes(&self) -> LiveNotes {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.observe_notes()
    }

    async fn fetch_notes_by_ids(&self, ids: Vec<NoteId>) -> StoreResult<Vec<Note>> {
        self.record()?;
        self.inner.fetch_notes_by_ids(ids).await
    }

    async fn fetch_note(&self, id: NoteId) -> StoreResult<Option<Note>> {
        self.record()?;
        self.inner.fetch_note(id).await
    }

    async fn insert_note(&self, note: Note) -> StoreResult<NoteId> {
        self.record()?;
        if self.hold_inserts.load(Ordering::SeqCst) {
            let mut release = self.release.subscribe();
            self.insert_started.notify_one();
            let _ = release.wait_for(|open| *open).await;
        }
        self.inner.insert_note(note).await
    }

    async fn insert_notes(&self, notes: Vec<Note>) -> StoreResult<Vec<NoteId>> {
        self.record()?;
        self.inner.insert_notes(notes).await
    }

    async fn delete_note(&self, id: NoteId) -> StoreResult<bool> {
        self.record()?;
        self.inner.delete_note(id).await
    }

    async fn fetch_tags(&self) -> StoreResult<Vec<Tag>> {
        self.record()?;
        self.inner.fetch_tags().await
    }

    async fn fetch_tag(&self, id: TagId) -> StoreResult<Option<Tag>> {
        self.record()?;
        self.inner.fetch_tag(id).await
    }

    async fn fetch_tags_by_ids(&self, ids: Vec<TagId>) -> StoreResult<Vec<Tag>> {
        self.record()?;
        self.inner.fetch_tags_by_ids(ids).await
    }

    async fn fetch_tag_id(&self, title: &str) -> StoreResult<Option<TagId>> {
        self.record()?;
        self.inner.fetch_tag_id(title).await
    }

    async fn add_tag(&self, title: &str) -> StoreResult<TagId> {
        self.record()?;
        self.inner.add_tag(title).await
    }

    async fn get_or_create_tag(&self, title: &str) -> StoreResult<TagId> {
        self.record()?;
        self.inner.get_or_create_tag(title).await
    }

    async fn fetch_colors(&self) -> StoreResult<Vec<Color>> {
        self.record()?;
        self.inner.fetch_colors().await
    }

    async fn fetch_color(&self, id: ColorId) -> StoreResult<Option<Color>> {
        self.record()?;
        self.inner.fetch_color(id).await
    }
}
