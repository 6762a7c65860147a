use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error};

use crate::error::StoreResult;
use crate::models::{Color, Note, NoteId};
use crate::repository::Repository;
use crate::screen::{ScreenScope, ViewState};

/// One row of the notes list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteOverviewItem {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    pub tag: Option<String>,
    pub color: Color,
}

/// View-model of the notes list screen.
///
/// While visible it follows the live notes sequence, so the list updates as
/// notes are saved or deleted anywhere in the app.
pub struct NotesOverviewViewModel {
    repository: Arc<dyn Repository>,
    scope: ScreenScope,
    notes: Arc<watch::Sender<ViewState<Vec<NoteOverviewItem>>>>,
    subscription: Mutex<Option<ScreenScope>>,
}

impl NotesOverviewViewModel {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        let (notes, _) = watch::channel(ViewState::Loading);
        Self {
            repository,
            scope: ScreenScope::new(),
            notes: Arc::new(notes),
            subscription: Mutex::new(None),
        }
    }

    pub fn notes(&self) -> watch::Receiver<ViewState<Vec<NoteOverviewItem>>> {
        self.notes.subscribe()
    }

    /// Subscribes to the live notes list, replacing any earlier
    /// subscription.
    pub fn on_visible(&self) {
        let subscription = self.scope.child();
        if let Some(previous) = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(subscription.clone())
        {
            previous.revoke();
        }

        let repository = Arc::clone(&self.repository);
        let notes = Arc::clone(&self.notes);
        let scope = subscription.clone();

        subscription.spawn(async move {
            let mut live = repository.observe_notes();
            while let Some(result) = live.next().await {
                let items = match result {
                    Ok(list) => overview_items(repository.as_ref(), list).await,
                    Err(e) => Err(e),
                };
                match items {
                    Ok(items) => {
                        debug!(count = items.len(), "notes list updated");
                        scope.publish(|| {
                            notes.send_replace(ViewState::Ready(items));
                        });
                    }
                    Err(e) => error!(error = %e, "error while fetching notes"),
                }
            }
        });
    }

    /// Releases the live subscription; the last list stays visible.
    pub fn on_hidden(&self) {
        if let Some(subscription) = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            subscription.revoke();
        }
    }

    /// Revokes all outstanding work. Nothing is published afterwards.
    pub fn teardown(&self) {
        self.scope.revoke();
    }
}

impl Drop for NotesOverviewViewModel {
    fn drop(&mut self) {
        self.scope.revoke();
    }
}

/// Joins notes with their tag titles and colors.
async fn overview_items(
    repository: &dyn Repository,
    notes: Vec<Note>,
) -> StoreResult<Vec<NoteOverviewItem>> {
    let mut tag_ids: Vec<_> = notes.iter().filter_map(Note::tag_id).collect();
    tag_ids.sort_unstable();
    tag_ids.dedup();

    let tags: HashMap<_, _> = repository
        .fetch_tags_by_ids(tag_ids)
        .await?
        .into_iter()
        .map(|tag| (tag.id(), tag.title().to_string()))
        .collect();
    let colors: HashMap<_, _> = repository
        .fetch_colors()
        .await?
        .into_iter()
        .map(|color| (color.id(), color))
        .collect();

    Ok(notes
        .into_iter()
        .filter_map(|note| {
            let id = note.id()?;
            let tag = note.tag_id().and_then(|tag_id| tags.get(&tag_id).cloned());
            let color = note
                .color_id()
                .and_then(|color_id| colors.get(&color_id).cloned())
                .unwrap_or_default();
            Some(NoteOverviewItem {
                id,
                title: note.title().to_string(),
                content: note.content().to_string(),
                tag,
                color,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::{ColorId, NoteBuilder};
    use crate::testing::CountingRepository;

    async fn wait_for_len(
        rx: &mut watch::Receiver<ViewState<Vec<NoteOverviewItem>>>,
        len: usize,
    ) -> Vec<NoteOverviewItem> {
        let state = tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|state| state.ready().is_some_and(|items| items.len() == len)),
        )
        .await
        .expect("list should update")
        .expect("sender alive");
        state.ready().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn starts_loading_until_visible() {
        let repo = Arc::new(CountingRepository::new());
        let vm = NotesOverviewViewModel::new(repo.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(vm.notes().borrow().is_loading());
        assert_eq!(repo.calls(), 0);
    }

    #[tokio::test]
    async fn visible_list_joins_tags_and_colors() {
        let repo = Arc::new(CountingRepository::new());
        let tag = repo.add_tag("work").await.unwrap();
        repo.insert_note(
            NoteBuilder::new()
                .title("A")
                .content("B")
                .tag_id(Some(tag))
                .color_id(Some(ColorId::new(3)))
                .build(),
        )
        .await
        .unwrap();
        repo.insert_note(Note::new("plain", "")).await.unwrap();

        let vm = NotesOverviewViewModel::new(repo.clone());
        let mut rx = vm.notes();
        vm.on_visible();

        let items = wait_for_len(&mut rx, 2).await;
        assert_eq!(items[0].title, "A");
        assert_eq!(items[0].tag.as_deref(), Some("work"));
        assert_eq!(items[0].color.name(), "orange");
        assert_eq!(items[1].tag, None);
        assert_eq!(items[1].color, Color::default_color());
    }

    #[tokio::test]
    async fn list_follows_later_saves() {
        let repo = Arc::new(CountingRepository::new());
        let vm = NotesOverviewViewModel::new(repo.clone());
        let mut rx = vm.notes();
        vm.on_visible();
        wait_for_len(&mut rx, 0).await;

        repo.insert_note(Note::new("new", "")).await.unwrap();

        let items = wait_for_len(&mut rx, 1).await;
        assert_eq!(items[0].title, "new");
    }

    #[tokio::test]
    async fn resubscribing_keeps_latest_data() {
        let repo = Arc::new(CountingRepository::new());
        repo.insert_note(Note::new("one", "")).await.unwrap();
        let vm = NotesOverviewViewModel::new(repo.clone());
        let mut rx = vm.notes();

        vm.on_visible();
        wait_for_len(&mut rx, 1).await;
        vm.on_hidden();
        vm.on_visible();
        vm.on_visible();

        repo.insert_note(Note::new("two", "")).await.unwrap();
        let items = wait_for_len(&mut rx, 2).await;
        assert_eq!(items[1].title, "two");
    }

    #[tokio::test]
    async fn hidden_list_stops_updating() {
        let repo = Arc::new(CountingRepository::new());
        let vm = NotesOverviewViewModel::new(repo.clone());
        let mut rx = vm.notes();
        vm.on_visible();
        wait_for_len(&mut rx, 0).await;

        vm.on_hidden();
        repo.insert_note(Note::new("unseen", "")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(rx.borrow().ready().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn teardown_stops_updates() {
        let repo = Arc::new(CountingRepository::new());
        let vm = NotesOverviewViewModel::new(repo.clone());
        let mut rx = vm.notes();
        vm.on_visible();
        wait_for_len(&mut rx, 0).await;

        vm.teardown();
        repo.insert_note(Note::new("late", "")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(rx.borrow().ready().map(Vec::len), Some(0));
    }
}
