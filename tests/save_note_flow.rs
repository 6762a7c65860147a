use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notemaker::{
    Database, NoteScreenMode, Repository, SaveNoteViewModel, ScreenEvent, ScreenEvents,
    SqliteRepository, ValidationError, ViewState,
};
use tempfile::tempdir;

fn repository() -> Result<Arc<SqliteRepository>> {
    Ok(Arc::new(SqliteRepository::new(Database::in_memory()?)))
}

async fn next_event(events: &mut ScreenEvents) -> Option<ScreenEvent> {
    tokio::time::timeout(Duration::from_secs(5), events.next())
        .await
        .ok()
        .flatten()
}

#[tokio::test]
async fn test_create_note_closes_screen_and_stores_one_row() -> Result<()> {
    // Arrange
    let repo = repository()?;
    let vm = SaveNoteViewModel::new(repo.clone(), NoteScreenMode::Create);
    let mut events = vm.take_events().context("events")?;

    // Act
    vm.save_note("Groceries", "milk, eggs", "home")?;

    // Assert
    assert_eq!(next_event(&mut events).await, Some(ScreenEvent::Close));
    let notes = repo.fetch_notes().await?;
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title(), "Groceries");
    assert_eq!(notes[0].content(), "milk, eggs");
    assert_eq!(notes[0].tag_id(), repo.fetch_tag_id("home").await?);

    Ok(())
}

#[tokio::test]
async fn test_empty_title_is_rejected_without_mutation() -> Result<()> {
    let repo = repository()?;
    let vm = SaveNoteViewModel::new(repo.clone(), NoteScreenMode::Create);
    let mut events = vm.take_events().context("events")?;

    let result = vm.save_note("   ", "content", "work");

    assert_eq!(result, Err(ValidationError::EmptyTitle));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(events.try_next(), None);
    assert!(repo.fetch_notes().await?.is_empty());
    assert!(repo.fetch_tags().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_two_notes_with_same_tag_share_one_tag_row() -> Result<()> {
    // Arrange: "work" already exists
    let repo = repository()?;
    let work = repo.add_tag("work").await?;

    // Act: save two notes tagged "work" from separate screens
    for title in ["first", "second"] {
        let vm = SaveNoteViewModel::new(repo.clone(), NoteScreenMode::Create);
        let mut events = vm.take_events().context("events")?;
        vm.save_note(title, "", "work")?;
        assert_eq!(next_event(&mut events).await, Some(ScreenEvent::Close));
    }

    // Assert
    let tags = repo.fetch_tags().await?;
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].id(), work);
    for note in repo.fetch_notes().await? {
        assert_eq!(note.tag_id(), Some(work));
    }

    Ok(())
}

#[tokio::test]
async fn test_edit_then_delete_round_trip() -> Result<()> {
    let repo = repository()?;
    let create = SaveNoteViewModel::new(repo.clone(), NoteScreenMode::Create);
    let mut events = create.take_events().context("events")?;
    create.save_note("Draft", "v1", "ideas")?;
    assert_eq!(next_event(&mut events).await, Some(ScreenEvent::Close));
    let id = repo.fetch_notes().await?[0].id().context("saved note has id")?;

    // Edit: the screen loads the stored values, then saves in place
    let edit = SaveNoteViewModel::new(repo.clone(), NoteScreenMode::Edit(id));
    let mut events = edit.take_events().context("events")?;
    let mut view = edit.view_data();
    edit.fetch_view_data();
    let loaded = tokio::time::timeout(
        Duration::from_secs(5),
        view.wait_for(|state| !state.is_loading()),
    )
    .await??
    .clone();
    let ViewState::Ready(data) = loaded else {
        anyhow::bail!("view data not loaded");
    };
    assert_eq!(data.title, "Draft");
    assert_eq!(data.tag, "ideas");

    edit.save_note("Final", "v2", &data.tag)?;
    assert_eq!(next_event(&mut events).await, Some(ScreenEvent::Close));

    let notes = repo.fetch_notes().await?;
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id(), Some(id));
    assert_eq!(notes[0].title(), "Final");
    assert_eq!(notes[0].content(), "v2");

    // Delete
    let delete = SaveNoteViewModel::new(repo.clone(), NoteScreenMode::Edit(id));
    let mut events = delete.take_events().context("events")?;
    delete.delete_note()?;
    assert_eq!(next_event(&mut events).await, Some(ScreenEvent::Close));
    assert!(repo.fetch_note(id).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_saved_note_survives_reopen() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("notes.db");

    {
        let repo = Arc::new(SqliteRepository::new(Database::open(&path)?));
        let vm = SaveNoteViewModel::new(repo, NoteScreenMode::Create);
        let mut events = vm.take_events().context("events")?;
        vm.save_note("Persisted", "body", "disk")?;
        assert_eq!(next_event(&mut events).await, Some(ScreenEvent::Close));
    }

    let repo = SqliteRepository::new(Database::open(&path)?);
    let notes = repo.fetch_notes().await?;
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title(), "Persisted");
    assert!(repo.fetch_tag_id("disk").await?.is_some());

    Ok(())
}
