use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use notemaker::config::ensure_database_directory;
use notemaker::{
    Color, Config, Database, NoteId, NoteScreenMode, NotesOverviewViewModel, Repository,
    SaveNoteViewData, SaveNoteViewModel, ScreenEvent, ScreenEvents, SqliteRepository,
    ValidationError, ViewState, logging,
};
use serde::Serialize;
use tokio::sync::watch;

/// How long a command waits for background storage work to land.
const OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// notemaker - small tagged, colored notes
#[derive(Parser)]
#[command(name = "notemaker")]
#[command(about = "Keep short notes with a tag and a color")]
#[command(version)]
struct Cli {
    /// Database file (overrides NOTEMAKER_DB)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// List all notes with their tag and color
    List {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show a single note
    Show {
        #[arg(value_name = "ID")]
        id: i64,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Add a new note
    Add(AddCommand),
    /// Edit a stored note; omitted fields keep their value
    Edit(EditCommand),
    /// Delete a note
    Delete {
        #[arg(value_name = "ID")]
        id: i64,
    },
    /// List the color palette
    Colors,
    /// List all tags
    Tags,
}

/// Add a new note
#[derive(Parser)]
struct AddCommand {
    /// Title of the note
    #[arg(long)]
    title: String,

    /// Body of the note
    #[arg(long, default_value = "")]
    content: String,

    /// Tag name, created on first use
    #[arg(long, value_name = "NAME")]
    tag: Option<String>,

    /// Palette color name
    #[arg(long, value_name = "NAME")]
    color: Option<String>,
}

/// Edit a stored note
#[derive(Parser)]
struct EditCommand {
    #[arg(value_name = "ID")]
    id: i64,

    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    content: Option<String>,

    /// Tag name; an empty value removes the tag
    #[arg(long, value_name = "NAME")]
    tag: Option<String>,

    /// Palette color name
    #[arg(long, value_name = "NAME")]
    color: Option<String>,
}

/// Errors caused by the command line input rather than by the system.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Note {0} not found")]
    NoteNotFound(NoteId),

    #[error("Unknown color: {0}")]
    UnknownColor(String),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        // Determine exit code based on error type
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors are rejected intents and references to notes or colors that
/// do not exist. Database, I/O and timeout failures are internal.
fn is_user_error(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| cause.is::<ValidationError>() || cause.is::<CliError>())
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(path) = cli.db {
        config = config.with_database_path(path);
    }
    logging::init(&config);

    let repository = open_repository(&config)?;

    match cli.command {
        Commands::List { json } => execute_list(repository, json).await,
        Commands::Show { id, json } => execute_show(repository, NoteId::new(id), json).await,
        Commands::Add(cmd) => {
            let id = execute_add(repository, &cmd).await?;
            println!("Note saved (id: {id})");
            Ok(())
        }
        Commands::Edit(cmd) => {
            execute_edit(repository, &cmd).await?;
            println!("Note {} saved", cmd.id);
            Ok(())
        }
        Commands::Delete { id } => {
            execute_delete(repository, NoteId::new(id)).await?;
            println!("Note {id} deleted");
            Ok(())
        }
        Commands::Colors => execute_colors(repository).await,
        Commands::Tags => execute_tags(repository).await,
    }
}

/// Opens the configured database, creating its directory if needed.
fn open_repository(config: &Config) -> Result<Arc<dyn Repository>> {
    ensure_database_directory(&config.database_path)?;
    let db = Database::open(&config.database_path).with_context(|| {
        format!(
            "Failed to open database: {}",
            config.database_path.display()
        )
    })?;

    Ok(Arc::new(SqliteRepository::new(db)))
}

/// Waits until a watched screen state is ready.
async fn ready<T: Clone>(rx: &mut watch::Receiver<ViewState<T>>, what: &str) -> Result<T> {
    let state = tokio::time::timeout(OPERATION_TIMEOUT, rx.wait_for(|state| !state.is_loading()))
        .await
        .with_context(|| format!("Timed out loading {what}"))?
        .with_context(|| format!("Screen went away while loading {what}"))?;

    match &*state {
        ViewState::Ready(data) => Ok(data.clone()),
        ViewState::Loading => anyhow::bail!("Failed to load {what}"),
    }
}

/// Waits for the screen to close after a save or delete.
///
/// Storage failures are logged by the view-model and never close the
/// screen, so they surface here as a timeout.
async fn closed(events: &mut ScreenEvents) -> Result<()> {
    match tokio::time::timeout(OPERATION_TIMEOUT, events.next()).await {
        Ok(Some(ScreenEvent::Close)) => Ok(()),
        Ok(None) => anyhow::bail!("Screen went away before the change was stored"),
        Err(_) => anyhow::bail!("Timed out waiting for the change to be stored"),
    }
}

/// Looks up a palette entry by name, ignoring case.
fn find_color(colors: &[Color], name: &str) -> Result<Color> {
    colors
        .iter()
        .find(|color| color.name().eq_ignore_ascii_case(name.trim()))
        .cloned()
        .ok_or_else(|| CliError::UnknownColor(name.to_string()).into())
}

async fn palette(vm: &SaveNoteViewModel) -> Result<Vec<Color>> {
    let mut colors = vm.colors();
    vm.fetch_colors();
    ready(&mut colors, "colors").await
}

async fn ensure_note_exists(repository: &dyn Repository, id: NoteId) -> Result<()> {
    if repository
        .fetch_note(id)
        .await
        .context("Failed to fetch note")?
        .is_none()
    {
        return Err(CliError::NoteNotFound(id).into());
    }
    Ok(())
}

/// Creates a note through the note screen and returns its id.
async fn execute_add(repository: Arc<dyn Repository>, cmd: &AddCommand) -> Result<NoteId> {
    let vm = SaveNoteViewModel::new(repository, NoteScreenMode::Create);
    let mut events = vm
        .take_events()
        .context("Note screen events already taken")?;

    if let Some(name) = &cmd.color {
        let color = find_color(&palette(&vm).await?, name)?;
        vm.color_note(&cmd.title, &cmd.content, color)?;
    }
    vm.save_note(&cmd.title, &cmd.content, cmd.tag.as_deref().unwrap_or(""))?;
    closed(&mut events).await?;

    vm.saved_note().context("Saved note has no id")
}

/// Updates the given fields of a stored note through the note screen.
async fn execute_edit(repository: Arc<dyn Repository>, cmd: &EditCommand) -> Result<()> {
    let id = NoteId::new(cmd.id);
    ensure_note_exists(repository.as_ref(), id).await?;

    let vm = SaveNoteViewModel::new(repository, NoteScreenMode::Edit(id));
    let mut events = vm
        .take_events()
        .context("Note screen events already taken")?;
    let mut view_data = vm.view_data();
    vm.fetch_view_data();
    let current = ready(&mut view_data, "note").await?;

    let title = cmd.title.as_deref().unwrap_or(&current.title);
    let content = cmd.content.as_deref().unwrap_or(&current.content);
    let tag = cmd.tag.as_deref().unwrap_or(&current.tag);

    if let Some(name) = &cmd.color {
        let color = find_color(&palette(&vm).await?, name)?;
        vm.color_note(title, content, color)?;
    }
    vm.save_note(title, content, tag)?;
    closed(&mut events).await
}

async fn execute_delete(repository: Arc<dyn Repository>, id: NoteId) -> Result<()> {
    ensure_note_exists(repository.as_ref(), id).await?;

    let vm = SaveNoteViewModel::new(repository, NoteScreenMode::Edit(id));
    let mut events = vm
        .take_events()
        .context("Note screen events already taken")?;
    vm.delete_note()?;
    closed(&mut events).await
}

async fn execute_list(repository: Arc<dyn Repository>, json: bool) -> Result<()> {
    let vm = NotesOverviewViewModel::new(repository);
    let mut notes = vm.notes();
    vm.on_visible();
    let items = ready(&mut notes, "notes").await?;
    vm.on_hidden();

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No notes");
    }
    for item in &items {
        print!("{:>4}  {}", item.id.get(), item.title);
        if let Some(tag) = &item.tag {
            print!("  [{tag}]");
        }
        println!("  ({})", item.color.name());
    }
    Ok(())
}

#[derive(Serialize)]
struct ShownNote<'a> {
    id: NoteId,
    #[serde(flatten)]
    data: &'a SaveNoteViewData,
}

async fn execute_show(repository: Arc<dyn Repository>, id: NoteId, json: bool) -> Result<()> {
    ensure_note_exists(repository.as_ref(), id).await?;

    let vm = SaveNoteViewModel::new(repository, NoteScreenMode::Edit(id));
    let mut view_data = vm.view_data();
    vm.fetch_view_data();
    let data = ready(&mut view_data, "note").await?;

    if json {
        let shown = ShownNote { id, data: &data };
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    println!("{}", data.title);
    if !data.tag.is_empty() {
        println!("tag: {}", data.tag);
    }
    println!("color: {} {}", data.color.name(), data.color.hex());
    if !data.content.is_empty() {
        println!();
        println!("{}", data.content);
    }
    Ok(())
}

async fn execute_colors(repository: Arc<dyn Repository>) -> Result<()> {
    let vm = SaveNoteViewModel::new(repository, NoteScreenMode::Create);
    for color in palette(&vm).await? {
        println!("{:>2}  {:<8} {}", color.id().get(), color.name(), color.hex());
    }
    Ok(())
}

async fn execute_tags(repository: Arc<dyn Repository>) -> Result<()> {
    let tags = repository.fetch_tags().await.context("Failed to fetch tags")?;
    if tags.is_empty() {
        println!("No tags");
    }
    for tag in &tags {
        println!("{:>4}  {}", tag.id().get(), tag.title());
    }
    Ok(())
}
