/// Complete database schema for the notes application.
///
/// Uses CREATE TABLE/INDEX IF NOT EXISTS for idempotent execution.
pub const INITIAL_SCHEMA: &str = r#"
-- Tags table: titles are unique so concurrent get-or-create converges on one row
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL UNIQUE
);

-- Colors table: fixed palette, seeded on open
CREATE TABLE IF NOT EXISTS colors (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    hex TEXT NOT NULL
);

-- Notes table: NULL tag/color means none
CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    tag_id INTEGER REFERENCES tags(id) ON DELETE SET NULL,
    color_id INTEGER REFERENCES colors(id),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notes_tag ON notes(tag_id);
"#;

/// Seeds one palette entry. Existing rows are left untouched.
pub const SEED_COLOR: &str = "INSERT OR IGNORE INTO colors (id, name, hex) VALUES (?1, ?2, ?3)";
