use rusqlite::Connection;

pub mod tables {
    pub const TRACKS: &str = "tracks";

    pub const ALL_TABLES: &[&str] = &[TRACKS];
}

pub mod columns {
    pub const ID: &str = "id";
    pub const TITLE: &str = "title";
    pub const ARTIST: &str = "artist";
    pub const ALBUM: &str = "album";
    pub const PATH: &str = "path";
    pub const LAST_QUEUED_AT: &str = "last_queued_at";
    pub const TOTAL_TIMES_QUEUED: &str = "total_times_queued";
    pub const VOTES: &str = "votes";
}

pub use columns::*;
pub use tables::*;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tracks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    artist TEXT,
    album TEXT,
    path TEXT NOT NULL,
    last_queued_at INTEGER,
    total_times_queued INTEGER NOT NULL DEFAULT 0,
    votes INTEGER NOT NULL DEFAULT 0
);
"#;

pub fn init(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA)
}
