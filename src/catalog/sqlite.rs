use std::path::PathBuf;

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::{
    catalog::{Catalog, NewTrack, error::CatalogError, schema},
    config::CatalogConfig,
    domain::track::{Track, TrackId},
};

use schema::columns::*;
use schema::tables::*;

/// SQLite-backed catalog, the stock implementation of the store seam.
pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    pub fn open(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let conn = if config.in_memory {
            Connection::open_in_memory()?
        } else {
            let path = config.path.clone().unwrap_or_else(default_db_path);
            Connection::open(path)?
        };
        schema::init(&conn)?;
        Ok(Self { conn })
    }

    fn track_from_row(row: &Row<'_>) -> Result<Track, rusqlite::Error> {
        Ok(Track {
            id: TrackId(row.get(0)?),
            title: row.get(1)?,
            artist: row.get(2)?,
            album: row.get(3)?,
            path: PathBuf::from(row.get::<_, String>(4)?),
            last_queued_at: row.get(5)?,
            total_times_queued: row.get(6)?,
            votes: row.get(7)?,
        })
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("crowdqueue.db")
}

impl Catalog for SqliteCatalog {
    fn find(&mut self, id: TrackId) -> Result<Option<Track>, CatalogError> {
        let track = self
            .conn
            .query_row(
                &format!(
                    "SELECT {ID}, {TITLE}, {ARTIST}, {ALBUM}, {PATH}, \
                     {LAST_QUEUED_AT}, {TOTAL_TIMES_QUEUED}, {VOTES} \
                     FROM {TRACKS} WHERE {ID} = ?1"
                ),
                params![id.0],
                Self::track_from_row,
            )
            .optional()?;

        Ok(track)
    }

    fn save(&mut self, track: &Track) -> Result<(), CatalogError> {
        self.conn.execute(
            &format!(
                "UPDATE {TRACKS} SET {LAST_QUEUED_AT} = ?1, \
                 {TOTAL_TIMES_QUEUED} = ?2, {VOTES} = ?3 WHERE {ID} = ?4"
            ),
            params![
                track.last_queued_at,
                track.total_times_queued,
                track.votes,
                track.id.0
            ],
        )?;

        Ok(())
    }

    fn remove(&mut self, id: TrackId) -> Result<(), CatalogError> {
        self.conn.execute(
            &format!("DELETE FROM {TRACKS} WHERE {ID} = ?1"),
            params![id.0],
        )?;

        Ok(())
    }

    fn insert(&mut self, track: NewTrack) -> Result<TrackId, CatalogError> {
        self.conn.execute(
            &format!("INSERT INTO {TRACKS} ({TITLE}, {ARTIST}, {ALBUM}, {PATH}) VALUES (?1, ?2, ?3, ?4)"),
            params![
                track.title,
                track.artist,
                track.album,
                track.path.to_string_lossy()
            ],
        )?;

        Ok(TrackId(self.conn.last_insert_rowid()))
    }

    fn list(&mut self) -> Result<Vec<Track>, CatalogError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ID}, {TITLE}, {ARTIST}, {ALBUM}, {PATH}, \
             {LAST_QUEUED_AT}, {TOTAL_TIMES_QUEUED}, {VOTES} \
             FROM {TRACKS} ORDER BY {TITLE} ASC, {ARTIST} ASC"
        ))?;

        let tracks = stmt
            .query_map([], Self::track_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tracks)
    }
}
