//! The persisted track catalog, behind the store seam the moderator writes
//! through. Indexing and search live outside this crate; the catalog only
//! has to hand out tracks and persist the moderator's bookkeeping.

pub mod error;
pub mod schema;
pub mod sqlite;

use std::path::PathBuf;

use crate::{
    catalog::error::CatalogError,
    domain::track::{Track, TrackId},
};

/// A track as the indexing collaborator hands it over, before it has an id.
#[derive(Debug, Clone)]
pub struct NewTrack {
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub path: PathBuf,
}

/// Store interface injected into the moderator.
///
/// The moderator only relies on `find`, `save` and `remove`; `insert` and
/// `list` exist for the collaborator side (seeding and browsing).
pub trait Catalog {
    fn find(&mut self, id: TrackId) -> Result<Option<Track>, CatalogError>;

    /// Persists the mutable bookkeeping fields: last-queued timestamp,
    /// total-queued counter and vote counter.
    fn save(&mut self, track: &Track) -> Result<(), CatalogError>;

    fn remove(&mut self, id: TrackId) -> Result<(), CatalogError>;

    fn insert(&mut self, track: NewTrack) -> Result<TrackId, CatalogError>;

    fn list(&mut self) -> Result<Vec<Track>, CatalogError>;
}
