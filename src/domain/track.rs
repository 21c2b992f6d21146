use std::fmt;
use std::path::{Path, PathBuf};

use crate::domain::clock::SecondsSinceUnix;

/// Catalog row identifier of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(pub i64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A track of the shared music catalog.
///
/// Created by the indexing collaborator, mutated only by the submission
/// moderator. `votes` is meaningful in vote mode only and is reset to
/// zero when the threshold triggers a queue.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub path: PathBuf,
    pub last_queued_at: Option<SecondsSinceUnix>,
    pub total_times_queued: u32,
    pub votes: u32,
}

/// Snapshot of whatever the active player reports as currently playing.
///
/// Pure value type; `None` fields mean the player did not report them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NowPlaying {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    /// Normalized stem of the playing file, when the player only knows a path.
    pub filename: Option<String>,
}

impl NowPlaying {
    pub fn is_empty(&self) -> bool {
        self.artist.is_none()
            && self.title.is_none()
            && self.album.is_none()
            && self.filename.is_none()
    }
}

/// Strips directory and extension from a player-reported file path.
pub fn filename_stem(path: &str) -> Option<String> {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
}
