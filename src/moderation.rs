//! The submission gate: per-track cooldown, per-requester rate limit and
//! the optional vote threshold, evaluated in a fixed order before a track
//! is dispatched to the playback backend.

use log::{info, warn};

use crate::{
    catalog::{Catalog, error::CatalogError},
    config::{Mode, ModerationConfig},
    domain::{
        clock::{Clock, SecondsSinceUnix},
        track::TrackId,
    },
    player::{PlayerBackend, PlayerError},
};

/// Requester-side state, owned by the calling layer (e.g. kept in a web
/// session). The moderator only reads and stamps the timestamp.
#[derive(Debug, Default, Clone)]
pub struct RequesterContext {
    pub last_submitted_at: Option<SecondsSinceUnix>,
}

#[derive(Debug)]
pub enum Outcome {
    /// The track was handed to the playback backend.
    Queued,
    /// Vote mode only: the vote was counted, `remaining` more needed.
    VoteRecorded { remaining: u32 },
    /// The backend refused or failed; bookkeeping already persisted.
    QueueFailed(PlayerError),
    Rejected(Rejection),
}

#[derive(Debug)]
pub enum Rejection {
    TrackNotFound,
    /// The backing file vanished; the record was purged from the catalog.
    TrackFileMissing,
    TrackOnCooldown {
        last_queued_at: SecondsSinceUnix,
        cooldown_secs: u64,
    },
    /// The gate is identical in both modes; the mode is carried so the
    /// calling layer can word its message ("vote" vs "queue").
    RateLimited {
        last_submitted_at: SecondsSinceUnix,
        cooldown_secs: u64,
        mode: Mode,
    },
}

/// Single-pass, side-effecting submission state machine.
///
/// Two concurrent submissions for the same track are not serialized
/// here; counter atomicity is the store's concern.
pub struct SubmissionModerator<'a> {
    config: &'a ModerationConfig,
    catalog: &'a mut dyn Catalog,
    backend: &'a mut dyn PlayerBackend,
    clock: &'a dyn Clock,
}

impl<'a> SubmissionModerator<'a> {
    pub fn new(
        config: &'a ModerationConfig,
        catalog: &'a mut dyn Catalog,
        backend: &'a mut dyn PlayerBackend,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            config,
            catalog,
            backend,
            clock,
        }
    }

    /// Runs the gates in order; each rejection short-circuits the rest.
    /// Store failures surface as `Err`, gate decisions as `Ok(Outcome)`.
    pub fn submit(
        &mut self,
        id: TrackId,
        requester: &mut RequesterContext,
    ) -> Result<Outcome, CatalogError> {
        let now = self.clock.now();

        let Some(mut track) = self.catalog.find(id)? else {
            return Ok(Outcome::Rejected(Rejection::TrackNotFound));
        };

        if !track.path.is_file() {
            warn!("purging track {id}: file {} is gone", track.path.display());
            self.catalog.remove(id)?;
            return Ok(Outcome::Rejected(Rejection::TrackFileMissing));
        }

        let track_cooldown = self.config.track_cooldown_secs;
        if let Some(last) = track.last_queued_at {
            if now - last < track_cooldown as i64 {
                return Ok(Outcome::Rejected(Rejection::TrackOnCooldown {
                    last_queued_at: last,
                    cooldown_secs: track_cooldown,
                }));
            }
        }

        let requester_cooldown = self.config.requester_cooldown_secs;
        if let Some(last) = requester.last_submitted_at {
            if now - last < requester_cooldown as i64 {
                return Ok(Outcome::Rejected(Rejection::RateLimited {
                    last_submitted_at: last,
                    cooldown_secs: requester_cooldown,
                    mode: self.config.mode,
                }));
            }
        }

        if self.config.mode == Mode::Vote {
            track.votes += 1;

            if track.votes != self.config.vote_threshold {
                let remaining = self.config.vote_threshold.saturating_sub(track.votes);
                requester.last_submitted_at = Some(now);
                self.catalog.save(&track)?;
                info!("vote recorded for track {id}, {remaining} remaining");
                return Ok(Outcome::VoteRecorded { remaining });
            }

            track.votes = 0;
        }

        track.total_times_queued += 1;
        track.last_queued_at = Some(now);
        // Persisted before the dispatch: the cooldown and counters stand
        // even when the device call fails, and a failed dispatch is
        // terminal for this submission (retry is a fresh user action).
        self.catalog.save(&track)?;

        match self.backend.queue(&track.path) {
            Ok(()) => {
                requester.last_submitted_at = Some(now);
                info!("queued track {id} on {}", self.backend.name());
                Ok(Outcome::Queued)
            }
            Err(e) => {
                warn!("queue dispatch failed for track {id}: {e}");
                Ok(Outcome::QueueFailed(e))
            }
        }
    }
}
