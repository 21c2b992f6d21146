//! TTL-bounded memoization of the now-playing query, shielding backends
//! whose status endpoint is expensive or rate-limited from being polled
//! on every page view.

use std::sync::Mutex;

use log::debug;

use crate::{
    domain::{
        clock::{Clock, SecondsSinceUnix},
        track::NowPlaying,
    },
    player::{PlayerBackend, PlayerError},
};

struct CacheEntry {
    stored_at: SecondsSinceUnix,
    value: Option<NowPlaying>,
}

/// Wall-clock TTL cache over `PlayerBackend::now_playing`.
///
/// The slot lock is held across the backend call, so concurrent callers
/// share a single in-flight lookup rather than stampeding the player.
pub struct NowPlayingCache {
    ttl_secs: i64,
    clock: Box<dyn Clock>,
    slot: Mutex<Option<CacheEntry>>,
}

impl NowPlayingCache {
    pub fn new(ttl_secs: u64, clock: Box<dyn Clock>) -> Self {
        Self {
            ttl_secs: ttl_secs as i64,
            clock,
            slot: Mutex::new(None),
        }
    }

    /// Returns the cached snapshot when fresh, otherwise asks the backend
    /// exactly once and stores what it said — including "nothing playing".
    /// A failed lookup is never memoized, so the next call retries live.
    pub fn get(
        &self,
        backend: &mut dyn PlayerBackend,
    ) -> Result<Option<NowPlaying>, PlayerError> {
        let mut slot = self.slot.lock().unwrap();
        let now = self.clock.now();

        if let Some(entry) = slot.as_ref() {
            // A value installed at T is stale at T+TTL regardless of
            // how often it was read in between.
            if now - entry.stored_at < self.ttl_secs {
                return Ok(entry.value.clone());
            }
        }

        debug!("now-playing cache miss, querying {}", backend.name());
        let fresh = backend.now_playing()?;
        *slot = Some(CacheEntry {
            stored_at: now,
            value: fresh.clone(),
        });

        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::testing::ManualClock;
    use std::path::Path;

    /// Backend double that counts queries and serves scripted results.
    #[derive(Debug)]
    struct CountingBackend {
        calls: usize,
        results: Vec<Result<Option<NowPlaying>, PlayerError>>,
    }

    impl CountingBackend {
        fn new(results: Vec<Result<Option<NowPlaying>, PlayerError>>) -> Self {
            Self { calls: 0, results }
        }
    }

    impl PlayerBackend for CountingBackend {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn queue(&mut self, _path: &Path) -> Result<(), PlayerError> {
            Ok(())
        }

        fn supports_now_playing(&self) -> bool {
            true
        }

        fn now_playing(&mut self) -> Result<Option<NowPlaying>, PlayerError> {
            let result = self.results.remove(0);
            self.calls += 1;
            result
        }
    }

    fn playing(title: &str) -> Option<NowPlaying> {
        Some(NowPlaying {
            title: Some(title.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn test_second_call_within_ttl_hits_cache() {
        let clock = ManualClock::new(1000);
        let cache = NowPlayingCache::new(60, Box::new(clock.clone()));
        let mut backend = CountingBackend::new(vec![Ok(playing("song"))]);

        assert_eq!(cache.get(&mut backend).unwrap(), playing("song"));
        clock.advance(59);
        assert_eq!(cache.get(&mut backend).unwrap(), playing("song"));
        assert_eq!(backend.calls, 1);
    }

    #[test]
    fn test_expiry_is_wall_clock_based() {
        let clock = ManualClock::new(1000);
        let cache = NowPlayingCache::new(60, Box::new(clock.clone()));
        let mut backend =
            CountingBackend::new(vec![Ok(playing("first")), Ok(playing("second"))]);

        assert_eq!(cache.get(&mut backend).unwrap(), playing("first"));

        // Exactly TTL seconds later the entry is stale.
        clock.advance(60);
        assert_eq!(cache.get(&mut backend).unwrap(), playing("second"));
        assert_eq!(backend.calls, 2);
    }

    #[test]
    fn test_absent_result_is_cached_too() {
        let clock = ManualClock::new(1000);
        let cache = NowPlayingCache::new(60, Box::new(clock.clone()));
        let mut backend = CountingBackend::new(vec![Ok(None)]);

        assert_eq!(cache.get(&mut backend).unwrap(), None);
        clock.advance(10);
        assert_eq!(cache.get(&mut backend).unwrap(), None);
        assert_eq!(backend.calls, 1);
    }

    #[test]
    fn test_failure_is_not_memoized() {
        let clock = ManualClock::new(1000);
        let cache = NowPlayingCache::new(60, Box::new(clock.clone()));
        let mut backend = CountingBackend::new(vec![
            Err(PlayerError::NotRunning),
            Ok(playing("recovered")),
        ]);

        assert!(cache.get(&mut backend).is_err());

        // The very next call retries against the live backend, with no
        // clock movement required.
        assert_eq!(cache.get(&mut backend).unwrap(), playing("recovered"));
        assert_eq!(backend.calls, 2);
    }
}
