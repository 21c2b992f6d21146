use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::anyhow;
use chrono::{DateTime, Local};

pub type SecondsSinceUnix = i64;

/// Source of "now" for cooldown and cache-expiry decisions.
///
/// Injected everywhere a timestamp comparison happens so that expiry
/// is deterministic in tests.
pub trait Clock {
    fn now(&self) -> SecondsSinceUnix;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SecondsSinceUnix {
        // A wall clock before 1970 is not a supported deployment.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// converts number of seconds since unix epoch to local date time
pub fn i64_seconds_to_local_time(since_unix: i64) -> anyhow::Result<DateTime<Local>> {
    let datetime = DateTime::from_timestamp_secs(since_unix).ok_or(anyhow!(
        "failed to convert {since_unix} s timestamp to datetime"
    ))?;

    Ok(DateTime::from(datetime))
}

#[cfg(test)]
pub mod testing {
    use std::sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    };

    use super::{Clock, SecondsSinceUnix};

    /// Hand-driven clock for unit tests. Clones share the same instant.
    #[derive(Clone)]
    pub struct ManualClock {
        now: Arc<AtomicI64>,
    }

    impl ManualClock {
        pub fn new(start: SecondsSinceUnix) -> Self {
            Self {
                now: Arc::new(AtomicI64::new(start)),
            }
        }

        pub fn advance(&self, secs: i64) {
            self.now.fetch_add(secs, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> SecondsSinceUnix {
            self.now.load(Ordering::SeqCst)
        }
    }
}
