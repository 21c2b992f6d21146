//! Playback backend abstraction: one capability contract over five
//! structurally different player integrations (CLI spawn, framed binary
//! socket, line-oriented text socket, HTTP status polling, local IPC).

pub mod framed;
pub mod http;
#[cfg(unix)]
pub mod ipc;
pub mod line;
pub mod protocol;
pub mod spawn;

use std::path::Path;

use thiserror::Error;

use crate::{config::PlayerConfig, domain::track::NowPlaying};

#[derive(Debug, Error)]
pub enum PlayerError {
    /// The target player application is not running or unreachable.
    #[error("player is not running")]
    NotRunning,

    /// Transport-level I/O failure, including timeouts.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The peer answered, but not in a shape this crate understands.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A spawned player process exited with a non-zero status.
    #[error("player process exited with {status}")]
    Process { status: std::process::ExitStatus },
}

/// Startup-time configuration failure; never produced per call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} isn't a valid player backend name")]
    UnknownBackend(String),
}

/// Contract every playback integration implements.
///
/// `queue` either succeeds or returns one of the [`PlayerError`] kinds.
/// `now_playing` returning `Ok(None)` means "reachable but nothing is
/// playing", which is distinct from a failure; callers should gate on
/// `supports_now_playing` before asking.
pub trait PlayerBackend: std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn queue(&mut self, path: &Path) -> Result<(), PlayerError>;

    fn supports_now_playing(&self) -> bool {
        false
    }

    fn now_playing(&mut self) -> Result<Option<NowPlaying>, PlayerError> {
        Ok(None)
    }
}

/// Every backend name `build_backend` accepts.
#[cfg(unix)]
pub const BACKEND_NAMES: &[&str] = &[
    "audacious",
    "clementine",
    "cmus",
    "mpd",
    "mpv",
    "rhythmbox",
    "vlc",
];
#[cfg(not(unix))]
pub const BACKEND_NAMES: &[&str] =
    &["audacious", "clementine", "cmus", "mpd", "rhythmbox", "vlc"];

/// Resolves the configured backend name to a constructed instance.
pub fn build_backend(config: &PlayerConfig) -> Result<Box<dyn PlayerBackend>, ConfigError> {
    let params = config.params_for(&config.backend);

    match config.backend.as_str() {
        "clementine" => Ok(Box::new(framed::FramedSocketBackend::from_params(&params))),
        "mpd" => Ok(Box::new(line::LineSocketBackend::from_params(&params))),
        "vlc" => Ok(Box::new(http::HttpPollingBackend::from_params(&params))),
        #[cfg(unix)]
        "mpv" => Ok(Box::new(ipc::LocalIpcBackend::from_params(&params))),
        "audacious" => Ok(Box::new(spawn::ProcessSpawnBackend::from_params(
            spawn::SpawnProfile::Audacious,
            &params,
        ))),
        "rhythmbox" => Ok(Box::new(spawn::ProcessSpawnBackend::from_params(
            spawn::SpawnProfile::Rhythmbox,
            &params,
        ))),
        "cmus" => Ok(Box::new(spawn::ProcessSpawnBackend::from_params(
            spawn::SpawnProfile::Cmus,
            &params,
        ))),
        other => Err(ConfigError::UnknownBackend(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlayerConfig;

    fn player_config(backend: &str) -> PlayerConfig {
        PlayerConfig {
            backend: backend.to_string(),
            params: Default::default(),
        }
    }

    #[test]
    fn test_factory_builds_every_known_backend() {
        for name in BACKEND_NAMES {
            let backend = build_backend(&player_config(name)).unwrap();
            assert_eq!(backend.name(), *name);
        }
    }

    #[test]
    fn test_factory_rejects_unknown_backend() {
        let err = build_backend(&player_config("winamp")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend(name) if name == "winamp"));
    }
}
