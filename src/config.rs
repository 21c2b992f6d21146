use anyhow::{Context, bail};
use serde::Deserialize;
use std::{collections::HashMap, path::Path, path::PathBuf};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub player: PlayerConfig,
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub now_playing: NowPlayingConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config =
            toml::from_str(&contents).with_context(|| "Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.moderation.mode == Mode::Vote && self.moderation.vote_threshold == 0 {
            bail!("moderation.vote_threshold must be at least 1 in vote mode");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub in_memory: bool,
    pub path: Option<PathBuf>,
}

/// Which playback backend is active, and the per-backend connection
/// parameter map. Immutable after load.
#[derive(Debug, Deserialize)]
pub struct PlayerConfig {
    pub backend: String,
    #[serde(default)]
    pub params: HashMap<String, BackendParams>,
}

impl PlayerConfig {
    /// Parameters configured for the given backend name, or all-default
    /// parameters when the name has no entry in the map.
    pub fn params_for(&self, name: &str) -> BackendParams {
        self.params.get(name).cloned().unwrap_or_default()
    }
}

/// Connection parameters for one backend. Every field is optional; each
/// backend reads the ones it understands and falls back to its defaults.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct BackendParams {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub auth_code: Option<String>,
    pub password: Option<String>,
    pub socket: Option<PathBuf>,
    pub executable: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Immediate,
    Vote,
}

#[derive(Debug, Deserialize)]
pub struct ModerationConfig {
    pub mode: Mode,
    #[serde(default = "default_vote_threshold")]
    pub vote_threshold: u32,
    #[serde(default = "default_track_cooldown")]
    pub track_cooldown_secs: u64,
    #[serde(default = "default_requester_cooldown")]
    pub requester_cooldown_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct NowPlayingConfig {
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for NowPlayingConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_vote_threshold() -> u32 {
    3
}

fn default_track_cooldown() -> u64 {
    7200
}

fn default_requester_cooldown() -> u64 {
    900
}

fn default_cache_ttl() -> u64 {
    60
}
