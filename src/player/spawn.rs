use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;
use sysinfo::System;

use crate::{
    config::BackendParams,
    domain::track::{NowPlaying, filename_stem},
    player::{PlayerBackend, PlayerError},
};

/// Finds a running player executable by process name. Abstracted so the
/// backend can be tested without real processes on the machine.
pub trait ProcessLocator: std::fmt::Debug {
    fn find_executable(&self, name: &str) -> Option<PathBuf>;
}

/// Scans the live process table via sysinfo.
#[derive(Debug)]
pub struct SystemProcessLocator;

impl ProcessLocator for SystemProcessLocator {
    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        let mut system = System::new_all();
        system.refresh_all();

        for process in system.processes().values() {
            if process.name().eq_ignore_ascii_case(name) {
                if let Some(exe) = process.exe() {
                    return Some(exe.to_path_buf());
                }
            }
        }

        None
    }
}

/// Players driven by spawning their CLI with an enqueue flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnProfile {
    Audacious,
    Rhythmbox,
    Cmus,
}

impl SpawnProfile {
    /// Name of the resident process whose presence proves liveness.
    fn process_name(&self) -> &'static str {
        match self {
            SpawnProfile::Audacious => "audacious",
            SpawnProfile::Rhythmbox => "rhythmbox",
            SpawnProfile::Cmus => "cmus",
        }
    }

    /// Command actually invoked; for some players this is a companion
    /// remote-control binary, not the player itself.
    fn command_name(&self) -> &'static str {
        match self {
            SpawnProfile::Audacious => "audacious",
            SpawnProfile::Rhythmbox => "rhythmbox-client",
            SpawnProfile::Cmus => "cmus-remote",
        }
    }

    fn enqueue_args(&self) -> &'static [&'static str] {
        match self {
            SpawnProfile::Audacious => &["--enqueue"],
            SpawnProfile::Rhythmbox => &["--enqueue"],
            SpawnProfile::Cmus => &["-q"],
        }
    }

    fn backend_name(&self) -> &'static str {
        match self {
            SpawnProfile::Audacious => "audacious",
            SpawnProfile::Rhythmbox => "rhythmbox",
            SpawnProfile::Cmus => "cmus",
        }
    }
}

/// Backend that launches a player CLI synchronously per queued track.
#[derive(Debug)]
pub struct ProcessSpawnBackend {
    profile: SpawnProfile,
    executable: Option<PathBuf>,
    locator: Box<dyn ProcessLocator>,
}

impl ProcessSpawnBackend {
    pub fn from_params(profile: SpawnProfile, params: &BackendParams) -> Self {
        Self::new(
            profile,
            params.executable.clone(),
            Box::new(SystemProcessLocator),
        )
    }

    pub fn new(
        profile: SpawnProfile,
        executable: Option<PathBuf>,
        locator: Box<dyn ProcessLocator>,
    ) -> Self {
        Self {
            profile,
            executable,
            locator,
        }
    }

    /// Configured path wins; otherwise the process table must contain the
    /// player before its CLI is worth invoking.
    fn resolve_command(&self) -> Result<PathBuf, PlayerError> {
        if let Some(exe) = &self.executable {
            return Ok(exe.clone());
        }

        let running = self
            .locator
            .find_executable(self.profile.process_name())
            .ok_or(PlayerError::NotRunning)?;

        if self.profile.process_name() == self.profile.command_name() {
            Ok(running)
        } else {
            Ok(PathBuf::from(self.profile.command_name()))
        }
    }
}

impl PlayerBackend for ProcessSpawnBackend {
    fn name(&self) -> &'static str {
        self.profile.backend_name()
    }

    fn queue(&mut self, path: &Path) -> Result<(), PlayerError> {
        let exe = self.resolve_command()?;
        debug!("spawning {} to enqueue {}", exe.display(), path.display());

        let status = Command::new(&exe)
            .args(self.profile.enqueue_args())
            .arg(path)
            .status()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PlayerError::NotRunning
                } else {
                    PlayerError::Connection(e)
                }
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(PlayerError::Process { status })
        }
    }

    fn supports_now_playing(&self) -> bool {
        self.profile == SpawnProfile::Cmus
    }

    /// Best effort: `cmus-remote -Q` dumps the player state; anything
    /// short of a usable playing status is reported as absent.
    fn now_playing(&mut self) -> Result<Option<NowPlaying>, PlayerError> {
        if self.profile != SpawnProfile::Cmus {
            return Ok(None);
        }

        let exe = self.resolve_command()?;
        let output = match Command::new(&exe).arg("-Q").output() {
            Ok(output) if output.status.success() => output,
            _ => return Ok(None),
        };

        Ok(parse_cmus_query(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parses `cmus-remote -Q` output (`status playing`, `file ...`,
/// `tag artist ...` lines).
fn parse_cmus_query(output: &str) -> Option<NowPlaying> {
    let mut playing = false;
    let mut snapshot = NowPlaying::default();

    for line in output.lines() {
        if let Some(state) = line.strip_prefix("status ") {
            playing = state.trim() == "playing";
        } else if let Some(file) = line.strip_prefix("file ") {
            snapshot.filename = filename_stem(file.trim());
        } else if let Some(tag) = line.strip_prefix("tag ") {
            match tag.split_once(' ') {
                Some(("artist", value)) => snapshot.artist = Some(value.trim().to_string()),
                Some(("title", value)) => snapshot.title = Some(value.trim().to_string()),
                Some(("album", value)) => snapshot.album = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    if playing { Some(snapshot) } else { None }
}
