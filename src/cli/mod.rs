use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::catalog::sqlite::SqliteCatalog;
use crate::catalog::{Catalog, NewTrack};
use crate::config::{Config, Mode};
use crate::domain::clock::{SystemClock, i64_seconds_to_local_time};
use crate::domain::track::TrackId;
use crate::moderation::{Outcome, Rejection, RequesterContext, SubmissionModerator};
use crate::nowplaying::NowPlayingCache;
use crate::player::{BACKEND_NAMES, build_backend};

#[derive(Parser)]
#[command(name = "crowdqueue")]
#[command(version = "0.1")]
#[command(about = "Crowd-moderated track queueing for a shared music player")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the supported player backends
    Players,
    /// Add a track to the catalog
    AddTrack {
        title: String,
        path: PathBuf,
        #[arg(long)]
        artist: Option<String>,
        #[arg(long)]
        album: Option<String>,
    },
    /// List tracks in the catalog
    List,
    /// Submit a track request, as a crowd member would
    Submit {
        track_id: i64,
        /// Unix timestamp of this requester's previous submission
        #[arg(long)]
        last_submitted_at: Option<i64>,
    },
    /// Show what the configured player is currently playing
    NowPlaying,
}

/// Entrypoint for CLI
pub fn run() {
    env_logger::init();

    let cli = Cli::parse();

    if let Commands::Players = cli.command {
        for name in BACKEND_NAMES {
            println!("{name}");
        }
        return;
    }

    let cfg = Config::load(&cli.config).unwrap();

    match &cli.command {
        Commands::Players => unreachable!(),

        Commands::AddTrack {
            title,
            path,
            artist,
            album,
        } => {
            let mut catalog = SqliteCatalog::open(&cfg.catalog).unwrap();
            let id = catalog
                .insert(NewTrack {
                    title: title.clone(),
                    artist: artist.clone(),
                    album: album.clone(),
                    path: path.clone(),
                })
                .unwrap();
            println!("Added track {id}: {title}");
        }

        Commands::List => {
            let mut catalog = SqliteCatalog::open(&cfg.catalog).unwrap();
            for track in catalog.list().unwrap() {
                print!("{}  {}", track.id, track.title);
                if let Some(artist) = &track.artist {
                    print!(" - {artist}");
                }
                if let Some(album) = &track.album {
                    print!(" [{album}]");
                }
                println!();
                println!("    file: {}", track.path.to_string_lossy());
                match track.last_queued_at {
                    Some(at) => println!(
                        "    queued {} times, last at {}",
                        track.total_times_queued,
                        i64_seconds_to_local_time(at).unwrap()
                    ),
                    None => println!("    never queued"),
                }
                if track.votes > 0 {
                    println!("    pending votes: {}", track.votes);
                }
            }
        }

        Commands::Submit {
            track_id,
            last_submitted_at,
        } => {
            let mut catalog = SqliteCatalog::open(&cfg.catalog).unwrap();
            let mut backend = build_backend(&cfg.player).unwrap();
            let clock = SystemClock;
            let mut requester = RequesterContext {
                last_submitted_at: *last_submitted_at,
            };

            let mut moderator = SubmissionModerator::new(
                &cfg.moderation,
                &mut catalog,
                backend.as_mut(),
                &clock,
            );
            let outcome = moderator.submit(TrackId(*track_id), &mut requester).unwrap();

            match outcome {
                Outcome::Queued => println!("Track queued"),
                Outcome::VoteRecorded { remaining } => {
                    println!("Vote recorded, {remaining} more needed")
                }
                Outcome::QueueFailed(e) => println!("Player refused the track: {e}"),
                Outcome::Rejected(rejection) => match rejection {
                    Rejection::TrackNotFound => println!("No such track"),
                    Rejection::TrackFileMissing => {
                        println!("Track file is gone, removed it from the catalog")
                    }
                    Rejection::TrackOnCooldown {
                        last_queued_at,
                        cooldown_secs,
                    } => println!(
                        "Track was already queued at {}, it can repeat every {cooldown_secs}s",
                        i64_seconds_to_local_time(last_queued_at).unwrap()
                    ),
                    Rejection::RateLimited {
                        last_submitted_at,
                        cooldown_secs,
                        mode,
                    } => {
                        let action = match mode {
                            Mode::Vote => "voted",
                            Mode::Immediate => "queued a track",
                        };
                        println!(
                            "You {action} at {}, wait {cooldown_secs}s between submissions",
                            i64_seconds_to_local_time(last_submitted_at).unwrap()
                        );
                    }
                },
            }
        }

        Commands::NowPlaying => {
            let mut backend = build_backend(&cfg.player).unwrap();
            if !backend.supports_now_playing() {
                println!(
                    "The {} backend can't report what's playing",
                    backend.name()
                );
                return;
            }

            let cache = NowPlayingCache::new(
                cfg.now_playing.cache_ttl_secs,
                Box::new(SystemClock),
            );
            match cache.get(backend.as_mut()).unwrap() {
                Some(snapshot) if !snapshot.is_empty() => {
                    let title = snapshot
                        .title
                        .or(snapshot.filename)
                        .unwrap_or_else(|| "?".to_string());
                    match snapshot.artist {
                        Some(artist) => println!("{artist} - {title}"),
                        None => println!("{title}"),
                    }
                }
                _ => println!("Nothing is playing"),
            }
        }
    }
}
