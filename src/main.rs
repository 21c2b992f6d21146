use crate::cli::run;

pub mod catalog;
pub mod cli;
mod config;
pub mod domain;
pub mod moderation;
pub mod nowplaying;
pub mod player;

fn main() {
    run();
}
