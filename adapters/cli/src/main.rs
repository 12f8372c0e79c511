#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs Network Defence headlessly.

mod level;
mod runner;
mod settings;

use std::{path::PathBuf, process::ExitCode, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::error;
use network_defence_simulation::{Simulation, SimulationConfig};

use crate::{runner::RunOptions, settings::AudioSettings};

/// Network Defence, a node-graph tower defence simulation.
#[derive(Parser, Debug)]
#[command(name = "network-defence")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a level without a display and print the result
    Run {
        /// Level file; the built-in demo level is used when omitted
        #[arg(short, long)]
        level: Option<PathBuf>,

        /// Seed for every random stream
        #[arg(short, long, default_value = "0")]
        seed: u64,

        /// Maximum number of simulated steps
        #[arg(long, default_value = "100000")]
        max_ticks: u64,

        /// Simulated milliseconds per step
        #[arg(long, default_value = "50")]
        tick_ms: u64,

        /// Cut every preparation countdown short
        #[arg(long)]
        skip_preparation: bool,

        /// Place towers near the critical node whenever affordable
        #[arg(long)]
        auto_build: bool,
    },

    /// Show or update the persisted audio settings
    Settings {
        /// Settings file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// New music volume in [0, 1]
        #[arg(long)]
        music: Option<f32>,

        /// New sound effect volume in [0, 1]
        #[arg(long)]
        sfx: Option<f32>,
    },
}

/// Entry point for the Network Defence command-line interface.
fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match execute(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error:#}");
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            level,
            seed,
            max_ticks,
            tick_ms,
            skip_preparation,
            auto_build,
        } => {
            let loaded = match level {
                Some(path) => level::load(&path)?,
                None => level::demo()?,
            };
            let config = SimulationConfig {
                seed,
                ..loaded.config
            };
            let mut simulation =
                Simulation::new(loaded.level, config).context("level cannot be played")?;
            let summary = runner::run(
                &mut simulation,
                RunOptions {
                    max_ticks,
                    tick: Duration::from_millis(tick_ms.max(1)),
                    skip_preparation,
                    auto_build,
                },
            );
            println!("{summary}");
            for entry in simulation.battle_log().iter() {
                println!("{} {}", entry.category.prefix(), entry.text);
            }
            Ok(())
        }
        Commands::Settings { file, music, sfx } => {
            let path = file.unwrap_or_else(AudioSettings::default_path);
            let mut settings = AudioSettings::load(&path)?;
            if let Some(volume) = music {
                settings.set_music_volume(volume);
            }
            if let Some(volume) = sfx {
                settings.set_sfx_volume(volume);
            }
            if music.is_some() || sfx.is_some() {
                settings.save(&path)?;
            }
            println!("music_volume = {}", settings.music_volume);
            println!("sfx_volume = {}", settings.sfx_volume);
            Ok(())
        }
    }
}
