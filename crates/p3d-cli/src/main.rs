// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! P3D developer CLI.
//!
//! Inspects, validates, optimizes and generates serialized world files.
#![allow(clippy::print_stdout)]

mod commands;
mod demo;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "p3d", author, version, about = "P3D world tooling: inspect, validate, optimize, demo")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Directory holding `world.json`; defaults are used when omitted.
    #[arg(long, global = true, value_name = "DIR")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a summary of a world file.
    Inspect {
        /// Path to a serialized world.
        file: PathBuf,
        /// Emit the summary as JSON instead of tables.
        #[arg(long)]
        json: bool,
    },
    /// Decode a world file and run the full invariant check.
    Validate {
        /// Path to a serialized world.
        file: PathBuf,
    },
    /// Re-optimize the terrain trees of a world file.
    Optimize {
        /// Input world.
        input: PathBuf,
        /// Output path.
        #[arg(short, long)]
        out: PathBuf,
        /// Improvement passes per terrain tree (overrides config).
        #[arg(long)]
        passes: Option<u32>,
    },
    /// Write a sample world.
    Demo {
        /// Output path.
        out: PathBuf,
        /// Terrain grid side length in tiles.
        #[arg(long, default_value_t = 6)]
        terrain: u32,
        /// Number of articulated towers.
        #[arg(long, default_value_t = 3)]
        towers: u32,
    },
}

fn init_tracing(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).with_writer(std::io::stderr).finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect { file, json } => commands::inspect(&file, &config, json),
        Commands::Validate { file } => commands::validate(&file, &config),
        Commands::Optimize { input, out, passes } => commands::optimize(&input, &out, config, passes),
        Commands::Demo { out, terrain, towers } => commands::demo(&out, config, terrain, towers),
    }
}
