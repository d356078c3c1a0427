//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use strata_terrain::{ErosionMethod, ExecutionPath, IslandMask};

use crate::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    Grid,
    Particle,
}

impl From<MethodArg> for ErosionMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Grid => ErosionMethod::Grid,
            MethodArg::Particle => ErosionMethod::Particle,
        }
    }
}

/// Strata command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "strata", about = "Tiled heightfield generation and erosion")]
pub struct CliArgs {
    /// Base seed for noise and erosion.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Erosion model.
    #[arg(long, value_enum)]
    pub method: Option<MethodArg>,

    /// Iterations (grid) or droplets (particle) for the selected method.
    #[arg(long)]
    pub iterations: Option<u32>,

    /// Use the lane-batched erosion and tangent paths.
    #[arg(long)]
    pub vectorized: bool,

    /// Enable the island mask with default settings if none is configured.
    #[arg(long)]
    pub island: bool,

    #[arg(long)]
    pub x_sections: Option<u32>,

    #[arg(long)]
    pub y_sections: Option<u32>,

    /// Vertices per section along x.
    #[arg(long)]
    pub x_size: Option<u32>,

    /// Vertices per section along y.
    #[arg(long)]
    pub y_size: Option<u32>,

    /// World distance between adjacent vertices.
    #[arg(long)]
    pub edge_size: Option<f32>,

    /// Number of runs; more than one generates a batch.
    #[arg(long)]
    pub batch: Option<usize>,

    /// Worker threads (0 = automatic).
    #[arg(long)]
    pub threads: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        let generation = &mut self.generation;
        if let Some(seed) = args.seed {
            generation.seed = seed;
        }
        if let Some(method) = args.method {
            generation.method = method.into();
        }
        // Applies to whichever method is in effect after the override above.
        if let Some(iterations) = args.iterations {
            match generation.method {
                ErosionMethod::Grid => generation.grid.iterations = iterations,
                ErosionMethod::Particle => generation.particle.iterations = iterations,
            }
        }
        if args.vectorized {
            generation.execution = ExecutionPath::Vectorized;
        }
        if args.island && generation.island.is_none() {
            generation.island = Some(IslandMask::default());
        }

        let geometry = &mut self.geometry;
        if let Some(n) = args.x_sections {
            geometry.x_sections = n;
        }
        if let Some(n) = args.y_sections {
            geometry.y_sections = n;
        }
        if let Some(n) = args.x_size {
            geometry.x_size = n;
        }
        if let Some(n) = args.y_size {
            geometry.y_size = n;
        }
        if let Some(edge) = args.edge_size {
            geometry.edge_size = edge;
        }

        if let Some(runs) = args.batch {
            self.pipeline.batch_runs = runs;
        }
        if let Some(threads) = args.threads {
            self.pipeline.worker_threads = threads;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
