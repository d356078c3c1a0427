//! Hydraulic erosion over a [`HeightGrid`].
//!
//! Two interchangeable models are provided, each with a scalar and a
//! lane-batched implementation:
//! - [`grid`]: cellular-automaton shallow-water flow with sediment transport.
//! - [`particle`]: stochastic droplets descending the bilinear surface.

pub mod grid;
pub mod particle;

use std::time::Instant;

use tracing::info;

use crate::{
    ErosionMethod, ExecutionPath, GenerationOptions, GridErosionConstants, HeightGrid,
    ParticleErosionConstants,
};

pub use grid::{GridErosionReport, GridErosionState, erode_grid};
pub use particle::{
    DROPLET_LANES, Droplet, DropletWave, ParticleErosionReport, erode_particles,
};

/// Summary of one erosion pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErosionReport {
    Grid(GridErosionReport),
    Particle(ParticleErosionReport),
}

/// Runs the configured erosion model over a grid.
///
/// The engine only borrows the grid for the duration of [`run`](Self::run)
/// and leaves every cell fully written when it returns.
#[derive(Debug, Clone)]
pub struct ErosionEngine {
    method: ErosionMethod,
    execution: ExecutionPath,
    grid: GridErosionConstants,
    particle: ParticleErosionConstants,
    seed: u64,
}

impl ErosionEngine {
    pub fn from_options(options: &GenerationOptions) -> Self {
        Self {
            method: options.method,
            execution: options.execution,
            grid: options.grid,
            particle: options.particle,
            seed: options.seed,
        }
    }

    pub fn method(&self) -> ErosionMethod {
        self.method
    }

    pub fn execution(&self) -> ExecutionPath {
        self.execution
    }

    pub fn run(&self, grid: &mut HeightGrid) -> ErosionReport {
        let start = Instant::now();
        let report = match self.method {
            ErosionMethod::Grid => {
                ErosionReport::Grid(erode_grid(grid, &self.grid, self.execution))
            }
            ErosionMethod::Particle => ErosionReport::Particle(erode_particles(
                grid,
                &self.particle,
                self.seed,
                self.execution,
            )),
        };
        info!(
            method = ?self.method,
            execution = ?self.execution,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "erosion pass finished"
        );
        report
    }
}
