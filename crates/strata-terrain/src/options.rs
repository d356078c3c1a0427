//! Generation options and per-method erosion constants.
//!
//! Options are immutable for the duration of a run. Changing them afterwards
//! does not touch height samples that were already written.

use serde::{Deserialize, Serialize};

use crate::GridError;

/// One octave of coherent noise: sampled at `position * period`, scaled by `amplitude`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OctaveSettings {
    pub period: f64,
    pub amplitude: f64,
}

/// Radial (Chebyshev) falloff that biases the terrain toward an island.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IslandMask {
    pub gradient_contrast: f32,
    pub gradient_offset: f32,
    pub water_level_offset: f32,
}

impl Default for IslandMask {
    fn default() -> Self {
        Self {
            gradient_contrast: 2.0,
            gradient_offset: -0.2,
            water_level_offset: 400.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErosionMethod {
    /// Cellular-automaton shallow-water model.
    #[default]
    Grid,
    /// Stochastic droplet descent.
    Particle,
}

/// Which implementation of the erosion and tangent-space kernels to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionPath {
    #[default]
    Scalar,
    /// Branchless lane-batched kernels. Numerically equivalent to `Scalar`
    /// within float rounding.
    Vectorized,
}

/// Constants of the grid (cellular automaton) erosion model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridErosionConstants {
    pub iterations: u32,
    /// Water added to every cell at the start and on each rainfall interval.
    pub rainfall: f32,
    /// Iterations between rainfall events.
    pub rainfall_interval: u32,
    /// `Kd`
    pub deposition: f32,
    /// `Kc`
    pub capacity: f32,
    /// `Ks`
    pub softness: f32,
}

impl Default for GridErosionConstants {
    fn default() -> Self {
        Self {
            iterations: 64,
            rainfall: 8.0,
            rainfall_interval: 16,
            deposition: 0.1,
            capacity: 0.5,
            softness: 0.3,
        }
    }
}

/// Constants of the particle (droplet) erosion model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleErosionConstants {
    /// Number of droplets to simulate.
    pub iterations: u32,
    /// Initial water volume of each droplet.
    pub water_amount: f32,
    /// Water lost per step.
    pub evaporation: f32,
    /// `Ka`
    pub acceleration: f32,
    /// `Kf`
    pub friction: f32,
    /// `Kc`
    pub capacity: f32,
    /// `Kd`
    pub deposition: f32,
    /// `Ks`
    pub softness: f32,
    /// Slopes flatter than this stop a droplet when `stop_on_flat_slope` is set.
    pub min_slope_angle_deg: f32,
    pub stop_on_flat_slope: bool,
}

impl Default for ParticleErosionConstants {
    fn default() -> Self {
        Self {
            iterations: 20_000,
            water_amount: 1.0,
            evaporation: 0.02,
            acceleration: 0.5,
            friction: 0.05,
            capacity: 20.0,
            deposition: 0.3,
            softness: 0.3,
            min_slope_angle_deg: 1.0,
            stop_on_flat_slope: true,
        }
    }
}

impl ParticleErosionConstants {
    /// Upper bound on the steps a single droplet can take before evaporating.
    pub fn max_lifetime(&self) -> u32 {
        (self.water_amount / self.evaporation).ceil().max(0.0) as u32
    }
}

/// Thermal weathering settings. The iteration count is fixed by
/// [`ThermalFilter::ITERATIONS`](crate::ThermalFilter::ITERATIONS).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermalSettings {
    pub talus_angle_deg: f32,
    /// Fraction of the excess height moved per neighbor per iteration.
    pub rate: f32,
}

impl Default for ThermalSettings {
    fn default() -> Self {
        Self {
            talus_angle_deg: 15.0,
            rate: 0.2,
        }
    }
}

/// Everything that determines the terrain produced by one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub seed: u64,
    pub octaves: [OctaveSettings; 2],
    /// `None` disables island masking.
    pub island: Option<IslandMask>,
    pub method: ErosionMethod,
    pub execution: ExecutionPath,
    pub grid: GridErosionConstants,
    pub particle: ParticleErosionConstants,
    /// Thermal weathering applied after erosion, if set.
    pub thermal: Option<ThermalSettings>,
    /// Box-filter radius applied after erosion (and thermal weathering), if set.
    pub smoothing: Option<u32>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: [
                OctaveSettings {
                    period: 0.000_05,
                    amplitude: 8000.0,
                },
                OctaveSettings {
                    period: 0.000_4,
                    amplitude: 1000.0,
                },
            ],
            island: None,
            method: ErosionMethod::Grid,
            execution: ExecutionPath::Scalar,
            grid: GridErosionConstants::default(),
            particle: ParticleErosionConstants::default(),
            thermal: None,
            smoothing: None,
        }
    }
}

impl GenerationOptions {
    /// Reject constants that would make a pass ill-defined or unbounded.
    pub fn validate(&self) -> Result<(), GridError> {
        for octave in &self.octaves {
            if !octave.period.is_finite() || !octave.amplitude.is_finite() {
                return Err(GridError::InvalidConstant {
                    name: "octaves",
                    reason: "period and amplitude must be finite",
                });
            }
        }

        let grid = &self.grid;
        if grid.iterations > 0 && grid.rainfall_interval == 0 {
            return Err(GridError::InvalidConstant {
                name: "grid.rainfall_interval",
                reason: "must be at least 1",
            });
        }
        if !(0.0..=1.0).contains(&grid.deposition) {
            return Err(GridError::InvalidConstant {
                name: "grid.deposition",
                reason: "must be within [0, 1]",
            });
        }

        let particle = &self.particle;
        if !(particle.evaporation > 0.0) {
            return Err(GridError::InvalidConstant {
                name: "particle.evaporation",
                reason: "must be positive so droplets terminate",
            });
        }
        if !(0.0..=1.0).contains(&particle.friction) {
            return Err(GridError::InvalidConstant {
                name: "particle.friction",
                reason: "must be within [0, 1]",
            });
        }

        if let Some(thermal) = &self.thermal
            && !(0.0..90.0).contains(&thermal.talus_angle_deg)
        {
            return Err(GridError::InvalidConstant {
                name: "thermal.talus_angle_deg",
                reason: "must be within [0, 90)",
            });
        }
        Ok(())
    }

    /// Theoretical maximum absolute height of the raw octave sum.
    pub fn max_amplitude(&self) -> f64 {
        self.octaves.iter().map(|o| o.amplitude.abs()).sum()
    }
}
