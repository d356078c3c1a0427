//! Two-octave Perlin height sampler with an optional island mask.
//!
//! The sampler is a pure function of world position and the generation
//! options, so re-sampling a vertex from a different section always yields
//! the same bits.

use noise::{NoiseFn, Perlin};

use crate::seed;
use crate::{GenerationOptions, GridGeometry, IslandMask, OctaveSettings};

/// Sub-lattice offset added to every noise coordinate. Perlin noise is zero
/// on integer lattice points.
const NOISE_LATTICE_OFFSET: f64 = 0.1;

/// Masked samples at or below this height keep their raw value.
pub const ISLAND_MASK_THRESHOLD: f32 = -200.0;

/// Subtracted from every masked sample so unmasked edges sit below water.
pub const ISLAND_EDGE_SINK: f32 = 250.0;

/// Maps world positions to terrain heights.
#[derive(Clone)]
pub struct NoiseField {
    perlin: Perlin,
    octaves: [OctaveSettings; 2],
    island: Option<IslandMask>,
    seed_offset: f64,
    center: (f64, f64),
    half_extent: f64,
    max_amplitude: f64,
}

impl NoiseField {
    /// Build a sampler for the given options over the given grid layout.
    ///
    /// The geometry only matters for the island mask, which is centered on
    /// the grid and normalized by half of its larger side.
    pub fn new(options: &GenerationOptions, geometry: &GridGeometry) -> Self {
        let (extent_x, extent_y) = geometry.world_extent();
        Self {
            perlin: Perlin::new(seed::noise_seed(options.seed)),
            octaves: options.octaves,
            island: options.island,
            seed_offset: seed::noise_offset(options.seed),
            center: (extent_x * 0.5, extent_y * 0.5),
            half_extent: (extent_x.max(extent_y) * 0.5).max(f64::EPSILON),
            max_amplitude: options.max_amplitude(),
        }
    }

    /// Raw two-octave sum at a world position, before any masking.
    pub fn raw(&self, x: f64, y: f64) -> f64 {
        self.octaves
            .iter()
            .map(|octave| {
                let nx = x * octave.period + NOISE_LATTICE_OFFSET + self.seed_offset;
                let ny = y * octave.period + NOISE_LATTICE_OFFSET + self.seed_offset;
                self.perlin.get([nx, ny]) * octave.amplitude
            })
            .sum()
    }

    /// Terrain height at a world position.
    pub fn sample(&self, x: f64, y: f64) -> f32 {
        let raw = self.raw(x, y) as f32;
        let Some(island) = &self.island else {
            return raw;
        };

        let distance = (x - self.center.0).abs().max((y - self.center.1).abs());
        let normalized_distance = (distance / self.half_extent) as f32;
        let distance_ratio = (island.gradient_offset
            + (1.0 - normalized_distance) * island.gradient_contrast)
            .clamp(0.0, 1.0);

        let mut height = raw + island.water_level_offset;
        if height > ISLAND_MASK_THRESHOLD {
            height *= distance_ratio;
        }
        height - ISLAND_EDGE_SINK
    }

    /// Map a height to `[0, 1]` for visualization.
    ///
    /// Undoes the constant island shift, then maps `[-max_amplitude,
    /// max_amplitude]` onto the unit range.
    pub fn normalize(&self, height: f32) -> f32 {
        if self.max_amplitude <= 0.0 {
            return 0.5;
        }
        let unshifted = height as f64 - self.island_shift();
        ((unshifted / self.max_amplitude) * 0.5 + 0.5).clamp(0.0, 1.0) as f32
    }

    /// Inverse of [`normalize`](Self::normalize) for values that were not clamped.
    pub fn denormalize(&self, value: f32) -> f32 {
        let unshifted = (value as f64 - 0.5) * 2.0 * self.max_amplitude;
        (unshifted + self.island_shift()) as f32
    }

    pub fn max_amplitude(&self) -> f64 {
        self.max_amplitude
    }

    pub fn island(&self) -> Option<&IslandMask> {
        self.island.as_ref()
    }

    fn island_shift(&self) -> f64 {
        match &self.island {
            Some(island) => island.water_level_offset as f64 - ISLAND_EDGE_SINK as f64,
            None => 0.0,
        }
    }
}
