//! Tiled heightfield synthesis and erosion: layered noise with an optional
//! island mask, a sectioned height grid, grid and particle hydraulic erosion,
//! thermal weathering, and smoothing.

mod error;
mod filters;
mod geometry;
mod height_grid;
mod noise_field;
mod options;

pub mod erosion;
pub mod seed;

pub use erosion::{ErosionEngine, ErosionReport};
pub use error::GridError;
pub use filters::{SmoothFilter, ThermalFilter};
pub use geometry::GridGeometry;
pub use height_grid::HeightGrid;
pub use noise_field::{ISLAND_EDGE_SINK, ISLAND_MASK_THRESHOLD, NoiseField};
pub use options::{
    ErosionMethod, ExecutionPath, GenerationOptions, GridErosionConstants, IslandMask,
    OctaveSettings, ParticleErosionConstants, ThermalSettings,
};
