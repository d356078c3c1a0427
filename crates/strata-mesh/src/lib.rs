//! Section mesh construction and per-vertex tangent-space generation.

pub mod section_mesh;
pub mod tangent_space;

pub use section_mesh::{SectionMesh, triangulate_grid};
pub use tangent_space::{TangentFrame, TangentSpaceBuilder};
