//! Section and vertex layout of the tiled height grid.

use serde::{Deserialize, Serialize};

use crate::GridError;

/// Layout of a terrain split into `x_sections * y_sections` tiles of
/// `x_size * y_size` vertices spaced `edge_size` world units apart.
///
/// Sections are contiguous in the global lattice: the last column of section
/// `(xs, ys)` is immediately followed by the first column of `(xs + 1, ys)`.
/// Meshes close the gap by borrowing one trailing row/column from the
/// neighbor (see [`GridGeometry::patch_size`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridGeometry {
    pub x_sections: u32,
    pub y_sections: u32,
    /// Vertices per section along x.
    pub x_size: u32,
    /// Vertices per section along y.
    pub y_size: u32,
    /// World distance between adjacent vertices.
    pub edge_size: f32,
}

impl Default for GridGeometry {
    fn default() -> Self {
        Self {
            x_sections: 4,
            y_sections: 4,
            x_size: 64,
            y_size: 64,
            edge_size: 100.0,
        }
    }
}

impl GridGeometry {
    pub fn new(x_sections: u32, y_sections: u32, x_size: u32, y_size: u32, edge_size: f32) -> Self {
        Self {
            x_sections,
            y_sections,
            x_size,
            y_size,
            edge_size,
        }
    }

    /// Check the layout before anything is allocated from it.
    pub fn validate(&self) -> Result<(), GridError> {
        if self.x_sections == 0 || self.y_sections == 0 {
            return Err(GridError::InvalidSectionCount {
                x_sections: self.x_sections,
                y_sections: self.y_sections,
            });
        }
        if self.x_size < 2 || self.y_size < 2 {
            return Err(GridError::InvalidVertexCount {
                x_size: self.x_size,
                y_size: self.y_size,
            });
        }
        if !self.edge_size.is_finite() || self.edge_size <= 0.0 {
            return Err(GridError::InvalidEdgeSize(self.edge_size));
        }
        Ok(())
    }

    /// Global lattice width in vertices.
    pub fn width(&self) -> usize {
        self.x_sections as usize * self.x_size as usize
    }

    /// Global lattice height in vertices.
    pub fn height(&self) -> usize {
        self.y_sections as usize * self.y_size as usize
    }

    pub fn cell_count(&self) -> usize {
        self.width() * self.height()
    }

    pub fn section_count(&self) -> usize {
        self.x_sections as usize * self.y_sections as usize
    }

    /// Row-major section index.
    pub fn section_index(&self, x_section: u32, y_section: u32) -> usize {
        y_section as usize * self.x_sections as usize + x_section as usize
    }

    /// Inverse of [`section_index`](Self::section_index).
    pub fn section_coords(&self, section_index: usize) -> (u32, u32) {
        let xs = section_index % self.x_sections as usize;
        let ys = section_index / self.x_sections as usize;
        (xs as u32, ys as u32)
    }

    pub fn has_right_neighbor(&self, x_section: u32) -> bool {
        x_section + 1 < self.x_sections
    }

    pub fn has_bottom_neighbor(&self, y_section: u32) -> bool {
        y_section + 1 < self.y_sections
    }

    /// Vertex dimensions of a section's mesh patch, including the trailing
    /// column/row borrowed from a right/bottom neighbor.
    pub fn patch_size(&self, x_section: u32, y_section: u32) -> (usize, usize) {
        let w = self.x_size as usize + usize::from(self.has_right_neighbor(x_section));
        let h = self.y_size as usize + usize::from(self.has_bottom_neighbor(y_section));
        (w, h)
    }

    /// Global lattice coordinate of a section's first vertex.
    pub fn section_origin(&self, x_section: u32, y_section: u32) -> (usize, usize) {
        (
            x_section as usize * self.x_size as usize,
            y_section as usize * self.y_size as usize,
        )
    }

    /// World position of a global lattice vertex.
    pub fn world_position(&self, gx: usize, gy: usize) -> (f64, f64) {
        let edge = self.edge_size as f64;
        (gx as f64 * edge, gy as f64 * edge)
    }

    /// World-space size of the whole grid, from the first to the last vertex.
    pub fn world_extent(&self) -> (f64, f64) {
        self.world_position(self.width() - 1, self.height() - 1)
    }
}
