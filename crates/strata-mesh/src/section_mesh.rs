//! Vertex, UV, and triangle arrays for one terrain section.

use glam::{Vec2, Vec3};
use strata_terrain::GridGeometry;

use crate::TangentFrame;

/// Triangle-list mesh of one section's height patch.
///
/// The patch includes the trailing column/row shared with a right/bottom
/// neighbor, so adjacent section meshes meet without a stitching pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SectionMesh {
    pub section_index: usize,
    /// Patch width in vertices.
    pub width: usize,
    /// Patch height in vertices.
    pub height: usize,
    /// World-space positions; `z` is the terrain height.
    pub vertices: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    /// Three indices per triangle, counter-clockwise.
    pub indices: Vec<u32>,
    /// Empty until a tangent frame has been applied.
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec3>,
}

impl SectionMesh {
    /// Build a section's mesh from its patch heights
    /// (see [`HeightGrid::section_heights`](strata_terrain::HeightGrid::section_heights)).
    pub fn build(geometry: &GridGeometry, section_index: usize, heights: &[f32]) -> Self {
        let (xs, ys) = geometry.section_coords(section_index);
        let (width, height) = geometry.patch_size(xs, ys);
        let mut mesh = Self {
            section_index,
            width,
            height,
            vertices: Vec::with_capacity(width * height),
            uvs: Vec::with_capacity(width * height),
            indices: triangulate_grid(width, height),
            normals: Vec::new(),
            tangents: Vec::new(),
        };
        mesh.write_vertices(geometry, heights);
        mesh
    }

    /// Rebuild positions and UVs from new heights, keeping the topology.
    /// Normals and tangents are cleared since they no longer match.
    pub fn update_heights(&mut self, geometry: &GridGeometry, heights: &[f32]) {
        self.vertices.clear();
        self.uvs.clear();
        self.normals.clear();
        self.tangents.clear();
        self.write_vertices(geometry, heights);
    }

    pub fn apply_tangent_frame(&mut self, frame: TangentFrame) {
        self.normals = frame.normals;
        self.tangents = frame.tangents;
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn write_vertices(&mut self, geometry: &GridGeometry, heights: &[f32]) {
        debug_assert_eq!(heights.len(), self.width * self.height);
        let (xs, ys) = geometry.section_coords(self.section_index);
        let (ox, oy) = geometry.section_origin(xs, ys);
        let u_extent = (geometry.width() - 1) as f32;
        let v_extent = (geometry.height() - 1) as f32;

        for y in 0..self.height {
            for x in 0..self.width {
                let (gx, gy) = (ox + x, oy + y);
                let (wx, wy) = geometry.world_position(gx, gy);
                let z = heights[y * self.width + x];
                self.vertices.push(Vec3::new(wx as f32, wy as f32, z));
                self.uvs.push(Vec2::new(gx as f32 / u_extent, gy as f32 / v_extent));
            }
        }
    }
}

/// Two counter-clockwise triangles per quad of a `width * height` lattice.
pub fn triangulate_grid(width: usize, height: usize) -> Vec<u32> {
    let quads = width.saturating_sub(1) * height.saturating_sub(1);
    let mut indices = Vec::with_capacity(quads * 6);
    for y in 0..height.saturating_sub(1) {
        for x in 0..width.saturating_sub(1) {
            let start = (y * width + x) as u32;
            let w = width as u32;
            indices.extend_from_slice(&[start, start + w, start + 1]);
            indices.extend_from_slice(&[start + w, start + w + 1, start + 1]);
        }
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> GridGeometry {
        GridGeometry::new(2, 2, 4, 3, 100.0)
    }

    #[test]
    fn test_triangulate_grid_counts_and_winding() {
        let indices = triangulate_grid(3, 2);
        assert_eq!(indices.len(), 2 * 6);
        assert_eq!(&indices[..6], &[0, 3, 1, 3, 4, 1]);
        assert!(indices.iter().all(|&i| i < 6));
    }

    #[test]
    fn test_build_includes_trailing_border() {
        let g = geometry();
        let (w, h) = g.patch_size(0, 0);
        let heights: Vec<f32> = (0..w * h).map(|i| i as f32).collect();
        let mesh = SectionMesh::build(&g, 0, &heights);

        assert_eq!((mesh.width, mesh.height), (5, 4));
        assert_eq!(mesh.vertex_count(), 20);
        assert_eq!(mesh.triangle_count(), 4 * 3 * 2);
        // The last column sits where the right neighbor's first column does.
        assert_eq!(mesh.vertices[4], Vec3::new(400.0, 0.0, 4.0));
    }

    #[test]
    fn test_last_section_has_no_border() {
        let g = geometry();
        let last = g.section_count() - 1;
        let heights = vec![0.0; 4 * 3];
        let mesh = SectionMesh::build(&g, last, &heights);
        assert_eq!((mesh.width, mesh.height), (4, 3));
        assert_eq!(mesh.vertices[0], Vec3::new(400.0, 300.0, 0.0));
        assert_eq!(*mesh.uvs.last().unwrap(), Vec2::new(1.0, 1.0));
    }

    #[test]
    fn test_update_heights_keeps_topology() {
        let g = geometry();
        let (w, h) = g.patch_size(1, 0);
        let mut mesh = SectionMesh::build(&g, 1, &vec![0.0; w * h]);
        mesh.apply_tangent_frame(TangentFrame {
            normals: vec![Vec3::Z; w * h],
            tangents: vec![Vec3::X; w * h],
        });
        let indices = mesh.indices.clone();
        let uvs = mesh.uvs.clone();

        mesh.update_heights(&g, &vec![7.0; w * h]);
        assert_eq!(mesh.indices, indices);
        assert_eq!(mesh.uvs, uvs);
        assert!(mesh.vertices.iter().all(|v| v.z == 7.0));
        assert!(mesh.normals.is_empty() && mesh.tangents.is_empty());
    }
}
