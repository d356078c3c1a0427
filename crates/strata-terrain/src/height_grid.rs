//! Global height sample storage with section indexing and bilinear access.

use glam::{Vec3, Vec4};
use strata_math::{F32x8, horizontal_sum4, sqrt4};
use tracing::debug;

use crate::{GridError, GridGeometry, NoiseField};

/// Up to four lattice cells surrounding a continuous position, with their
/// bilinear weights. Cells outside the grid carry a zero weight.
#[derive(Clone, Copy, Debug)]
struct Stencil {
    cells: [(usize, usize); 4],
    weights: [f32; 4],
    valid: [bool; 4],
}

/// The terrain's height samples in one flat row-major array.
///
/// Global lattice coordinate `(gx, gy)` lives at `gy * width + gx`. Section
/// `(xs, ys)` owns the `x_size * y_size` block starting at
/// `(xs * x_size, ys * y_size)`.
#[derive(Clone, Debug)]
pub struct HeightGrid {
    geometry: GridGeometry,
    width: usize,
    height: usize,
    heights: Vec<f32>,
}

impl HeightGrid {
    /// Validate the geometry, then allocate a zeroed grid.
    pub fn new(geometry: GridGeometry) -> Result<Self, GridError> {
        geometry.validate()?;
        let width = geometry.width();
        let height = geometry.height();
        debug!(width, height, "allocating height grid");
        Ok(Self {
            geometry,
            width,
            height,
            heights: vec![0.0; width * height],
        })
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    pub fn heights_mut(&mut self) -> &mut [f32] {
        &mut self.heights
    }

    /// Flat index of a section-local vertex.
    pub fn index(&self, x_section: u32, y_section: u32, x: u32, y: u32) -> usize {
        let (ox, oy) = self.geometry.section_origin(x_section, y_section);
        self.global_index(ox + x as usize, oy + y as usize)
    }

    /// Flat index of a global lattice vertex.
    #[inline]
    pub fn global_index(&self, gx: usize, gy: usize) -> usize {
        gy * self.width + gx
    }

    /// Inverse of [`global_index`](Self::global_index).
    #[inline]
    pub fn global_coords(&self, index: usize) -> (usize, usize) {
        (index % self.width, index / self.width)
    }

    #[inline]
    pub fn get(&self, gx: usize, gy: usize) -> f32 {
        self.heights[self.global_index(gx, gy)]
    }

    /// Sample the `x_size * y_size` vertices owned by a section.
    pub fn sample_section(
        noise: &NoiseField,
        geometry: &GridGeometry,
        x_section: u32,
        y_section: u32,
    ) -> Vec<f32> {
        let (w, h) = (geometry.x_size as usize, geometry.y_size as usize);
        Self::sample_block(noise, geometry, x_section, y_section, w, h)
    }

    /// Sample a section's vertices plus the trailing border owed by a
    /// right/bottom neighbor. Produces the same bits that the neighbor will
    /// write for those vertices.
    pub fn sample_section_patch(
        noise: &NoiseField,
        geometry: &GridGeometry,
        x_section: u32,
        y_section: u32,
    ) -> Vec<f32> {
        let (w, h) = geometry.patch_size(x_section, y_section);
        Self::sample_block(noise, geometry, x_section, y_section, w, h)
    }

    fn sample_block(
        noise: &NoiseField,
        geometry: &GridGeometry,
        x_section: u32,
        y_section: u32,
        w: usize,
        h: usize,
    ) -> Vec<f32> {
        let (ox, oy) = geometry.section_origin(x_section, y_section);
        let mut local = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                let (wx, wy) = geometry.world_position(ox + x, oy + y);
                local.push(noise.sample(wx, wy));
            }
        }
        local
    }

    /// Sample a section from noise, store it, and return the local heights.
    pub fn generate_section(
        &mut self,
        noise: &NoiseField,
        x_section: u32,
        y_section: u32,
    ) -> Vec<f32> {
        let local = Self::sample_section(noise, &self.geometry, x_section, y_section);
        self.write_section(x_section, y_section, &local);
        local
    }

    /// Store a section's local heights (`x_size * y_size`, row-major).
    ///
    /// A patch that carries a trailing border may also be passed; only the
    /// owned block is written.
    pub fn write_section(&mut self, x_section: u32, y_section: u32, local: &[f32]) {
        let x_size = self.geometry.x_size as usize;
        let y_size = self.geometry.y_size as usize;
        let stride = if local.len() == x_size * y_size {
            x_size
        } else {
            self.geometry.patch_size(x_section, y_section).0
        };
        let (ox, oy) = self.geometry.section_origin(x_section, y_section);
        for y in 0..y_size {
            let dst = self.global_index(ox, oy + y);
            let src = y * stride;
            self.heights[dst..dst + x_size].copy_from_slice(&local[src..src + x_size]);
        }
    }

    /// A section's current heights plus the trailing column/row/corner from
    /// its right/bottom neighbors, row-major with the patch width as stride.
    pub fn section_heights(&self, section_index: usize) -> Vec<f32> {
        let (xs, ys) = self.geometry.section_coords(section_index);
        let (w, h) = self.geometry.patch_size(xs, ys);
        let (ox, oy) = self.geometry.section_origin(xs, ys);
        let mut out = Vec::with_capacity(w * h);
        for y in 0..h {
            let start = self.global_index(ox, oy + y);
            out.extend_from_slice(&self.heights[start..start + w]);
        }
        out
    }

    // -----------------------------------------------------------------------
    // Lattice and bilinear access
    // -----------------------------------------------------------------------

    /// Central-difference normal at a lattice point, clamping at the edges.
    ///
    /// The normalization is spelled out so [`normal_at_batched`](Self::normal_at_batched)
    /// can repeat the exact same operations per lane.
    pub fn lattice_normal(&self, gx: usize, gy: usize) -> Vec3 {
        let (left, right, top, bottom) = self.lattice_neighbors(gx, gy);
        let n = Vec3::new(-2.0 * (right - left), -2.0 * (bottom - top), 4.0);
        let inv_len = 1.0 / (n.x * n.x + n.y * n.y + n.z * n.z).sqrt();
        n * inv_len
    }

    #[inline]
    fn lattice_neighbors(&self, gx: usize, gy: usize) -> (f32, f32, f32, f32) {
        let left = self.get(gx.saturating_sub(1), gy);
        let right = self.get((gx + 1).min(self.width - 1), gy);
        let top = self.get(gx, gy.saturating_sub(1));
        let bottom = self.get(gx, (gy + 1).min(self.height - 1));
        (left, right, top, bottom)
    }

    fn stencil(&self, x: f32, y: f32) -> Stencil {
        let x0 = x.floor();
        let y0 = y.floor();
        let corners = [(x0, y0), (x0 + 1.0, y0), (x0, y0 + 1.0), (x0 + 1.0, y0 + 1.0)];

        let mut stencil = Stencil {
            cells: [(0, 0); 4],
            weights: [0.0; 4],
            valid: [false; 4],
        };
        for (i, &(cx, cy)) in corners.iter().enumerate() {
            if cx < 0.0 || cy < 0.0 || cx >= self.width as f32 || cy >= self.height as f32 {
                continue;
            }
            stencil.cells[i] = (cx as usize, cy as usize);
            stencil.weights[i] = (1.0 - (x - cx).abs()) * (1.0 - (y - cy).abs());
            stencil.valid[i] = true;
        }
        stencil
    }

    /// Bilinear height at a continuous lattice position.
    pub fn height_at(&self, x: f32, y: f32) -> f32 {
        let stencil = self.stencil(x, y);
        let mut total = 0.0;
        let mut weight_sum = 0.0;
        for i in 0..4 {
            if stencil.valid[i] {
                let (gx, gy) = stencil.cells[i];
                total += self.get(gx, gy) * stencil.weights[i];
                weight_sum += stencil.weights[i];
            }
        }
        if weight_sum > 0.0 {
            total / weight_sum
        } else {
            let gx = (x.max(0.0) as usize).min(self.width - 1);
            let gy = (y.max(0.0) as usize).min(self.height - 1);
            self.get(gx, gy)
        }
    }

    /// Area-weighted blend of the surrounding lattice normals, renormalized.
    pub fn normal_at(&self, x: f32, y: f32) -> Vec3 {
        let stencil = self.stencil(x, y);
        let mut normal = Vec3::ZERO;
        for i in 0..4 {
            if stencil.valid[i] {
                let (gx, gy) = stencil.cells[i];
                normal += self.lattice_normal(gx, gy) * stencil.weights[i];
            }
        }
        normal.try_normalize().unwrap_or(Vec3::Z)
    }

    /// Distribute `delta` onto the surrounding lattice cells with the same
    /// weights [`normal_at`](Self::normal_at) reads with.
    pub fn modify_height_at(&mut self, x: f32, y: f32, delta: f32) {
        let stencil = self.stencil(x, y);
        for i in 0..4 {
            if stencil.valid[i] {
                let (gx, gy) = stencil.cells[i];
                let index = self.global_index(gx, gy);
                self.heights[index] += delta * stencil.weights[i];
            }
        }
    }

    /// Lane-batched [`normal_at`](Self::normal_at): all four corner normals
    /// are evaluated at once in structure-of-arrays form.
    ///
    /// Every lane performs the scalar operations in the scalar order, and the
    /// weighted lanes are summed in corner order, so the result is identical
    /// to [`normal_at`](Self::normal_at). Droplet paths depend on this.
    pub fn normal_at_batched(&self, x: f32, y: f32) -> Vec3 {
        let stencil = self.stencil(x, y);

        let mut left = [0.0; 4];
        let mut right = [0.0; 4];
        let mut top = [0.0; 4];
        let mut bottom = [0.0; 4];
        for i in 0..4 {
            let (gx, gy) = stencil.cells[i];
            (left[i], right[i], top[i], bottom[i]) = self.lattice_neighbors(gx, gy);
        }
        // Out-of-grid corners read a real cell but contribute with zero weight.
        let weights = Vec4::from_array(stencil.weights);

        let gradients = (F32x8::new(Vec4::from_array(right), Vec4::from_array(bottom))
            - F32x8::new(Vec4::from_array(left), Vec4::from_array(top)))
            * -2.0;
        let nx = gradients.lo;
        let ny = gradients.hi;
        let nz = Vec4::splat(4.0);
        let inv_len = Vec4::ONE / sqrt4(nx * nx + ny * ny + nz * nz);

        let normal = Vec3::new(
            horizontal_sum4(nx * inv_len * weights),
            horizontal_sum4(ny * inv_len * weights),
            horizontal_sum4(nz * inv_len * weights),
        );
        normal.try_normalize().unwrap_or(Vec3::Z)
    }

    /// Lane-batched [`modify_height_at`](Self::modify_height_at).
    pub fn modify_height_at_batched(&mut self, x: f32, y: f32, delta: f32) {
        let stencil = self.stencil(x, y);
        let deltas = (Vec4::splat(delta) * Vec4::from_array(stencil.weights)).to_array();
        for i in 0..4 {
            let (gx, gy) = stencil.cells[i];
            let index = self.global_index(gx, gy);
            // Invalid corners point at cell (0, 0) with a zero delta.
            self.heights[index] += deltas[i];
        }
    }

    /// Whether a continuous position lies inside the one-cell interior margin.
    pub fn is_interior(&self, x: f32, y: f32) -> bool {
        x >= 1.0 && y >= 1.0 && x <= (self.width - 2) as f32 && y <= (self.height - 2) as f32
    }

    // -----------------------------------------------------------------------
    // Statistics
    // -----------------------------------------------------------------------

    pub fn min_max(&self) -> (f32, f32) {
        self.heights
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &h| {
                (lo.min(h), hi.max(h))
            })
    }

    /// Sum of all samples, accumulated in f64.
    pub fn total_height(&self) -> f64 {
        self.heights.iter().map(|&h| h as f64).sum()
    }
}
