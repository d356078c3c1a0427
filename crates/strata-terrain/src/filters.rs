//! Thermal weathering and box smoothing over a [`HeightGrid`].

use rayon::prelude::*;
use tracing::debug;

use crate::{HeightGrid, ThermalSettings};

/// Moves material from cells whose drop to an axis-neighbor exceeds the
/// talus slope onto that neighbor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalFilter {
    /// Height difference between adjacent vertices above which material slides.
    pub talus_height: f32,
    pub rate: f32,
}

impl ThermalFilter {
    pub const ITERATIONS: u32 = 8;

    /// Convert the talus angle to a height difference over one edge.
    pub fn new(settings: &ThermalSettings, edge_size: f32) -> Self {
        Self {
            talus_height: settings.talus_angle_deg.to_radians().tan() * edge_size,
            rate: settings.rate,
        }
    }

    pub fn apply(&self, grid: &mut HeightGrid) {
        let (width, height) = (grid.width(), grid.height());
        let mut delta = vec![0.0_f32; width * height];
        let mut moved = 0.0_f64;

        for _ in 0..Self::ITERATIONS {
            delta.fill(0.0);
            let heights = grid.heights();
            for i in 0..heights.len() {
                let (x, y) = (i % width, i / width);
                let neighbors = [
                    (x > 0).then(|| i - 1),
                    (x + 1 < width).then(|| i + 1),
                    (y > 0).then(|| i - width),
                    (y + 1 < height).then(|| i + width),
                ];
                for j in neighbors.into_iter().flatten() {
                    let excess = heights[i] - heights[j] - self.talus_height;
                    if excess > 0.0 {
                        let amount = self.rate * excess;
                        delta[i] -= amount;
                        delta[j] += amount;
                        moved += amount as f64;
                    }
                }
            }
            for (h, d) in grid.heights_mut().iter_mut().zip(&delta) {
                *h += d;
            }
        }
        debug!(moved, "thermal weathering applied");
    }
}

/// `(2 * size + 1)²` box average, clipped at the outer grid boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmoothFilter {
    pub size: u32,
}

impl Default for SmoothFilter {
    fn default() -> Self {
        Self { size: 2 }
    }
}

impl SmoothFilter {
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    pub fn apply(&self, grid: &mut HeightGrid) {
        let (width, height) = (grid.width(), grid.height());
        let size = self.size as usize;
        let source = grid.heights().to_vec();

        grid.heights_mut()
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                let y0 = y.saturating_sub(size);
                let y1 = (y + size).min(height - 1);
                for (x, out) in row.iter_mut().enumerate() {
                    let x0 = x.saturating_sub(size);
                    let x1 = (x + size).min(width - 1);
                    let mut sum = 0.0;
                    for ny in y0..=y1 {
                        sum += source[ny * width + x0..=ny * width + x1].iter().sum::<f32>();
                    }
                    let count = (x1 - x0 + 1) * (y1 - y0 + 1);
                    *out = sum / count as f32;
                }
            });
        debug!(size, "smoothing applied");
    }
}
