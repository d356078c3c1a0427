//! Cellular-automaton hydraulic erosion.
//!
//! Every cell holds water and suspended sediment. Each iteration, water flows
//! from a cell toward each lower axis-neighbor, carrying sediment up to a
//! flow-proportional capacity and eroding or depositing the difference. All
//! changes are accumulated into double buffers and applied after the sweep.

use glam::Vec4;
use strata_math::{is_negative4, lerp4};
use tracing::trace;

use crate::{ExecutionPath, GridErosionConstants, HeightGrid};

/// Per-cell, per-iteration bound on the applied height change.
pub const MAX_HEIGHT_DELTA: f32 = 10.0;

/// Outcome of a grid erosion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GridErosionReport {
    pub iterations: u32,
    /// Water left on the grid after the final iteration.
    pub remaining_water: f64,
    /// Sediment still in suspension after the final iteration.
    pub suspended_sediment: f64,
}

/// Transient state of one grid erosion run.
pub struct GridErosionState {
    width: usize,
    height: usize,
    water: Vec<f32>,
    sediment: Vec<f32>,
    new_height: Vec<f32>,
    new_water: Vec<f32>,
    new_sediment: Vec<f32>,
}

impl GridErosionState {
    pub fn new(width: usize, height: usize, rainfall: f32) -> Self {
        let len = width * height;
        Self {
            width,
            height,
            water: vec![rainfall; len],
            sediment: vec![0.0; len],
            new_height: vec![0.0; len],
            new_water: vec![0.0; len],
            new_sediment: vec![0.0; len],
        }
    }

    pub fn water(&self) -> &[f32] {
        &self.water
    }

    pub fn sediment(&self) -> &[f32] {
        &self.sediment
    }

    fn add_rainfall(&mut self, amount: f32) {
        for w in &mut self.water {
            *w += amount;
        }
    }

    /// Left, right, up, down. `None` outside the grid; there is no wraparound.
    #[inline]
    fn neighbors(&self, i: usize) -> [Option<usize>; 4] {
        let (x, y) = (i % self.width, i / self.width);
        [
            (x > 0).then(|| i - 1),
            (x + 1 < self.width).then(|| i + 1),
            (y > 0).then(|| i - self.width),
            (y + 1 < self.height).then(|| i + self.width),
        ]
    }

    fn begin_iteration(&mut self) {
        self.new_height.fill(0.0);
        self.new_water.copy_from_slice(&self.water);
        self.new_sediment.copy_from_slice(&self.sediment);
    }

    fn end_iteration(&mut self, heights: &mut [f32]) {
        for (h, dh) in heights.iter_mut().zip(&self.new_height) {
            *h += dh.clamp(-MAX_HEIGHT_DELTA, MAX_HEIGHT_DELTA);
        }
        std::mem::swap(&mut self.water, &mut self.new_water);
        std::mem::swap(&mut self.sediment, &mut self.new_sediment);
    }

    fn sweep_scalar(&mut self, heights: &[f32], k: &GridErosionConstants) {
        for i in 0..heights.len() {
            for j in self.neighbors(i).into_iter().flatten() {
                self.transfer(heights, i, j, k);
            }
        }
    }

    /// One cell-to-neighbor exchange. Each neighbor sees the cell's full
    /// water and sediment from the start of the iteration.
    #[inline]
    fn transfer(&mut self, heights: &[f32], i: usize, j: usize, k: &GridErosionConstants) {
        let w = self.water[i];
        let s = self.sediment[i];
        let h = heights[i];
        let flow = w.min((w + h) - (self.water[j] + heights[j]));

        if flow <= 0.0 {
            // Still water: settle part of the suspended load.
            let deposit = k.deposition * s;
            self.new_height[i] += deposit;
            self.new_sediment[i] -= deposit;
            return;
        }

        self.new_water[i] -= flow;
        self.new_water[j] += flow;

        let capacity = k.capacity * flow;
        if s > capacity {
            let deposit = k.deposition * (s - capacity);
            self.new_height[i] += deposit;
            self.new_sediment[j] += capacity;
            self.new_sediment[i] -= capacity + deposit;
        } else {
            let eroded = k.softness * (capacity - s);
            self.new_height[i] -= eroded;
            self.new_sediment[j] += s + eroded;
            self.new_sediment[i] -= s;
        }
    }

    /// The four exchanges of a cell evaluated side by side in lanes, with
    /// both branches computed and blended by sign masks.
    fn sweep_batched(&mut self, heights: &[f32], k: &GridErosionConstants) {
        for i in 0..heights.len() {
            let neighbors = self.neighbors(i);
            let mut targets = [i; 4];
            let mut valid = [0.0_f32; 4];
            let mut water_j = [0.0_f32; 4];
            let mut height_j = [0.0_f32; 4];
            for (lane, neighbor) in neighbors.iter().enumerate() {
                if let Some(j) = *neighbor {
                    targets[lane] = j;
                    valid[lane] = 1.0;
                    water_j[lane] = self.water[j];
                    height_j[lane] = heights[j];
                }
            }
            let valid = Vec4::from_array(valid);

            let w = Vec4::splat(self.water[i]);
            let s = Vec4::splat(self.sediment[i]);
            let h = Vec4::splat(heights[i]);
            let surface_j = Vec4::from_array(water_j) + Vec4::from_array(height_j);
            let flow = w.min((w + h) - surface_j);

            // 1 where flow > 0. Exactly zero flow lands in the flowing branch,
            // which reduces to the same settle result.
            let flowing = is_negative4(-flow) * valid;

            // Still-water branch.
            let settle = Vec4::splat(k.deposition) * s;

            // Flowing branch.
            let capacity = Vec4::splat(k.capacity) * flow;
            let overloaded = is_negative4(capacity - s);
            let deposit = Vec4::splat(k.deposition) * (s - capacity);
            let eroded = Vec4::splat(k.softness) * (capacity - s);

            let flow_dh = lerp4(-eroded, deposit, overloaded);
            let flow_ds_j = lerp4(s + eroded, capacity, overloaded);
            let flow_ds_i = lerp4(-s, -(capacity + deposit), overloaded);

            let dh_i = (lerp4(settle, flow_dh, flowing) * valid).to_array();
            let ds_i = (lerp4(-settle, flow_ds_i, flowing) * valid).to_array();
            let dw_i = lerp4(Vec4::ZERO, -flow, flowing).to_array();
            let ds_j = lerp4(Vec4::ZERO, flow_ds_j, flowing).to_array();
            let dw_j = lerp4(Vec4::ZERO, flow, flowing).to_array();

            // Applied lane by lane in neighbor order, like the scalar sweep.
            // Invalid lanes target the cell itself with zero deltas.
            for lane in 0..4 {
                self.new_height[i] += dh_i[lane];
                self.new_sediment[i] += ds_i[lane];
                self.new_water[i] += dw_i[lane];
                self.new_water[targets[lane]] += dw_j[lane];
                self.new_sediment[targets[lane]] += ds_j[lane];
            }
        }
    }
}

/// Run the grid erosion model in place over `grid`.
pub fn erode_grid(
    grid: &mut HeightGrid,
    k: &GridErosionConstants,
    path: ExecutionPath,
) -> GridErosionReport {
    let mut state = GridErosionState::new(grid.width(), grid.height(), k.rainfall);
    let heights = grid.heights_mut();

    for iteration in 1..=k.iterations {
        state.begin_iteration();
        match path {
            ExecutionPath::Scalar => state.sweep_scalar(heights, k),
            ExecutionPath::Vectorized => state.sweep_batched(heights, k),
        }
        state.end_iteration(heights);

        if k.rainfall_interval > 0 && iteration % k.rainfall_interval == 0 {
            state.add_rainfall(k.rainfall);
            trace!(iteration, "rainfall");
        }
    }

    GridErosionReport {
        iterations: k.iterations,
        remaining_water: state.water.iter().map(|&w| w as f64).sum(),
        suspended_sediment: state.sediment.iter().map(|&s| s as f64).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GridGeometry;

    fn bumpy_grid() -> HeightGrid {
        let mut grid = HeightGrid::new(GridGeometry::new(2, 2, 8, 8, 100.0)).unwrap();
        let width = grid.width();
        for (i, h) in grid.heights_mut().iter_mut().enumerate() {
            let (x, y) = ((i % width) as f32, (i / width) as f32);
            *h = 40.0 * (x * 0.4).sin() + 25.0 * (y * 0.3).cos() + x * 3.0;
        }
        grid
    }

    fn constants(iterations: u32) -> GridErosionConstants {
        GridErosionConstants {
            iterations,
            rainfall: 4.0,
            rainfall_interval: 3,
            deposition: 0.1,
            capacity: 0.5,
            softness: 0.3,
        }
    }

    #[test]
    fn test_zero_rainfall_iteration_is_a_no_op() {
        let mut grid = bumpy_grid();
        let before = grid.heights().to_vec();
        let k = GridErosionConstants {
            iterations: 1,
            rainfall: 0.0,
            ..constants(1)
        };
        erode_grid(&mut grid, &k, ExecutionPath::Scalar);
        assert_eq!(grid.heights(), before.as_slice());

        let mut batched = bumpy_grid();
        erode_grid(&mut batched, &k, ExecutionPath::Vectorized);
        assert_eq!(batched.heights(), before.as_slice());
    }

    #[test]
    fn test_zero_iterations_leaves_heights() {
        let mut grid = bumpy_grid();
        let before = grid.heights().to_vec();
        let report = erode_grid(&mut grid, &constants(0), ExecutionPath::Scalar);
        assert_eq!(report.iterations, 0);
        assert_eq!(grid.heights(), before.as_slice());
    }

    #[test]
    fn test_erosion_changes_terrain() {
        let mut grid = bumpy_grid();
        let before = grid.heights().to_vec();
        erode_grid(&mut grid, &constants(5), ExecutionPath::Scalar);
        let changed = grid
            .heights()
            .iter()
            .zip(&before)
            .any(|(a, b)| (a - b).abs() > 1e-4);
        assert!(changed, "Rain on a slope should move material");
    }

    #[test]
    fn test_height_delta_is_clamped_per_iteration() {
        let mut grid = bumpy_grid();
        let before = grid.heights().to_vec();
        let k = GridErosionConstants {
            iterations: 1,
            rainfall: 10_000.0,
            capacity: 100.0,
            softness: 1.0,
            ..constants(1)
        };
        erode_grid(&mut grid, &k, ExecutionPath::Scalar);
        for (a, b) in grid.heights().iter().zip(&before) {
            assert!((a - b).abs() <= MAX_HEIGHT_DELTA + 1e-3);
        }
    }

    #[test]
    fn test_water_is_conserved_without_rainfall_events() {
        let mut grid = bumpy_grid();
        let cells = grid.heights().len() as f64;
        let k = GridErosionConstants {
            rainfall_interval: 1000,
            ..constants(6)
        };
        let report = erode_grid(&mut grid, &k, ExecutionPath::Scalar);
        let expected = cells * k.rainfall as f64;
        // Per-cell water can swing well past the rainfall amount, so allow
        // for f32 rounding relative to the total.
        assert!(
            (report.remaining_water - expected).abs() < 1e-3 * expected,
            "water {} vs {expected}",
            report.remaining_water
        );
    }

    #[test]
    fn test_scalar_and_batched_agree() {
        let mut scalar = bumpy_grid();
        let mut batched = bumpy_grid();
        let k = constants(12);
        let a = erode_grid(&mut scalar, &k, ExecutionPath::Scalar);
        let b = erode_grid(&mut batched, &k, ExecutionPath::Vectorized);

        for (i, (x, y)) in scalar.heights().iter().zip(batched.heights()).enumerate() {
            let tolerance = 1e-4 * x.abs().max(1.0);
            assert!(
                (x - y).abs() <= tolerance,
                "cell {i}: scalar {x} vs batched {y}"
            );
        }
        assert_eq!(a.remaining_water, b.remaining_water);
    }

    #[test]
    fn test_transfer_moves_full_flow_to_lower_neighbor() {
        let heights = [0.0, 0.0, 0.0, 0.0, 10.0, 0.0, 0.0, 0.0, 0.0];
        let k = GridErosionConstants {
            rainfall: 1.0,
            ..constants(1)
        };
        let mut state = GridErosionState::new(3, 3, k.rainfall);
        state.begin_iteration();
        state.transfer(&heights, 4, 3, &k);

        // min(1, (1 + 10) - (1 + 0)) = 1
        assert_eq!(state.new_water[4], 0.0);
        assert_eq!(state.new_water[3], 2.0);
        // Nothing in suspension yet, so the whole capacity deficit is eroded.
        let eroded = k.softness * (k.capacity * 1.0);
        assert_eq!(state.new_height[4], -eroded);
        assert_eq!(state.new_sediment[3], eroded);
        assert_eq!(state.new_sediment[4], 0.0);
    }

    #[test]
    fn test_peak_sweep_conserves_water_on_both_paths() {
        let mut heights = [0.0; 9];
        heights[4] = 10.0;
        let k = GridErosionConstants {
            rainfall: 1.0,
            ..constants(1)
        };
        for path in [ExecutionPath::Scalar, ExecutionPath::Vectorized] {
            let mut state = GridErosionState::new(3, 3, k.rainfall);
            let mut h = heights;
            state.begin_iteration();
            match path {
                ExecutionPath::Scalar => state.sweep_scalar(&h, &k),
                ExecutionPath::Vectorized => state.sweep_batched(&h, &k),
            }
            state.end_iteration(&mut h);

            let total: f32 = state.water().iter().sum();
            assert!((total - 9.0).abs() < 1e-5, "{path:?}: water {total}");
            // The peak sends one unit toward each of its four neighbors.
            assert_eq!(state.water()[4], -3.0, "{path:?}");
            assert!(h[4] < 10.0, "{path:?}: peak should erode");
        }
    }

    #[test]
    fn test_neighbors_skip_out_of_bounds() {
        let state = GridErosionState::new(3, 2, 0.0);
        assert_eq!(state.neighbors(0), [None, Some(1), None, Some(3)]);
        assert_eq!(state.neighbors(5), [Some(4), None, Some(2), None]);
    }
}
