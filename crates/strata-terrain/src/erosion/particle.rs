//! Droplet-based hydraulic erosion.
//!
//! Droplets spawn at random interior positions, accelerate down the local
//! slope, and pick up or drop sediment depending on how much their speed and
//! remaining water let them carry. All reads and writes go through the
//! grid's bilinear stencil so sub-cell motion lands on the discrete lattice.
//!
//! Droplets run in waves of [`DROPLET_LANES`]. Within a step every live
//! droplet of the wave first reads its surface normal, then the droplets
//! write their height changes in lane order. Both execution paths follow
//! this order, so they see the same grid at every read and produce the same
//! terrain.

use glam::{Vec2, Vec3};
use rand::Rng;
use strata_math::F32x8;
use tracing::trace;

use crate::{ExecutionPath, HeightGrid, ParticleErosionConstants, seed};

/// Droplets simulated side by side in one wave.
pub const DROPLET_LANES: usize = 8;

/// One simulated water particle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Droplet {
    pub position: Vec2,
    pub velocity: Vec2,
    pub water: f32,
    pub sediment: f32,
}

impl Droplet {
    pub fn spawn(position: Vec2, water: f32) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            water,
            sediment: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParticleErosionReport {
    pub droplets: u32,
    pub total_steps: u64,
    /// Longest lifetime of any droplet, in steps.
    pub max_steps: u32,
    pub eroded: f64,
    pub deposited: f64,
}

impl ParticleErosionReport {
    fn record(&mut self, delta: f32) {
        if delta > 0.0 {
            self.deposited += delta as f64;
        } else {
            self.eroded -= delta as f64;
        }
    }
}

/// Up to [`DROPLET_LANES`] droplets advanced in lockstep.
#[derive(Debug, Clone, Copy)]
pub struct DropletWave {
    pub droplets: [Droplet; DROPLET_LANES],
    pub alive: [bool; DROPLET_LANES],
    pub steps: [u32; DROPLET_LANES],
}

impl DropletWave {
    /// A wave with the given droplets in its leading lanes. Extra droplets
    /// beyond [`DROPLET_LANES`] are ignored.
    pub fn new(droplets: &[Droplet]) -> Self {
        let mut wave = Self {
            droplets: [Droplet::default(); DROPLET_LANES],
            alive: [false; DROPLET_LANES],
            steps: [0; DROPLET_LANES],
        };
        for (lane, droplet) in droplets.iter().take(DROPLET_LANES).enumerate() {
            wave.droplets[lane] = *droplet;
            wave.alive[lane] = true;
        }
        wave
    }

    pub fn is_finished(&self) -> bool {
        !self.alive.iter().any(|&alive| alive)
    }
}

/// Run `k.iterations` droplets over `grid`, one wave at a time.
///
/// Droplet spawn positions come from a ChaCha8 stream derived from `seed`,
/// so both execution paths see the same droplets in the same lanes.
pub fn erode_particles(
    grid: &mut HeightGrid,
    k: &ParticleErosionConstants,
    seed: u64,
    path: ExecutionPath,
) -> ParticleErosionReport {
    let mut report = ParticleErosionReport::default();
    if grid.width() < 3 || grid.height() < 3 {
        return report;
    }

    let mut rng = seed::erosion_rng(seed);
    let span_x = (grid.width() - 3) as f32;
    let span_y = (grid.height() - 3) as f32;

    let mut remaining = k.iterations as usize;
    while remaining > 0 {
        let count = remaining.min(DROPLET_LANES);
        let droplets: Vec<Droplet> = (0..count)
            .map(|_| {
                let position = Vec2::new(
                    1.0 + rng.random::<f32>() * span_x,
                    1.0 + rng.random::<f32>() * span_y,
                );
                Droplet::spawn(position, k.water_amount)
            })
            .collect();

        let mut wave = DropletWave::new(&droplets);
        match path {
            ExecutionPath::Scalar => simulate_wave(grid, &mut wave, k, &mut report),
            ExecutionPath::Vectorized => simulate_wave_batched(grid, &mut wave, k, &mut report),
        }

        for &steps in &wave.steps[..count] {
            report.droplets += 1;
            report.total_steps += steps as u64;
            report.max_steps = report.max_steps.max(steps);
        }
        remaining -= count;
    }

    trace!(
        droplets = report.droplets,
        steps = report.total_steps,
        "particle erosion finished"
    );
    report
}

/// Step every droplet of the wave, one lane at a time, until all of them
/// have evaporated, stalled, or left the interior.
pub fn simulate_wave(
    grid: &mut HeightGrid,
    wave: &mut DropletWave,
    k: &ParticleErosionConstants,
    report: &mut ParticleErosionReport,
) {
    while !wave.is_finished() {
        let normals = sample_normals(grid, wave, k, HeightGrid::normal_at);

        for lane in 0..DROPLET_LANES {
            if !wave.alive[lane] {
                continue;
            }
            let droplet = &mut wave.droplets[lane];
            let origin = droplet.position;
            let normal = normals[lane];

            droplet.velocity =
                (droplet.velocity + k.acceleration * normal.truncate()) * (1.0 - k.friction);
            droplet.position += droplet.velocity;

            let v = droplet.velocity;
            let speed = (v.x * v.x + v.y * v.y).sqrt();
            let max_sediment = k.capacity * speed * droplet.water;
            let delta = if droplet.sediment > max_sediment {
                k.deposition * (droplet.sediment - max_sediment)
            } else {
                -(k.softness * (max_sediment - droplet.sediment))
            };
            droplet.sediment -= delta;
            droplet.water -= k.evaporation;

            grid.modify_height_at(origin.x, origin.y, delta);
            report.record(delta);
            wave.steps[lane] += 1;
        }
    }
}

/// [`simulate_wave`] with all lanes advanced at once. Deposition and erosion
/// are both evaluated and blended by the sign of the carrying headroom.
pub fn simulate_wave_batched(
    grid: &mut HeightGrid,
    wave: &mut DropletWave,
    k: &ParticleErosionConstants,
    report: &mut ParticleErosionReport,
) {
    while !wave.is_finished() {
        let normals = sample_normals(grid, wave, k, HeightGrid::normal_at_batched);
        let nx = F32x8::from_array(normals.map(|n| n.x));
        let ny = F32x8::from_array(normals.map(|n| n.y));

        let px = gather(wave, |d| d.position.x);
        let py = gather(wave, |d| d.position.y);
        let vx = gather(wave, |d| d.velocity.x);
        let vy = gather(wave, |d| d.velocity.y);
        let water = gather(wave, |d| d.water);
        let sediment = gather(wave, |d| d.sediment);

        let damping = 1.0 - k.friction;
        let vx = (vx + nx * k.acceleration) * damping;
        let vy = (vy + ny * k.acceleration) * damping;

        let speed = (vx * vx + vy * vy).sqrt();
        let max_sediment = F32x8::splat(k.capacity) * speed * water;
        let headroom = max_sediment - sediment;
        let overloaded = headroom.is_negative();
        let deposit = F32x8::splat(k.deposition) * (sediment - max_sediment);
        let eroded = F32x8::splat(k.softness) * headroom;
        let delta = (-eroded).lerp(deposit, overloaded);

        let new_x = (px + vx).to_array();
        let new_y = (py + vy).to_array();
        let vx = vx.to_array();
        let vy = vy.to_array();
        let sediment = (sediment - delta).to_array();
        let water = (water - F32x8::splat(k.evaporation)).to_array();
        let delta = delta.to_array();

        for lane in 0..DROPLET_LANES {
            if !wave.alive[lane] {
                continue;
            }
            let droplet = &mut wave.droplets[lane];
            let origin = droplet.position;
            *droplet = Droplet {
                position: Vec2::new(new_x[lane], new_y[lane]),
                velocity: Vec2::new(vx[lane], vy[lane]),
                water: water[lane],
                sediment: sediment[lane],
            };

            grid.modify_height_at_batched(origin.x, origin.y, delta[lane]);
            report.record(delta[lane]);
            wave.steps[lane] += 1;
        }
    }
}

fn gather(wave: &DropletWave, field: impl Fn(&Droplet) -> f32) -> F32x8 {
    F32x8::from_array(std::array::from_fn(|lane| field(&wave.droplets[lane])))
}

/// Retire droplets that have run dry, hit their lifetime, left the interior,
/// or reached flat ground, and read the normal under each survivor. Retired
/// lanes get `+Z`.
fn sample_normals(
    grid: &HeightGrid,
    wave: &mut DropletWave,
    k: &ParticleErosionConstants,
    normal_at: fn(&HeightGrid, f32, f32) -> Vec3,
) -> [Vec3; DROPLET_LANES] {
    let max_steps = k.max_lifetime();
    let flat_threshold = k.min_slope_angle_deg.to_radians().cos();
    let mut normals = [Vec3::Z; DROPLET_LANES];

    for lane in 0..DROPLET_LANES {
        if !wave.alive[lane] {
            continue;
        }
        let droplet = &wave.droplets[lane];
        let Vec2 { x, y } = droplet.position;
        if droplet.water <= 0.0 || wave.steps[lane] >= max_steps || !grid.is_interior(x, y) {
            wave.alive[lane] = false;
            continue;
        }

        let normal = normal_at(grid, x, y);
        if k.stop_on_flat_slope && normal.z >= flat_threshold {
            wave.alive[lane] = false;
            continue;
        }
        normals[lane] = normal;
    }
    normals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GridGeometry;

    fn hill_grid() -> HeightGrid {
        let mut grid = HeightGrid::new(GridGeometry::new(2, 2, 16, 16, 100.0)).unwrap();
        let width = grid.width() as f32;
        let w = grid.width();
        for (i, h) in grid.heights_mut().iter_mut().enumerate() {
            let (x, y) = ((i % w) as f32, (i / w) as f32);
            let dx = x - width * 0.5;
            let dy = y - width * 0.5;
            *h = 200.0 - (dx * dx + dy * dy).sqrt() * 6.0 + (x * 0.7).sin() * 3.0;
        }
        grid
    }

    fn constants(iterations: u32) -> ParticleErosionConstants {
        ParticleErosionConstants {
            iterations,
            water_amount: 1.0,
            evaporation: 0.05,
            acceleration: 0.5,
            friction: 0.1,
            capacity: 4.0,
            deposition: 0.3,
            softness: 0.3,
            min_slope_angle_deg: 1.0,
            stop_on_flat_slope: true,
        }
    }

    #[test]
    fn test_droplet_lifetime_is_bounded() {
        let mut grid = hill_grid();
        let k = constants(200);
        let report = erode_particles(&mut grid, &k, 5, ExecutionPath::Scalar);
        let bound = (k.water_amount / k.evaporation).ceil() as u32;
        assert_eq!(report.droplets, 200);
        assert!(
            report.max_steps <= bound,
            "droplet ran {} steps, bound is {bound}",
            report.max_steps
        );
    }

    #[test]
    fn test_flat_terrain_stops_droplets_immediately() {
        let mut grid = HeightGrid::new(GridGeometry::new(1, 1, 12, 12, 100.0)).unwrap();
        let report = erode_particles(&mut grid, &constants(50), 1, ExecutionPath::Scalar);
        assert_eq!(report.total_steps, 0);
        assert!(grid.heights().iter().all(|&h| h == 0.0));
    }

    #[test]
    fn test_slope_toggle_off_keeps_droplets_moving_on_flat_ground() {
        let mut grid = HeightGrid::new(GridGeometry::new(1, 1, 12, 12, 100.0)).unwrap();
        let k = ParticleErosionConstants {
            stop_on_flat_slope: false,
            ..constants(5)
        };
        let report = erode_particles(&mut grid, &k, 1, ExecutionPath::Scalar);
        // With zero velocity there is nothing to carry, but every droplet
        // evaporates step by step instead of stopping.
        assert_eq!(report.total_steps, 5 * k.max_lifetime() as u64);
    }

    #[test]
    fn test_erosion_modifies_hill() {
        let mut grid = hill_grid();
        let before = grid.heights().to_vec();
        let report = erode_particles(&mut grid, &constants(100), 9, ExecutionPath::Scalar);
        assert!(report.eroded > 0.0);
        assert_ne!(grid.heights(), before.as_slice());
    }

    #[test]
    fn test_same_seed_replays_exactly() {
        let mut a = hill_grid();
        let mut b = hill_grid();
        erode_particles(&mut a, &constants(100), 21, ExecutionPath::Scalar);
        erode_particles(&mut b, &constants(100), 21, ExecutionPath::Scalar);
        assert_eq!(a.heights(), b.heights());
    }

    #[test]
    fn test_scalar_and_batched_agree() {
        for seed in [1, 33, 77, 123] {
            let mut scalar = hill_grid();
            let mut batched = hill_grid();
            let k = constants(500);
            let a = erode_particles(&mut scalar, &k, seed, ExecutionPath::Scalar);
            let b = erode_particles(&mut batched, &k, seed, ExecutionPath::Vectorized);

            assert_eq!(a.droplets, b.droplets);
            assert_eq!(a.total_steps, b.total_steps, "seed {seed}: trajectories diverged");
            assert!(a.eroded > 0.0 && a.deposited > 0.0, "both branches should run");
            for (i, (x, y)) in scalar.heights().iter().zip(batched.heights()).enumerate() {
                let tolerance = 1e-4 * x.abs().max(1.0);
                assert!(
                    (x - y).abs() <= tolerance,
                    "seed {seed}, cell {i}: scalar {x} vs batched {y}"
                );
            }
        }
    }

    #[test]
    fn test_partial_wave_runs_every_droplet() {
        let mut grid = hill_grid();
        let report = erode_particles(&mut grid, &constants(11), 4, ExecutionPath::Vectorized);
        assert_eq!(report.droplets, 11);
        assert!(report.total_steps > 0);
    }

    #[test]
    fn test_dead_lanes_are_left_untouched() {
        let mut grid = hill_grid();
        let before = grid.heights().to_vec();
        let mut wave = DropletWave::new(&[]);
        assert!(wave.is_finished());
        simulate_wave_batched(
            &mut grid,
            &mut wave,
            &constants(1),
            &mut ParticleErosionReport::default(),
        );
        assert_eq!(grid.heights(), before.as_slice());
        assert_eq!(wave.steps, [0; DROPLET_LANES]);
    }

    #[test]
    fn test_single_wave_matches_lane_by_lane() {
        let k = constants(0);
        let droplets: Vec<Droplet> = (0..5)
            .map(|i| Droplet::spawn(Vec2::new(6.0 + i as f32 * 3.7, 9.0 + i as f32 * 1.3), 1.0))
            .collect();

        let mut scalar_grid = hill_grid();
        let mut scalar_wave = DropletWave::new(&droplets);
        let mut scalar_report = ParticleErosionReport::default();
        simulate_wave(&mut scalar_grid, &mut scalar_wave, &k, &mut scalar_report);

        let mut batched_grid = hill_grid();
        let mut batched_wave = DropletWave::new(&droplets);
        let mut batched_report = ParticleErosionReport::default();
        simulate_wave_batched(&mut batched_grid, &mut batched_wave, &k, &mut batched_report);

        assert_eq!(scalar_wave.steps, batched_wave.steps);
        assert_eq!(scalar_wave.droplets, batched_wave.droplets);
        assert_eq!(scalar_grid.heights(), batched_grid.heights());
        assert_eq!(scalar_report, batched_report);
        // Only the leading five lanes carried droplets.
        assert!(scalar_wave.steps[..5].iter().all(|&s| s > 0));
        assert_eq!(scalar_wave.steps[5..], [0; 3]);
    }
}
