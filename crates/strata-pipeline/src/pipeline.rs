//! The section generation state machine.
//!
//! A run walks `Idle -> GeneratingHeights -> AwaitingTangents -> Eroding ->
//! RefreshingPostErosion -> Done`. Each stage works through a FIFO queue one
//! item at a time: the heavy part of an item runs on the [`WorkerPool`], and
//! its output is applied here, on the thread that owns the pipeline, before
//! the next item is dispatched. A batch loops `Done -> GeneratingHeights`
//! with a new seed per run.

use std::collections::VecDeque;
use std::sync::Arc;

use strata_mesh::{SectionMesh, TangentFrame, TangentSpaceBuilder};
use strata_terrain::{
    ErosionEngine, ErosionReport, GenerationOptions, GridGeometry, HeightGrid, NoiseField,
    SmoothFilter, ThermalFilter,
};
use tracing::{debug, info, trace, warn};

use crate::{
    GenerationStats, PipelineError, PipelineListener, SeedCache, StatCounter, WorkerPool,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    GeneratingHeights,
    AwaitingTangents,
    Eroding,
    RefreshingPostErosion,
    Done,
}

impl PipelineState {
    /// `true` between a start and the end of the run (or batch).
    pub fn is_running(self) -> bool {
        !matches!(self, Self::Idle | Self::Done)
    }
}

/// Output of one background job.
enum JobOutput {
    Heights {
        section_index: usize,
        patch: Vec<f32>,
        timing: StatCounter,
    },
    Tangents {
        section_index: usize,
        frame: TangentFrame,
        timing: StatCounter,
    },
    Eroded {
        grid: HeightGrid,
        report: ErosionReport,
        timing: StatCounter,
    },
}

#[derive(Debug)]
struct BatchProgress {
    seeds: Vec<u64>,
    next_run: usize,
}

/// Generates, shades, erodes, and refreshes every section of a grid,
/// reporting progress to a [`PipelineListener`].
pub struct SectionPipeline<L> {
    geometry: GridGeometry,
    listener: L,
    pool: WorkerPool<JobOutput>,
    state: PipelineState,
    options: GenerationOptions,
    tangents: TangentSpaceBuilder,
    noise: Arc<NoiseField>,
    /// `None` only while the erosion job owns the grid.
    grid: Option<HeightGrid>,
    /// Indexed by section index.
    meshes: Vec<SectionMesh>,

    pending_sections: VecDeque<(u32, u32)>,
    pending_tangents: VecDeque<usize>,
    pending_refresh: VecDeque<usize>,
    job_in_flight: bool,

    height_counter: StatCounter,
    tbn_counter: StatCounter,
    erosion_counter: StatCounter,
    stats: GenerationStats,

    batch: Option<BatchProgress>,
    seed_cache: Option<SeedCache>,
}

impl<L: PipelineListener> SectionPipeline<L> {
    /// Validate `geometry` and spawn the worker pool. `worker_threads == 0`
    /// picks a count from the number of cores.
    pub fn new(
        geometry: GridGeometry,
        worker_threads: usize,
        listener: L,
    ) -> Result<Self, PipelineError> {
        geometry.validate()?;
        let pool = if worker_threads == 0 {
            WorkerPool::with_defaults()
        } else {
            WorkerPool::new(worker_threads, worker_threads * 2)
        };
        let options = GenerationOptions::default();
        info!(
            sections = geometry.section_count(),
            width = geometry.width(),
            height = geometry.height(),
            workers = pool.worker_count(),
            "section pipeline initialized"
        );

        Ok(Self {
            geometry,
            listener,
            pool,
            state: PipelineState::Idle,
            noise: Arc::new(NoiseField::new(&options, &geometry)),
            tangents: TangentSpaceBuilder::new(options.execution),
            options,
            grid: None,
            meshes: Vec::new(),
            pending_sections: VecDeque::new(),
            pending_tangents: VecDeque::new(),
            pending_refresh: VecDeque::new(),
            job_in_flight: false,
            height_counter: StatCounter::new(),
            tbn_counter: StatCounter::new(),
            erosion_counter: StatCounter::new(),
            stats: GenerationStats::default(),
            batch: None,
            seed_cache: None,
        })
    }

    /// Begin a single run. Nothing is computed until [`poll`](Self::poll)
    /// or [`run_to_completion`](Self::run_to_completion) is called.
    pub fn start(&mut self, options: GenerationOptions) -> Result<(), PipelineError> {
        self.ensure_idle()?;
        options.validate()?;
        self.batch = None;
        self.reset_stats();
        self.begin_run(options)
    }

    /// Begin `runs` consecutive runs with seeds derived from `options.seed`.
    ///
    /// Seeds are cached per base seed: repeating a batch reuses them, and a
    /// larger batch appends fresh ones.
    pub fn start_batch(
        &mut self,
        mut options: GenerationOptions,
        runs: usize,
    ) -> Result<(), PipelineError> {
        self.ensure_idle()?;
        if runs == 0 {
            return Err(PipelineError::EmptyBatch);
        }
        options.validate()?;

        let cache = match self.seed_cache.take() {
            Some(cache) if cache.base_seed() == options.seed => cache,
            _ => SeedCache::new(options.seed),
        };
        let cache = self.seed_cache.insert(cache);
        let seeds = cache.seeds_for_batch(runs);
        info!(runs, base_seed = options.seed, "batch started");

        options.seed = seeds[0];
        self.batch = Some(BatchProgress { seeds, next_run: 1 });
        self.reset_stats();
        self.begin_run(options)
    }

    /// Apply finished background work and dispatch the next item without
    /// blocking.
    pub fn poll(&mut self) -> Result<PipelineState, PipelineError> {
        for output in self.pool.drain_results() {
            self.apply(output);
        }
        self.advance()?;
        Ok(self.state)
    }

    /// Block until the current run (or batch) is done.
    pub fn run_to_completion(&mut self) -> Result<&GenerationStats, PipelineError> {
        loop {
            self.advance()?;
            if !self.job_in_flight {
                break;
            }
            let output = self.pool.recv().inspect_err(|_| self.abandon())?;
            self.apply(output);
        }
        Ok(&self.stats)
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Options of the current (or last) run, with that run's seed.
    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    pub fn noise(&self) -> &NoiseField {
        &self.noise
    }

    /// `None` before the first run, or while erosion is running.
    pub fn grid(&self) -> Option<&HeightGrid> {
        self.grid.as_ref()
    }

    pub fn meshes(&self) -> &[SectionMesh] {
        &self.meshes
    }

    /// Numbers for the run (or batch) so far.
    pub fn stats(&self) -> &GenerationStats {
        &self.stats
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    fn ensure_idle(&self) -> Result<(), PipelineError> {
        if self.state.is_running() {
            return Err(PipelineError::RunInFlight(self.state));
        }
        Ok(())
    }

    fn reset_stats(&mut self) {
        self.height_counter.reset();
        self.tbn_counter.reset();
        self.erosion_counter.reset();
        self.stats = GenerationStats::default();
    }

    /// Reset per-run state and queue every section.
    fn begin_run(&mut self, options: GenerationOptions) -> Result<(), PipelineError> {
        self.grid = Some(HeightGrid::new(self.geometry)?);
        self.noise = Arc::new(NoiseField::new(&options, &self.geometry));
        self.tangents = TangentSpaceBuilder::new(options.execution);
        self.options = options;

        self.meshes.clear();
        self.pending_tangents.clear();
        self.pending_refresh.clear();
        self.pending_sections = (0..self.geometry.section_count())
            .map(|index| self.geometry.section_coords(index))
            .collect();

        self.state = PipelineState::GeneratingHeights;
        info!(
            seed = self.options.seed,
            method = ?self.options.method,
            execution = ?self.options.execution,
            "generation run started"
        );
        Ok(())
    }

    /// Give up on the current run after a dispatch failure.
    fn abandon(&mut self) {
        warn!(state = ?self.state, "generation run abandoned");
        self.state = PipelineState::Idle;
        self.batch = None;
        self.job_in_flight = false;
    }

    /// Dispatch work or change stage until a job is in flight or the run is
    /// over.
    fn advance(&mut self) -> Result<(), PipelineError> {
        while !self.job_in_flight {
            let dispatched = match self.state {
                PipelineState::Idle | PipelineState::Done => return Ok(()),
                PipelineState::GeneratingHeights => match self.pending_sections.pop_front() {
                    Some((xs, ys)) => self.submit_heights(xs, ys),
                    None => {
                        self.listener.on_all_sections_ready();
                        debug!(sections = self.meshes.len(), "all sections ready");
                        self.pending_tangents.extend(0..self.meshes.len());
                        self.state = PipelineState::AwaitingTangents;
                        Ok(())
                    }
                },
                PipelineState::AwaitingTangents => match self.pending_tangents.pop_front() {
                    Some(section_index) => self.submit_tangents(section_index),
                    None => {
                        self.state = PipelineState::Eroding;
                        Ok(())
                    }
                },
                PipelineState::Eroding => match self.grid.take() {
                    Some(grid) => self.submit_erosion(grid),
                    None => {
                        warn!("no height grid to erode, skipping erosion");
                        self.begin_refresh();
                        Ok(())
                    }
                },
                PipelineState::RefreshingPostErosion => match self.pending_refresh.pop_front() {
                    Some(section_index) => {
                        self.refresh_section(section_index);
                        self.submit_tangents(section_index)
                    }
                    None => self.finish_run(),
                },
            };
            dispatched.inspect_err(|_| self.abandon())?;
        }
        Ok(())
    }

    fn submit_heights(&mut self, x_section: u32, y_section: u32) -> Result<(), PipelineError> {
        let noise = Arc::clone(&self.noise);
        let geometry = self.geometry;
        let section_index = geometry.section_index(x_section, y_section);

        self.pool.submit(move || {
            let mut timing = StatCounter::new();
            timing.start(true);
            let patch = HeightGrid::sample_section_patch(&noise, &geometry, x_section, y_section);
            timing.stop();
            JobOutput::Heights {
                section_index,
                patch,
                timing,
            }
        })?;
        self.job_in_flight = true;
        Ok(())
    }

    fn submit_tangents(&mut self, section_index: usize) -> Result<(), PipelineError> {
        let mesh = &self.meshes[section_index];
        let vertices = mesh.vertices.clone();
        let indices = mesh.indices.clone();
        let uvs = mesh.uvs.clone();
        let builder = self.tangents;

        self.pool.submit(move || {
            let mut timing = StatCounter::new();
            timing.start(true);
            let frame = builder.compute(&vertices, &indices, &uvs);
            timing.stop();
            JobOutput::Tangents {
                section_index,
                frame,
                timing,
            }
        })?;
        self.job_in_flight = true;
        Ok(())
    }

    fn submit_erosion(&mut self, mut grid: HeightGrid) -> Result<(), PipelineError> {
        let engine = ErosionEngine::from_options(&self.options);
        let thermal = self
            .options
            .thermal
            .map(|settings| ThermalFilter::new(&settings, self.geometry.edge_size));
        let smoothing = self.options.smoothing.map(SmoothFilter::new);

        self.pool.submit(move || {
            let mut timing = StatCounter::new();
            timing.start(true);
            let report = engine.run(&mut grid);
            if let Some(thermal) = thermal {
                thermal.apply(&mut grid);
            }
            if let Some(smoothing) = smoothing {
                smoothing.apply(&mut grid);
            }
            timing.stop();
            JobOutput::Eroded {
                grid,
                report,
                timing,
            }
        })?;
        self.job_in_flight = true;
        Ok(())
    }

    fn apply(&mut self, output: JobOutput) {
        self.job_in_flight = false;
        match output {
            JobOutput::Heights {
                section_index,
                patch,
                timing,
            } => {
                self.height_counter.add(timing.elapsed());
                let (xs, ys) = self.geometry.section_coords(section_index);
                if let Some(grid) = self.grid.as_mut() {
                    grid.write_section(xs, ys, &patch);
                }
                debug_assert_eq!(section_index, self.meshes.len());
                let mesh = SectionMesh::build(&self.geometry, section_index, &patch);
                self.listener
                    .on_section_ready(section_index, &mesh.vertices, &mesh.indices, &mesh.uvs);
                trace!(section = section_index, "section ready");
                self.meshes.push(mesh);
            }
            JobOutput::Tangents {
                section_index,
                frame,
                timing,
            } => {
                self.tbn_counter.add(timing.elapsed());
                let mesh = &mut self.meshes[section_index];
                mesh.apply_tangent_frame(frame);
                self.listener.on_section_updated(
                    section_index,
                    &mesh.vertices,
                    &mesh.normals,
                    &mesh.uvs,
                    &mesh.tangents,
                );
                trace!(section = section_index, state = ?self.state, "section updated");
            }
            JobOutput::Eroded {
                grid,
                report,
                timing,
            } => {
                self.erosion_counter.add(timing.elapsed());
                let (min, max) = grid.min_max();
                debug!(?report, min, max, "erosion applied");
                self.grid = Some(grid);
                self.begin_refresh();
            }
        }
    }

    fn begin_refresh(&mut self) {
        self.pending_refresh.extend(0..self.meshes.len());
        self.state = PipelineState::RefreshingPostErosion;
    }

    /// Rebuild a section's vertices from the eroded grid.
    fn refresh_section(&mut self, section_index: usize) {
        if let Some(grid) = &self.grid {
            let heights = grid.section_heights(section_index);
            self.meshes[section_index].update_heights(&self.geometry, &heights);
        }
    }

    fn finish_run(&mut self) -> Result<(), PipelineError> {
        self.stats.runs += 1;
        self.stats.seeds.push(self.options.seed);
        self.stats.height_generation = self.height_counter.elapsed();
        self.stats.tbn_calculation = self.tbn_counter.elapsed();
        self.stats.erosion = self.erosion_counter.elapsed();
        info!(
            run = self.stats.runs,
            seed = self.options.seed,
            height_generation_s = self.stats.height_generation.as_secs_f64(),
            tbn_calculation_s = self.stats.tbn_calculation.as_secs_f64(),
            erosion_s = self.stats.erosion.as_secs_f64(),
            "generation run finished"
        );

        let next_seed = self.batch.as_mut().and_then(|batch| {
            let seed = batch.seeds.get(batch.next_run).copied();
            batch.next_run += 1;
            seed
        });
        if let Some(seed) = next_seed {
            let options = GenerationOptions {
                seed,
                ..self.options.clone()
            };
            return self.begin_run(options);
        }

        self.batch = None;
        self.state = PipelineState::Done;
        self.listener.on_generation_finished(&self.stats);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PipelineEvent;
    use crossbeam_channel::{Receiver, Sender};
    use std::time::{Duration, Instant};
    use strata_terrain::{ErosionMethod, ExecutionPath, GridError};

    fn small_geometry() -> GridGeometry {
        GridGeometry::new(2, 2, 8, 8, 100.0)
    }

    fn pure_noise_options(seed: u64) -> GenerationOptions {
        let mut options = GenerationOptions {
            seed,
            island: None,
            ..Default::default()
        };
        options.octaves[1].amplitude = 0.0;
        options.grid.iterations = 0;
        options
    }

    fn channel_pipeline() -> (SectionPipeline<Sender<PipelineEvent>>, Receiver<PipelineEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let pipeline = SectionPipeline::new(small_geometry(), 2, tx).unwrap();
        (pipeline, rx)
    }

    #[test]
    fn test_full_run_matches_raw_noise_and_fires_events_in_order() {
        let (mut pipeline, rx) = channel_pipeline();
        let options = pure_noise_options(11);
        pipeline.start(options.clone()).unwrap();
        let stats = pipeline.run_to_completion().unwrap().clone();
        assert_eq!(pipeline.state(), PipelineState::Done);
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.seeds, vec![11]);

        let geometry = small_geometry();
        let noise = NoiseField::new(&options, &geometry);
        let grid = pipeline.grid().expect("grid after run");
        for gy in 0..geometry.height() {
            for gx in 0..geometry.width() {
                let (wx, wy) = geometry.world_position(gx, gy);
                assert_eq!(
                    grid.get(gx, gy),
                    noise.raw(wx, wy) as f32,
                    "height at ({gx}, {gy})"
                );
            }
        }

        let events: Vec<PipelineEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 4 + 1 + 4 + 4 + 1, "{events:?}");
        for (i, event) in events[..4].iter().enumerate() {
            let PipelineEvent::SectionReady { section_index, .. } = event else {
                panic!("expected SectionReady, got {event:?}");
            };
            assert_eq!(*section_index, i);
        }
        assert_eq!(events[4], PipelineEvent::AllSectionsReady);
        for (i, event) in events[5..13].iter().enumerate() {
            let PipelineEvent::SectionUpdated {
                section_index,
                vertices,
                normals,
                tangents,
                ..
            } = event
            else {
                panic!("expected a section update, got {event:?}");
            };
            assert_eq!(*section_index, i % 4);
            assert_eq!(normals.len(), vertices.len());
            assert!(tangents.iter().all(|t| t.is_finite()));
        }
        assert!(matches!(events[13], PipelineEvent::GenerationFinished(ref s) if s.runs == 1));
    }

    #[test]
    fn test_meshes_share_border_vertices() {
        let (mut pipeline, _rx) = channel_pipeline();
        pipeline.start(pure_noise_options(3)).unwrap();
        pipeline.run_to_completion().unwrap();

        let meshes = pipeline.meshes();
        let left = &meshes[0];
        let right = &meshes[1];
        for y in 0..8 {
            let border = left.vertices[y * left.width + left.width - 1];
            let first = right.vertices[y * right.width];
            assert_eq!(border, first, "row {y}");
        }
    }

    #[test]
    fn test_batch_generates_and_reuses_distinct_seeds() {
        let (mut pipeline, rx) = channel_pipeline();
        let options = pure_noise_options(5);

        pipeline.start_batch(options.clone(), 3).unwrap();
        let first = pipeline.run_to_completion().unwrap().clone();
        assert_eq!(first.runs, 3);
        assert_eq!(first.seeds.len(), 3);
        assert_ne!(first.seeds[0], first.seeds[1]);
        assert_ne!(first.seeds[1], first.seeds[2]);
        assert_ne!(first.seeds[0], first.seeds[2]);

        let events: Vec<PipelineEvent> = rx.try_iter().collect();
        let finished = events
            .iter()
            .filter(|e| matches!(e, PipelineEvent::GenerationFinished(_)))
            .count();
        let ready = events
            .iter()
            .filter(|e| matches!(e, PipelineEvent::SectionReady { .. }))
            .count();
        assert_eq!(finished, 1, "one finish per batch");
        assert_eq!(ready, 3 * 4);

        pipeline.start_batch(options, 3).unwrap();
        let second = pipeline.run_to_completion().unwrap();
        assert_eq!(second.seeds, first.seeds);
    }

    #[test]
    fn test_start_while_running_is_rejected() {
        let (mut pipeline, _rx) = channel_pipeline();
        pipeline.start(pure_noise_options(1)).unwrap();
        assert!(matches!(
            pipeline.start(pure_noise_options(2)),
            Err(PipelineError::RunInFlight(PipelineState::GeneratingHeights))
        ));
        assert!(matches!(
            pipeline.start_batch(pure_noise_options(2), 2),
            Err(PipelineError::RunInFlight(_))
        ));
        pipeline.run_to_completion().unwrap();
        assert!(pipeline.start(pure_noise_options(2)).is_ok());
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let (mut pipeline, _rx) = channel_pipeline();
        assert!(matches!(
            pipeline.start_batch(GenerationOptions::default(), 0),
            Err(PipelineError::EmptyBatch)
        ));
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[test]
    fn test_invalid_geometry_fails_at_construction() {
        let result = SectionPipeline::new(GridGeometry::new(0, 2, 8, 8, 100.0), 1, ());
        assert!(matches!(
            result,
            Err(PipelineError::Grid(GridError::InvalidSectionCount { .. }))
        ));
    }

    #[test]
    fn test_invalid_options_fail_at_start() {
        let (mut pipeline, _rx) = channel_pipeline();
        let mut options = GenerationOptions::default();
        options.particle.evaporation = 0.0;
        assert!(matches!(
            pipeline.start(options),
            Err(PipelineError::Grid(GridError::InvalidConstant { .. }))
        ));
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[test]
    fn test_poll_drives_run_to_done() {
        let mut pipeline = SectionPipeline::new(small_geometry(), 1, ()).unwrap();
        let mut options = GenerationOptions {
            seed: 21,
            method: ErosionMethod::Particle,
            execution: ExecutionPath::Vectorized,
            smoothing: Some(1),
            ..Default::default()
        };
        options.particle.iterations = 50;
        pipeline.start(options).unwrap();

        let start = Instant::now();
        let mut seen = vec![PipelineState::GeneratingHeights];
        loop {
            let state = pipeline.poll().unwrap();
            if seen.last() != Some(&state) {
                seen.push(state);
            }
            if state == PipelineState::Done {
                break;
            }
            assert!(start.elapsed() < Duration::from_secs(30), "timed out");
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(
            seen,
            vec![
                PipelineState::GeneratingHeights,
                PipelineState::AwaitingTangents,
                PipelineState::Eroding,
                PipelineState::RefreshingPostErosion,
                PipelineState::Done,
            ]
        );

        // Refreshed meshes carry the eroded heights.
        let grid = pipeline.grid().unwrap();
        for mesh in pipeline.meshes() {
            let heights = grid.section_heights(mesh.section_index);
            let z: Vec<f32> = mesh.vertices.iter().map(|v| v.z).collect();
            assert_eq!(z, heights, "section {}", mesh.section_index);
            assert_eq!(mesh.normals.len(), mesh.vertex_count());
        }
    }

    #[test]
    fn test_stats_accumulate_stage_time() {
        let mut pipeline = SectionPipeline::new(small_geometry(), 1, ()).unwrap();
        let mut options = GenerationOptions::default();
        options.grid.iterations = 4;
        options.thermal = Some(Default::default());
        pipeline.start(options).unwrap();
        let stats = pipeline.run_to_completion().unwrap();
        assert!(stats.height_generation > Duration::ZERO);
        assert!(stats.tbn_calculation > Duration::ZERO);
        assert!(stats.erosion > Duration::ZERO);
    }
}
