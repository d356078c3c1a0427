//! Logs pipeline progress in place of a renderer.

use glam::{Vec2, Vec3};
use strata_pipeline::{GenerationStats, PipelineListener};
use tracing::{debug, info};

/// Counts and logs every pipeline notification.
#[derive(Debug, Default)]
pub struct ProgressLog {
    pub sections_ready: usize,
    pub sections_updated: usize,
    pub vertices: usize,
    pub triangles: usize,
}

impl PipelineListener for ProgressLog {
    fn on_section_ready(
        &mut self,
        section_index: usize,
        vertices: &[Vec3],
        indices: &[u32],
        _uvs: &[Vec2],
    ) {
        self.sections_ready += 1;
        self.vertices += vertices.len();
        self.triangles += indices.len() / 3;
        debug!(
            section = section_index,
            vertices = vertices.len(),
            triangles = indices.len() / 3,
            "section ready"
        );
    }

    fn on_all_sections_ready(&mut self) {
        info!(sections = self.sections_ready, "all sections generated");
    }

    fn on_section_updated(
        &mut self,
        section_index: usize,
        _vertices: &[Vec3],
        normals: &[Vec3],
        _uvs: &[Vec2],
        _tangents: &[Vec3],
    ) {
        self.sections_updated += 1;
        debug!(section = section_index, normals = normals.len(), "section updated");
    }

    fn on_generation_finished(&mut self, stats: &GenerationStats) {
        info!(
            runs = stats.runs,
            seeds = ?stats.seeds,
            height_generation_s = stats.height_generation.as_secs_f64(),
            tbn_calculation_s = stats.tbn_calculation.as_secs_f64(),
            erosion_s = stats.erosion.as_secs_f64(),
            "generation finished"
        );
    }
}
