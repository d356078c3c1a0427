//! Notifications from the pipeline to its mesh/rendering collaborator.

use crossbeam_channel::Sender;
use glam::{Vec2, Vec3};

use crate::GenerationStats;

/// Callbacks fired on the foreground thread as a run progresses.
///
/// Every method defaults to doing nothing, so listeners implement only what
/// they consume.
pub trait PipelineListener {
    /// A section's heights were generated and its mesh built.
    fn on_section_ready(
        &mut self,
        _section_index: usize,
        _vertices: &[Vec3],
        _indices: &[u32],
        _uvs: &[Vec2],
    ) {
    }

    /// The last section of the run is ready.
    fn on_all_sections_ready(&mut self) {}

    /// A section received a new tangent frame, either after generation or
    /// after the post-erosion refresh.
    fn on_section_updated(
        &mut self,
        _section_index: usize,
        _vertices: &[Vec3],
        _normals: &[Vec3],
        _uvs: &[Vec2],
        _tangents: &[Vec3],
    ) {
    }

    /// Once per run, or once per batch.
    fn on_generation_finished(&mut self, _stats: &GenerationStats) {}
}

impl PipelineListener for () {}

impl<L: PipelineListener + ?Sized> PipelineListener for &mut L {
    fn on_section_ready(
        &mut self,
        section_index: usize,
        vertices: &[Vec3],
        indices: &[u32],
        uvs: &[Vec2],
    ) {
        (**self).on_section_ready(section_index, vertices, indices, uvs);
    }

    fn on_all_sections_ready(&mut self) {
        (**self).on_all_sections_ready();
    }

    fn on_section_updated(
        &mut self,
        section_index: usize,
        vertices: &[Vec3],
        normals: &[Vec3],
        uvs: &[Vec2],
        tangents: &[Vec3],
    ) {
        (**self).on_section_updated(section_index, vertices, normals, uvs, tangents);
    }

    fn on_generation_finished(&mut self, stats: &GenerationStats) {
        (**self).on_generation_finished(stats);
    }
}

/// Owned form of the listener callbacks, for consumers on another thread.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    SectionReady {
        section_index: usize,
        vertices: Vec<Vec3>,
        indices: Vec<u32>,
        uvs: Vec<Vec2>,
    },
    AllSectionsReady,
    SectionUpdated {
        section_index: usize,
        vertices: Vec<Vec3>,
        normals: Vec<Vec3>,
        uvs: Vec<Vec2>,
        tangents: Vec<Vec3>,
    },
    GenerationFinished(GenerationStats),
}

/// Forwards every callback as a [`PipelineEvent`]. A dropped receiver is ignored.
impl PipelineListener for Sender<PipelineEvent> {
    fn on_section_ready(
        &mut self,
        section_index: usize,
        vertices: &[Vec3],
        indices: &[u32],
        uvs: &[Vec2],
    ) {
        let _ = self.send(PipelineEvent::SectionReady {
            section_index,
            vertices: vertices.to_vec(),
            indices: indices.to_vec(),
            uvs: uvs.to_vec(),
        });
    }

    fn on_all_sections_ready(&mut self) {
        let _ = self.send(PipelineEvent::AllSectionsReady);
    }

    fn on_section_updated(
        &mut self,
        section_index: usize,
        vertices: &[Vec3],
        normals: &[Vec3],
        uvs: &[Vec2],
        tangents: &[Vec3],
    ) {
        let _ = self.send(PipelineEvent::SectionUpdated {
            section_index,
            vertices: vertices.to_vec(),
            normals: normals.to_vec(),
            uvs: uvs.to_vec(),
            tangents: tangents.to_vec(),
        });
    }

    fn on_generation_finished(&mut self, stats: &GenerationStats) {
        let _ = self.send(PipelineEvent::GenerationFinished(stats.clone()));
    }
}
