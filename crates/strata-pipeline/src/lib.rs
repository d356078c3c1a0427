//! Orchestration of a terrain generation run: sections are generated,
//! meshed, shaded, eroded, and refreshed in stages, with the heavy work on a
//! background worker pool and every result applied on the owning thread.

mod batch;
mod error;
mod events;
mod pipeline;
mod stats;
mod worker;

pub use batch::SeedCache;
pub use error::PipelineError;
pub use events::{PipelineEvent, PipelineListener};
pub use pipeline::{PipelineState, SectionPipeline};
pub use stats::{GenerationStats, StatCounter};
pub use worker::WorkerPool;
