use strata_terrain::GridError;
use thiserror::Error;

use crate::PipelineState;

/// Errors raised when starting or driving a [`SectionPipeline`](crate::SectionPipeline).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("a generation run is already in progress (state {0:?})")]
    RunInFlight(PipelineState),

    #[error("a batch must contain at least one run")]
    EmptyBatch,

    #[error("worker queue is full")]
    QueueFull,

    #[error("worker pool has shut down")]
    WorkerDisconnected,

    #[error("invalid grid configuration: {0}")]
    Grid(#[from] GridError),
}
