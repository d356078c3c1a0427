//! Generates a tiled, eroded heightfield from `config.ron` and CLI overrides.

mod paths;
mod progress;

use std::process::ExitCode;

use clap::Parser;
use strata_config::{CliArgs, Config, ConfigError};
use strata_pipeline::{PipelineError, SectionPipeline};
use tracing::{error, info};

use crate::paths::{AppDirs, PathsError};
use crate::progress::ProgressLog;

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Paths(#[from] PathsError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Logging may not be up if config loading failed.
            error!("{e}");
            eprintln!("strata: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs) -> Result<(), AppError> {
    let dirs = AppDirs::resolve(args.config.as_deref())?;
    dirs.create_dirs()?;

    let mut config = Config::load_or_create(&dirs.config_dir)?;
    config.apply_cli_overrides(args);
    config.validate()?;

    strata_log::init_logging(Some(&dirs.log_dir), cfg!(debug_assertions), Some(&config));
    info!(config_dir = %dirs.config_dir.display(), "strata starting");

    let mut pipeline = SectionPipeline::new(
        config.geometry,
        config.pipeline.worker_threads,
        ProgressLog::default(),
    )?;

    let runs = config.pipeline.batch_runs.max(1);
    if runs > 1 {
        pipeline.start_batch(config.generation.clone(), runs)?;
    } else {
        pipeline.start(config.generation.clone())?;
    }
    let stats = pipeline.run_to_completion()?.clone();

    if let Some(grid) = pipeline.grid() {
        let (min, max) = grid.min_max();
        let noise = pipeline.noise();
        info!(
            min,
            max,
            normalized_min = noise.normalize(min),
            normalized_max = noise.normalize(max),
            total_height = grid.total_height(),
            "final heightfield"
        );
    }
    let progress = pipeline.listener();
    info!(
        runs = stats.runs,
        sections = progress.sections_ready,
        updates = progress.sections_updated,
        vertices = progress.vertices,
        triangles = progress.triangles,
        total_s = stats.total().as_secs_f64(),
        "done"
    );
    Ok(())
}
