//! Run configuration for terrain generation.
//!
//! Settings persist to disk as `config.ron`, tolerate missing and unknown
//! fields, and can be overridden from the command line via clap.

mod cli;
mod config;
mod error;

pub use cli::{CliArgs, MethodArg};
pub use config::{Config, DebugConfig, PipelineConfig, default_config_dir};
pub use error::ConfigError;
