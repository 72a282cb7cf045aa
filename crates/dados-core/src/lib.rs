pub mod archive;
pub mod config;
pub mod error;
pub mod outputs;
pub mod pipeline;
pub mod sql;
pub mod timestamp;
pub mod transform;

pub use archive::extract_archive;
pub use config::{
    NullRendering, PipelineConfig, SqlConfig, SqlLayout, TimestampPolicy, TransformConfig,
    WriteMode,
};
pub use error::{ErrorKind, PipelineError, Result};
pub use pipeline::{Pipeline, RunSummary};
pub use sql::{generate_sql_output, SqlReport};
pub use transform::{evaluate_data, TransformReport};
