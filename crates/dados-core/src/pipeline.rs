use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use crate::archive::extract_archive;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::sql::{generate_sql_output, SqlReport};
use crate::transform::{evaluate_data, TransformReport};

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub extracted_files: Vec<PathBuf>,
    pub transform: TransformReport,
    pub sql: SqlReport,
}

/// Unpack → transform → emit, once, in order. Any stage failure aborts the run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self) -> Result<RunSummary> {
        let config = &self.config;

        std::fs::create_dir_all(&config.output_dir)
            .map_err(|err| PipelineError::io(&config.output_dir, err))?;

        let extracted_files = match config.archive_path() {
            Some(archive) => extract_archive(&archive, &config.input_dir)?,
            None => {
                info!(input_dir = %config.input_dir.display(), "archive extraction skipped");
                Vec::new()
            }
        };

        let transform = evaluate_data(&config.transform_config())?;
        let sql = generate_sql_output(&config.sql_config(transform.output_csv.clone()))?;

        info!(
            extracted = extracted_files.len(),
            rows = transform.rows_written,
            statements = sql.statements,
            "pipeline run complete"
        );

        Ok(RunSummary {
            extracted_files,
            transform,
            sql,
        })
    }
}
