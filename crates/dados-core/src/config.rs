use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub const DEFAULT_ARCHIVE: &str = "dados.zip";
pub const DEFAULT_RECORDS_CSV: &str = "origem-dados.csv";
pub const DEFAULT_TYPES_CSV: &str = "tipos.csv";
pub const DEFAULT_OUTPUT_CSV: &str = "dados_finais.csv";
pub const DEFAULT_SQL_OUTPUT: &str = "insert-dados.sql";
pub const DEFAULT_TABLE_NAME: &str = "dados_finais";
pub const DEFAULT_STATUS_FILTER: &str = "CRITICO";

/// What to do with a non-empty `created_at` value that matches no known format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampPolicy {
    /// Abort the run with [`PipelineError::InvalidTimestamp`].
    #[default]
    Strict,
    /// Treat the value as a missing timestamp; the row sorts last.
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlLayout {
    /// One `INSERT ... VALUES` header followed by every tuple, ending in a single `;`.
    #[default]
    MultiRow,
    /// One complete `INSERT` statement per row.
    PerRow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    #[default]
    Overwrite,
    Append,
}

/// How an empty CSV field is written into a value tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullRendering {
    #[default]
    Null,
    EmptyString,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformConfig {
    pub records_csv: PathBuf,
    pub types_csv: PathBuf,
    pub output_csv: PathBuf,
    pub status_filter: String,
    pub timestamp_policy: TimestampPolicy,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            records_csv: PathBuf::from(DEFAULT_RECORDS_CSV),
            types_csv: PathBuf::from(DEFAULT_TYPES_CSV),
            output_csv: PathBuf::from(DEFAULT_OUTPUT_CSV),
            status_filter: DEFAULT_STATUS_FILTER.to_string(),
            timestamp_policy: TimestampPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlConfig {
    pub csv_path: PathBuf,
    pub sql_path: PathBuf,
    pub table_name: String,
    pub layout: SqlLayout,
    pub write_mode: WriteMode,
    pub null_rendering: NullRendering,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from(DEFAULT_OUTPUT_CSV),
            sql_path: PathBuf::from(DEFAULT_SQL_OUTPUT),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            layout: SqlLayout::default(),
            write_mode: WriteMode::default(),
            null_rendering: NullRendering::default(),
        }
    }
}

/// Full run configuration. File names are resolved against `input_dir` and
/// `output_dir` unless they are absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub unpack: bool,
    pub archive: PathBuf,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub records_csv: PathBuf,
    pub types_csv: PathBuf,
    pub output_csv: PathBuf,
    pub sql_output: PathBuf,
    pub table_name: String,
    pub status_filter: String,
    pub timestamp_policy: TimestampPolicy,
    pub sql_layout: SqlLayout,
    pub write_mode: WriteMode,
    pub null_rendering: NullRendering,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            unpack: true,
            archive: PathBuf::from(DEFAULT_ARCHIVE),
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("."),
            records_csv: PathBuf::from(DEFAULT_RECORDS_CSV),
            types_csv: PathBuf::from(DEFAULT_TYPES_CSV),
            output_csv: PathBuf::from(DEFAULT_OUTPUT_CSV),
            sql_output: PathBuf::from(DEFAULT_SQL_OUTPUT),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            status_filter: DEFAULT_STATUS_FILTER.to_string(),
            timestamp_policy: TimestampPolicy::default(),
            sql_layout: SqlLayout::default(),
            write_mode: WriteMode::default(),
            null_rendering: NullRendering::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)
            .map_err(|err| PipelineError::Config(format!("invalid TOML: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            PipelineError::Config(format!("cannot read '{}': {err}", path.display()))
        })?;
        Self::from_toml_str(&content).map_err(|err| match err {
            PipelineError::Config(message) => {
                PipelineError::Config(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|err| PipelineError::Config(format!("failed to render TOML: {err}")))
    }

    pub fn validate(&self) -> Result<()> {
        if self.status_filter.is_empty() {
            return Err(PipelineError::Config(
                "status_filter must not be empty".to_string(),
            ));
        }
        if self.table_name.trim().is_empty() {
            return Err(PipelineError::Config(
                "table_name must not be empty".to_string(),
            ));
        }
        for (field, value) in [
            ("records_csv", &self.records_csv),
            ("types_csv", &self.types_csv),
            ("output_csv", &self.output_csv),
            ("sql_output", &self.sql_output),
            ("archive", &self.archive),
        ] {
            if value.as_os_str().is_empty() {
                return Err(PipelineError::Config(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }

    /// `None` skips the extraction stage and reads the CSVs already in `input_dir`.
    pub fn with_archive(mut self, archive: Option<PathBuf>) -> Self {
        match archive {
            Some(path) => {
                self.unpack = true;
                self.archive = path;
            }
            None => self.unpack = false,
        }
        self
    }

    pub fn with_input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_status_filter(mut self, status: impl Into<String>) -> Self {
        self.status_filter = status.into();
        self
    }

    pub fn with_timestamp_policy(mut self, policy: TimestampPolicy) -> Self {
        self.timestamp_policy = policy;
        self
    }

    pub fn with_sql_layout(mut self, layout: SqlLayout) -> Self {
        self.sql_layout = layout;
        self
    }

    pub fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    pub fn with_null_rendering(mut self, rendering: NullRendering) -> Self {
        self.null_rendering = rendering;
        self
    }

    /// The archive path as it will be opened, or `None` when extraction is skipped.
    pub fn archive_path(&self) -> Option<PathBuf> {
        self.unpack
            .then(|| resolve(&self.input_dir, &self.archive))
    }

    pub fn output_csv_path(&self) -> PathBuf {
        resolve(&self.output_dir, &self.output_csv)
    }

    pub fn transform_config(&self) -> TransformConfig {
        TransformConfig {
            records_csv: resolve(&self.input_dir, &self.records_csv),
            types_csv: resolve(&self.input_dir, &self.types_csv),
            output_csv: self.output_csv_path(),
            status_filter: self.status_filter.clone(),
            timestamp_policy: self.timestamp_policy,
        }
    }

    pub fn sql_config(&self, csv_path: PathBuf) -> SqlConfig {
        SqlConfig {
            csv_path,
            sql_path: resolve(&self.output_dir, &self.sql_output),
            table_name: self.table_name.clone(),
            layout: self.sql_layout,
            write_mode: self.write_mode,
            null_rendering: self.null_rendering,
        }
    }
}

fn resolve(base: &Path, name: &Path) -> PathBuf {
    if name.is_absolute() {
        name.to_path_buf()
    } else {
        base.join(name)
    }
}
