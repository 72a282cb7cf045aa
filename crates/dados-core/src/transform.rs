use std::fs::File;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{TimestampPolicy, TransformConfig};
use crate::error::{PipelineError, Result};
use crate::outputs::write_atomically;
use crate::timestamp::parse_timestamp;

pub const TIPO: &str = "tipo";
pub const STATUS: &str = "status";
pub const CREATED_AT: &str = "created_at";
pub const TYPE_ID: &str = "id";
pub const TYPE_NAME: &str = "nome";
pub const TYPE_NAME_OUTPUT: &str = "nome_tipo";

const RECORD_COLUMNS: [&str; 3] = [TIPO, STATUS, CREATED_AT];
const TYPE_COLUMNS: [&str; 2] = [TYPE_ID, TYPE_NAME];

// Helper columns; never written out.
const ROW_ORDER: &str = "__dados_row_order";
const SORT_KEY: &str = "__dados_created_at";

#[derive(Debug, Clone, Serialize)]
pub struct TransformReport {
    pub output_csv: PathBuf,
    pub records_rows: usize,
    pub types_rows: usize,
    pub joined_rows: usize,
    pub rows_written: usize,
    pub columns: Vec<String>,
}

/// Joins records with their types, keeps the rows whose status matches the configured
/// literal, orders them newest first and writes the result table as CSV.
pub fn evaluate_data(config: &TransformConfig) -> Result<TransformReport> {
    let records = read_text_csv(&config.records_csv)?;
    require_columns(&records, &config.records_csv, &RECORD_COLUMNS)?;
    let types = read_text_csv(&config.types_csv)?;
    require_columns(&types, &config.types_csv, &TYPE_COLUMNS)?;

    debug!(
        records = records.height(),
        types = types.height(),
        "loaded transform inputs"
    );

    let table = build_result_table(
        &records,
        &types,
        &config.status_filter,
        config.timestamp_policy,
        &config.records_csv,
    )?;
    let mut frame = table.frame;
    let columns: Vec<String> = frame
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    write_atomically(&config.output_csv, |writer| {
        CsvWriter::new(writer)
            .include_header(true)
            .finish(&mut frame)
            .map_err(PipelineError::from)
    })?;

    let report = TransformReport {
        output_csv: config.output_csv.clone(),
        records_rows: records.height(),
        types_rows: types.height(),
        joined_rows: table.joined_rows,
        rows_written: frame.height(),
        columns,
    };

    info!(
        output = %report.output_csv.display(),
        joined = report.joined_rows,
        written = report.rows_written,
        status = %config.status_filter,
        "result table written"
    );

    Ok(report)
}

/// In-memory result of the join/filter/sort stage.
#[derive(Debug, Clone)]
pub struct ResultTable {
    pub frame: DataFrame,
    pub joined_rows: usize,
}

/// Builds the result table from already-loaded frames whose required columns have been
/// checked. `records_source` only labels errors.
pub fn build_result_table(
    records: &DataFrame,
    types: &DataFrame,
    status_filter: &str,
    policy: TimestampPolicy,
    records_source: &Path,
) -> Result<ResultTable> {
    // A records column already called nome_tipo would shadow the type name after the join.
    if records
        .get_column_names()
        .iter()
        .any(|name| name.as_str() == TYPE_NAME_OUTPUT)
    {
        return Err(PipelineError::ColumnConflict {
            file: records_source.to_path_buf(),
            column: TYPE_NAME_OUTPUT.to_string(),
        });
    }

    // Renamed before the join so a passthrough `nome` on the records side stays its own column.
    let types = types
        .clone()
        .lazy()
        .rename([TYPE_ID, TYPE_NAME], [TIPO, TYPE_NAME_OUTPUT], true);

    let mut joined = records
        .clone()
        .lazy()
        .with_row_index(ROW_ORDER, None)
        .join(
            types,
            [col(TIPO)],
            [col(TIPO)],
            JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
        )
        .collect()?;
    let joined_rows = joined.height();

    let sort_key = created_at_sort_key(&joined, policy, records_source)?;
    joined.with_column(sort_key)?;

    let sorted = joined
        .lazy()
        .filter(col(STATUS).eq(lit(status_filter)))
        .sort(
            [SORT_KEY, ROW_ORDER],
            SortMultipleOptions::default()
                .with_order_descending_multi([true, false])
                .with_nulls_last(true)
                .with_maintain_order(true),
        )
        .collect()?;

    let output_columns: Vec<String> = sorted
        .get_column_names()
        .iter()
        .filter(|name| name.as_str() != ROW_ORDER && name.as_str() != SORT_KEY)
        .map(|name| name.to_string())
        .collect();
    let frame = sorted.select(output_columns)?;

    Ok(ResultTable { frame, joined_rows })
}

/// Reads a CSV with a header row, keeping every column as text.
pub fn read_text_csv(path: &Path) -> Result<DataFrame> {
    let file = File::open(path).map_err(|err| PipelineError::io(path, err))?;
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(file)
        .finish()?;
    Ok(frame)
}

pub fn require_columns(frame: &DataFrame, file: &Path, required: &[&str]) -> Result<()> {
    let present = frame.get_column_names();
    for column in required {
        if !present.iter().any(|name| name.as_str() == *column) {
            return Err(PipelineError::MissingColumn {
                file: file.to_path_buf(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

fn created_at_sort_key(
    joined: &DataFrame,
    policy: TimestampPolicy,
    records_source: &Path,
) -> Result<Series> {
    let created_at = joined.column(CREATED_AT)?.str()?;
    let row_order = joined.column(ROW_ORDER)?.cast(&DataType::Int64)?;
    let row_order = row_order.i64()?;

    let mut keys: Vec<Option<i64>> = Vec::with_capacity(joined.height());
    for (idx, value) in created_at.into_iter().enumerate() {
        let text = value.map(str::trim).unwrap_or_default();
        if text.is_empty() {
            keys.push(None);
            continue;
        }

        match parse_timestamp(text) {
            Some(parsed) => keys.push(Some(parsed.and_utc().timestamp_micros())),
            None => {
                // Data rows are numbered from 1, excluding the header.
                let row = row_order
                    .get(idx)
                    .map(|order| order as usize + 1)
                    .unwrap_or(idx + 1);
                match policy {
                    TimestampPolicy::Strict => {
                        return Err(PipelineError::InvalidTimestamp {
                            file: records_source.to_path_buf(),
                            row,
                            value: text.to_string(),
                        })
                    }
                    TimestampPolicy::Lenient => {
                        warn!(row, value = text, "unparseable created_at treated as missing");
                        keys.push(None);
                    }
                }
            }
        }
    }

    let series = Series::new(SORT_KEY.into(), keys)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;
    Ok(series)
}
