use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use tracing::info;

use crate::config::{NullRendering, SqlConfig, SqlLayout, WriteMode};
use crate::error::{PipelineError, Result};
use crate::outputs::{append_to, write_atomically};

#[derive(Debug, Clone, Serialize)]
pub struct SqlReport {
    pub sql_path: PathBuf,
    pub rows: usize,
    pub statements: usize,
}

/// Serializes the result CSV into INSERT statements. Every data row becomes exactly one
/// value tuple whose values follow the CSV header order.
pub fn generate_sql_output(config: &SqlConfig) -> Result<SqlReport> {
    let (columns, rows) = read_csv_rows(&config.csv_path)?;
    let script = render_insert_script(
        &config.table_name,
        &columns,
        &rows,
        config.layout,
        config.null_rendering,
    );

    let write_script = |writer: &mut std::io::BufWriter<File>| {
        writer
            .write_all(script.as_bytes())
            .map_err(|err| PipelineError::io(&config.sql_path, err))
    };
    match config.write_mode {
        WriteMode::Overwrite => write_atomically(&config.sql_path, write_script)?,
        WriteMode::Append => append_to(&config.sql_path, write_script)?,
    }

    let report = SqlReport {
        sql_path: config.sql_path.clone(),
        rows: rows.len(),
        statements: statement_count(rows.len(), config.layout),
    };

    info!(
        output = %report.sql_path.display(),
        rows = report.rows,
        statements = report.statements,
        "sql script written"
    );

    Ok(report)
}

fn read_csv_rows(path: &Path) -> Result<(Vec<String>, Vec<StringRecord>)> {
    let csv_error = |source: csv::Error| PipelineError::Csv {
        file: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(|err| PipelineError::io(path, err))?;
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

    let headers = reader.headers().map_err(csv_error)?.clone();
    if headers.is_empty() {
        return Err(PipelineError::EmptyHeader {
            file: path.to_path_buf(),
        });
    }
    let columns = headers.iter().map(str::to_string).collect();

    let rows = reader
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(csv_error)?;

    Ok((columns, rows))
}

/// Renders the full script text. No rows renders an empty script.
pub fn render_insert_script(
    table: &str,
    columns: &[String],
    rows: &[StringRecord],
    layout: SqlLayout,
    nulls: NullRendering,
) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let header = format!(
        "INSERT INTO {} ({}) VALUES",
        quote_table_name(table),
        columns
            .iter()
            .map(|column| quote_identifier(column))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let tuples = rows.iter().map(|row| render_tuple(row, nulls));

    let mut script = String::new();
    match layout {
        SqlLayout::MultiRow => {
            script.push_str(&header);
            script.push('\n');
            script.push_str(&tuples.collect::<Vec<_>>().join(",\n"));
            script.push_str(";\n");
        }
        SqlLayout::PerRow => {
            for tuple in tuples {
                script.push_str(&header);
                script.push(' ');
                script.push_str(&tuple);
                script.push_str(";\n");
            }
        }
    }
    script
}

pub fn statement_count(rows: usize, layout: SqlLayout) -> usize {
    match layout {
        SqlLayout::MultiRow => usize::from(rows > 0),
        SqlLayout::PerRow => rows,
    }
}

fn render_tuple(row: &StringRecord, nulls: NullRendering) -> String {
    let values: Vec<String> = row.iter().map(|value| render_value(value, nulls)).collect();
    format!("({})", values.join(", "))
}

pub fn render_value(value: &str, nulls: NullRendering) -> String {
    if value.is_empty() {
        return match nulls {
            NullRendering::Null => "NULL".to_string(),
            NullRendering::EmptyString => "''".to_string(),
        };
    }
    format!("'{}'", value.replace('\'', "''"))
}

/// Leaves plain identifiers bare and double-quotes anything else.
pub fn quote_identifier(ident: &str) -> String {
    let mut chars = ident.chars();
    let plain = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if plain {
        ident.to_string()
    } else {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

pub fn quote_table_name(name: &str) -> String {
    name.split('.')
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(".")
}
