use std::fs;
use std::path::{Path, PathBuf};

use dados_core::config::{TimestampPolicy, TransformConfig};
use dados_core::error::{ErrorKind, PipelineError};
use dados_core::transform::evaluate_data;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name)
}

fn config_for(records: &Path, types: &Path, output: &Path) -> TransformConfig {
    TransformConfig {
        records_csv: records.to_path_buf(),
        types_csv: types.to_path_buf(),
        output_csv: output.to_path_buf(),
        ..TransformConfig::default()
    }
}

fn write_inputs(dir: &Path, records: &str, types: &str) -> (PathBuf, PathBuf) {
    let records_path = dir.join("origem-dados.csv");
    let types_path = dir.join("tipos.csv");
    fs::write(&records_path, records).expect("write records");
    fs::write(&types_path, types).expect("write types");
    (records_path, types_path)
}

fn read_output(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).expect("open output csv");
    let headers = reader
        .headers()
        .expect("headers")
        .iter()
        .map(str::to_string)
        .collect();
    let rows = reader
        .records()
        .map(|record| {
            record
                .expect("record")
                .iter()
                .map(str::to_string)
                .collect()
        })
        .collect();
    (headers, rows)
}

fn column<'a>(headers: &[String], rows: &'a [Vec<String>], name: &str) -> Vec<&'a str> {
    let idx = headers
        .iter()
        .position(|header| header == name)
        .unwrap_or_else(|| panic!("missing column {name}"));
    rows.iter().map(|row| row[idx].as_str()).collect()
}

#[test]
fn example_scenario_keeps_the_single_critical_row() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (records, types) = write_inputs(
        dir.path(),
        "tipo,status,created_at\n1,CRITICO,2024-01-01\n2,OK,2024-01-02\n",
        "id,nome\n1,Falha Critica\n2,Informativo\n",
    );
    let output = dir.path().join("dados_finais.csv");

    let report = evaluate_data(&config_for(&records, &types, &output)).expect("transform");

    assert_eq!(report.rows_written, 1);
    assert_eq!(report.output_csv, output);
    let (headers, rows) = read_output(&output);
    assert_eq!(headers, vec!["tipo", "status", "created_at", "nome_tipo"]);
    assert_eq!(
        rows,
        vec![vec!["1", "CRITICO", "2024-01-01", "Falha Critica"]]
    );
}

#[test]
fn fixture_run_filters_sorts_and_joins() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("dados_finais.csv");

    let report = evaluate_data(&config_for(
        &fixture_path("origem-dados.csv"),
        &fixture_path("tipos.csv"),
        &output,
    ))
    .expect("transform");

    assert_eq!(report.records_rows, 8);
    assert_eq!(report.types_rows, 3);
    // Eight records plus the type row nobody references.
    assert_eq!(report.joined_rows, 9);
    assert_eq!(report.rows_written, 4);
    assert_eq!(
        report.columns,
        vec!["created_at", "status", "tipo", "descricao", "nome_tipo"]
    );

    let (headers, rows) = read_output(&output);
    assert_eq!(headers, report.columns);
    assert_eq!(
        column(&headers, &rows, "descricao"),
        vec![
            "Falha sem tipo",
            "Empate mais tarde no arquivo",
            "Disco cheio",
            "Texto com, virgula e 'aspas'",
        ]
    );
    assert_eq!(
        column(&headers, &rows, "nome_tipo"),
        vec!["", "Informativo", "Falha Critica", "Informativo"]
    );
}

#[test]
fn near_miss_statuses_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("dados_finais.csv");

    evaluate_data(&config_for(
        &fixture_path("origem-dados.csv"),
        &fixture_path("tipos.csv"),
        &output,
    ))
    .expect("transform");

    let (headers, rows) = read_output(&output);
    let statuses = column(&headers, &rows, "status");
    assert!(statuses.iter().all(|status| *status == "CRITICO"));
    for near_miss in ["crítico", "CRÍTICO", "Critico"] {
        assert!(!statuses.contains(&near_miss), "{near_miss} passed the filter");
    }
}

#[test]
fn created_at_is_sorted_chronologically_not_lexically() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (records, types) = write_inputs(
        dir.path(),
        "tipo,status,created_at\n\
         1,CRITICO,2024-02-01T09:00:00\n\
         1,CRITICO,2024-10-01\n\
         1,CRITICO,2024-02-01 10:00\n\
         1,CRITICO,2024-02-01T12:00:00-03:00\n",
        "id,nome\n1,Falha Critica\n",
    );
    let output = dir.path().join("dados_finais.csv");

    evaluate_data(&config_for(&records, &types, &output)).expect("transform");

    let (headers, rows) = read_output(&output);
    assert_eq!(
        column(&headers, &rows, "created_at"),
        vec![
            "2024-10-01",
            "2024-02-01T12:00:00-03:00",
            "2024-02-01 10:00",
            "2024-02-01T09:00:00",
        ]
    );
}

#[test]
fn unmatched_tipo_keeps_the_row_with_empty_nome_tipo() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (records, types) = write_inputs(
        dir.path(),
        "tipo,status,created_at\n9,CRITICO,2024-01-01\n",
        "id,nome\n1,Falha Critica\n",
    );
    let output = dir.path().join("dados_finais.csv");

    let report = evaluate_data(&config_for(&records, &types, &output)).expect("transform");

    assert_eq!(report.joined_rows, 2);
    let (headers, rows) = read_output(&output);
    assert_eq!(rows.len(), 1);
    assert_eq!(column(&headers, &rows, "tipo"), vec!["9"]);
    assert_eq!(column(&headers, &rows, "nome_tipo"), vec![""]);
}

#[test]
fn passthrough_values_keep_their_text() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (records, types) = write_inputs(
        dir.path(),
        "tipo,status,created_at,codigo,valor\n01,CRITICO,2024-01-01,007,1.50\n",
        "id,nome\n01,Zero Um\n1,Um\n",
    );
    let output = dir.path().join("dados_finais.csv");

    evaluate_data(&config_for(&records, &types, &output)).expect("transform");

    let (headers, rows) = read_output(&output);
    assert_eq!(column(&headers, &rows, "tipo"), vec!["01"]);
    assert_eq!(column(&headers, &rows, "codigo"), vec!["007"]);
    assert_eq!(column(&headers, &rows, "valor"), vec!["1.50"]);
    assert_eq!(column(&headers, &rows, "nome_tipo"), vec!["Zero Um"]);
}

#[test]
fn no_matching_rows_writes_a_header_only_csv() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (records, types) = write_inputs(
        dir.path(),
        "tipo,status,created_at\n1,OK,2024-01-01\n",
        "id,nome\n1,Falha Critica\n",
    );
    let output = dir.path().join("dados_finais.csv");

    let report = evaluate_data(&config_for(&records, &types, &output)).expect("transform");

    assert_eq!(report.rows_written, 0);
    let (headers, rows) = read_output(&output);
    assert_eq!(headers, vec!["tipo", "status", "created_at", "nome_tipo"]);
    assert!(rows.is_empty());
}

#[test]
fn status_literal_is_configurable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("dados_finais.csv");
    let config = TransformConfig {
        status_filter: "CRÍTICO".to_string(),
        ..config_for(
            &fixture_path("origem-dados.csv"),
            &fixture_path("tipos.csv"),
            &output,
        )
    };

    let report = evaluate_data(&config).expect("transform");

    assert_eq!(report.rows_written, 1);
    let (headers, rows) = read_output(&output);
    assert_eq!(column(&headers, &rows, "descricao"), vec!["Acentuado"]);
}

#[test]
fn strict_policy_rejects_unparseable_timestamps() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (records, types) = write_inputs(
        dir.path(),
        "tipo,status,created_at\n1,CRITICO,2024-01-01\n2,OK,ontem\n",
        "id,nome\n1,Falha Critica\n",
    );
    let output = dir.path().join("dados_finais.csv");

    let err = evaluate_data(&config_for(&records, &types, &output)).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Schema);
    match err {
        PipelineError::InvalidTimestamp { row, value, .. } => {
            assert_eq!(row, 2);
            assert_eq!(value, "ontem");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!output.exists(), "no partial output expected");
}

#[test]
fn lenient_policy_sorts_missing_timestamps_last() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (records, types) = write_inputs(
        dir.path(),
        "tipo,status,created_at,descricao\n\
         1,CRITICO,ontem,sem data valida\n\
         1,CRITICO,,vazio\n\
         1,CRITICO,2024-01-01,antigo\n\
         1,CRITICO,2024-06-01,recente\n",
        "id,nome\n1,Falha Critica\n",
    );
    let output = dir.path().join("dados_finais.csv");
    let config = TransformConfig {
        timestamp_policy: TimestampPolicy::Lenient,
        ..config_for(&records, &types, &output)
    };

    let report = evaluate_data(&config).expect("transform");

    assert_eq!(report.rows_written, 4);
    let (headers, rows) = read_output(&output);
    assert_eq!(
        column(&headers, &rows, "descricao"),
        vec!["recente", "antigo", "sem data valida", "vazio"]
    );
    assert_eq!(column(&headers, &rows, "created_at")[2], "ontem");
}

#[test]
fn missing_required_column_is_reported_by_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (records, types) = write_inputs(
        dir.path(),
        "tipo,status\n1,CRITICO\n",
        "id,nome\n1,Falha Critica\n",
    );
    let output = dir.path().join("dados_finais.csv");

    let err = evaluate_data(&config_for(&records, &types, &output)).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Schema);
    match err {
        PipelineError::MissingColumn { file, column } => {
            assert_eq!(file, records);
            assert_eq!(column, "created_at");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn types_without_nome_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (records, types) = write_inputs(
        dir.path(),
        "tipo,status,created_at\n1,CRITICO,2024-01-01\n",
        "id,descricao\n1,Falha Critica\n",
    );
    let output = dir.path().join("dados_finais.csv");

    let err = evaluate_data(&config_for(&records, &types, &output)).unwrap_err();

    assert!(
        matches!(err, PipelineError::MissingColumn { ref column, .. } if column == "nome"),
        "unexpected error: {err}"
    );
}

#[test]
fn missing_input_file_is_an_io_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("dados_finais.csv");

    let err = evaluate_data(&config_for(
        &dir.path().join("nao-existe.csv"),
        &fixture_path("tipos.csv"),
        &output,
    ))
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(!output.exists());
}

#[test]
fn records_column_named_nome_does_not_shadow_the_type_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (records, types) = write_inputs(
        dir.path(),
        "tipo,status,created_at,nome\n\
         9,CRITICO,2024-01-02,registro sem tipo\n\
         1,CRITICO,2024-01-01,registro um\n",
        "id,nome\n1,Falha\n",
    );
    let output = dir.path().join("dados_finais.csv");

    let report = evaluate_data(&config_for(&records, &types, &output)).expect("transform");

    assert_eq!(
        report.columns,
        vec!["tipo", "status", "created_at", "nome", "nome_tipo"]
    );
    let (headers, rows) = read_output(&output);
    assert_eq!(headers, report.columns);
    assert_eq!(column(&headers, &rows, "tipo"), vec!["9", "1"]);
    assert_eq!(
        column(&headers, &rows, "nome"),
        vec!["registro sem tipo", "registro um"]
    );
    assert_eq!(column(&headers, &rows, "nome_tipo"), vec!["", "Falha"]);
}

#[test]
fn records_with_a_nome_tipo_column_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (records, types) = write_inputs(
        dir.path(),
        "tipo,status,created_at,nome_tipo\n1,CRITICO,2024-01-01,proprio\n",
        "id,nome\n1,Falha\n",
    );
    let output = dir.path().join("dados_finais.csv");

    let err = evaluate_data(&config_for(&records, &types, &output)).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Schema);
    match err {
        PipelineError::ColumnConflict { file, column } => {
            assert_eq!(file, records);
            assert_eq!(column, "nome_tipo");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!output.exists());
}
