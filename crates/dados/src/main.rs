use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dados_core::{
    evaluate_data, extract_archive, generate_sql_output, ErrorKind, NullRendering, Pipeline,
    PipelineConfig, PipelineError, SqlLayout, TimestampPolicy, WriteMode,
};
use serde_json::Value;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "dados.toml";

#[derive(Parser, Debug)]
#[command(author, version, about = "Critical-record ETL: unzip, join, filter, sort and emit SQL", long_about = None)]
struct Cli {
    /// TOML configuration file (falls back to $DADOS_CONFIG, then ./dados.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Exit with a non-zero status when the run fails
    #[arg(long, global = true)]
    strict: bool,
    /// Print the stage report as JSON on stdout
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Unpack, transform and emit SQL (the default)
    Run(ConfigOverrides),
    /// Extract the archive into the input directory
    Unpack(ConfigOverrides),
    /// Build the result CSV from the records and types CSVs
    Transform(ConfigOverrides),
    /// Generate the SQL script from a result CSV
    EmitSql(EmitSqlArgs),
    /// Print the resolved configuration as TOML
    ShowConfig(ConfigOverrides),
}

#[derive(Args, Debug, Default, Clone)]
struct ConfigOverrides {
    /// Archive to extract before transforming
    #[arg(long, conflicts_with = "no_archive")]
    archive: Option<PathBuf>,
    /// Skip extraction and read the CSVs already in the input directory
    #[arg(long)]
    no_archive: bool,
    #[arg(long)]
    input_dir: Option<PathBuf>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Status value a row must carry to be kept
    #[arg(long)]
    status: Option<String>,
    #[arg(long, value_enum)]
    layout: Option<LayoutArg>,
    /// Append to the SQL file instead of replacing it
    #[arg(long)]
    append: bool,
    /// Treat unparseable created_at values as missing instead of failing
    #[arg(long)]
    lenient_timestamps: bool,
    /// Render empty fields as '' instead of NULL
    #[arg(long)]
    empty_string_nulls: bool,
}

#[derive(Args, Debug, Default)]
struct EmitSqlArgs {
    /// Result CSV to read (defaults to the configured output CSV)
    #[arg(long)]
    csv: Option<PathBuf>,
    #[command(flatten)]
    overrides: ConfigOverrides,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LayoutArg {
    MultiRow,
    PerRow,
}

impl From<LayoutArg> for SqlLayout {
    fn from(value: LayoutArg) -> Self {
        match value {
            LayoutArg::MultiRow => SqlLayout::MultiRow,
            LayoutArg::PerRow => SqlLayout::PerRow,
        }
    }
}

impl ConfigOverrides {
    fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if self.no_archive {
            config = config.with_archive(None);
        } else if let Some(archive) = &self.archive {
            config = config.with_archive(Some(archive.clone()));
        }
        if let Some(dir) = &self.input_dir {
            config = config.with_input_dir(dir);
        }
        if let Some(dir) = &self.output_dir {
            config = config.with_output_dir(dir);
        }
        if let Some(status) = &self.status {
            config = config.with_status_filter(status);
        }
        if let Some(layout) = self.layout {
            config = config.with_sql_layout(layout.into());
        }
        if self.append {
            config = config.with_write_mode(WriteMode::Append);
        }
        if self.lenient_timestamps {
            config = config.with_timestamp_policy(TimestampPolicy::Lenient);
        }
        if self.empty_string_nulls {
            config = config.with_null_rendering(NullRendering::EmptyString);
        }
        config
    }
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let strict = cli.strict || env_flag("DADOS_STRICT");

    let outcome = execute(&cli);
    if let Err(err) = &outcome {
        let kind = err.downcast_ref::<PipelineError>().map(PipelineError::kind);
        error!(
            kind = kind.map_or("other", |kind| kind.as_str()),
            error = %format!("{err:#}"),
            "run failed"
        );
    }
    ExitCode::from(process_status(&outcome, strict))
}

fn execute(cli: &Cli) -> Result<()> {
    let default_overrides = ConfigOverrides::default();
    let overrides = match &cli.command {
        None => &default_overrides,
        Some(Command::Run(overrides))
        | Some(Command::Unpack(overrides))
        | Some(Command::Transform(overrides))
        | Some(Command::ShowConfig(overrides)) => overrides,
        Some(Command::EmitSql(args)) => &args.overrides,
    };
    let config = overrides.apply(load_config(cli.config.as_deref())?);
    config.validate()?;

    let report = match &cli.command {
        None | Some(Command::Run(_)) => {
            let summary = Pipeline::new(config)?.run()?;
            serde_json::to_value(&summary)?
        }
        Some(Command::Unpack(_)) => {
            let archive = config
                .archive_path()
                .context("archive extraction is disabled by the configuration")?;
            let extracted = extract_archive(&archive, &config.input_dir)?;
            serde_json::to_value(&extracted)?
        }
        Some(Command::Transform(_)) => {
            create_output_dir(&config)?;
            let report = evaluate_data(&config.transform_config())?;
            serde_json::to_value(&report)?
        }
        Some(Command::EmitSql(args)) => {
            create_output_dir(&config)?;
            let csv_path = args.csv.clone().unwrap_or_else(|| config.output_csv_path());
            let report = generate_sql_output(&config.sql_config(csv_path))?;
            serde_json::to_value(&report)?
        }
        Some(Command::ShowConfig(_)) => {
            print!("{}", config.to_toml_string()?);
            return Ok(());
        }
    };

    if cli.json {
        print_json(&report)?;
    }
    Ok(())
}

fn load_config(explicit: Option<&Path>) -> Result<PipelineConfig> {
    let from_env = env::var_os("DADOS_CONFIG").map(PathBuf::from);
    match config_source(explicit, from_env, Path::new(DEFAULT_CONFIG_FILE)) {
        Some(path) => {
            info!(path = %path.display(), "using configuration file");
            PipelineConfig::from_toml_file(&path)
                .with_context(|| format!("failed to load configuration from '{}'", path.display()))
        }
        None => Ok(PipelineConfig::default()),
    }
}

/// `--config` wins over `DADOS_CONFIG`; the working-directory default is only used when present.
fn config_source(
    explicit: Option<&Path>,
    from_env: Option<PathBuf>,
    default: &Path,
) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or(from_env)
        .or_else(|| default.exists().then(|| default.to_path_buf()))
}

fn create_output_dir(config: &PipelineConfig) -> Result<()> {
    std::fs::create_dir_all(&config.output_dir)
        .map_err(|err| PipelineError::io(&config.output_dir, err))?;
    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|value| matches!(value.trim(), "1" | "true" | "TRUE" | "yes"))
        .unwrap_or(false)
}

fn exit_code(kind: Option<ErrorKind>) -> u8 {
    match kind {
        Some(ErrorKind::Extraction) => 1,
        Some(ErrorKind::Schema) => 2,
        Some(ErrorKind::Io) => 3,
        Some(ErrorKind::Config) | None => 4,
    }
}

fn process_status(outcome: &Result<()>, strict: bool) -> u8 {
    match outcome {
        Ok(()) => 0,
        Err(_) if !strict => 0,
        Err(err) => exit_code(err.downcast_ref::<PipelineError>().map(PipelineError::kind)),
    }
}
