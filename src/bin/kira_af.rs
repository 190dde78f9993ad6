use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_alphafold::accession_db::SqliteAccessionStore;
use kira_alphafold::alphafold::AlphaFoldHttpClient;
use kira_alphafold::app::{App, RunOptions};
use kira_alphafold::config::{ConfigLoader, RunConfig};
use kira_alphafold::domain::SourceId;
use kira_alphafold::error::AfError;
use kira_alphafold::output::{ConsoleOutput, JsonOutput, OutputMode};

#[derive(Parser)]
#[command(name = "kira-af")]
#[command(about = "Resolve UniProt accessions to AlphaFold DB entries and collect their PDB files")]
#[command(version, author)]
struct Cli {
    /// Run configuration (defaults to ./kira-af.json).
    #[arg(long, global = true)]
    config: Option<String>,

    /// Print one diagnostic line per identifier. With `--json` the lines go
    /// to the stderr log at info level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Print the run summary as JSON on stdout.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Look identifiers up in the accession database, then fetch structures")]
    Resolve(RunArgs),
    #[command(about = "Assume AF-<id>-F1 for every identifier and fetch what exists")]
    Guess(GuessArgs),
    #[command(about = "Fetch a single structure with a known AlphaFold id")]
    FetchOne(FetchOneArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Identifier CSV, overriding `input_csv` from the config.
    #[arg(long)]
    input: Option<String>,

    /// Replace an existing resolver table instead of refusing to run.
    #[arg(long)]
    overwrite: bool,
}

#[derive(Args)]
struct GuessArgs {
    /// Identifier CSV, overriding `input_csv` from the config.
    #[arg(long)]
    input: Option<String>,
}

#[derive(Args)]
struct FetchOneArgs {
    uniprot_id: String,

    /// AlphaFold DB id; defaults to AF-<uniprot_id>-F1.
    #[arg(long)]
    af_id: Option<String>,

    /// Model version; defaults to `guess_version` from the config.
    #[arg(long)]
    model_version: Option<u32>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<AfError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &AfError) -> u8 {
    match error {
        AfError::MissingConfig
        | AfError::ConfigRead(_)
        | AfError::ConfigParse(_)
        | AfError::InvalidConfig { .. }
        | AfError::OutputAlreadyExists(_)
        | AfError::InputRead { .. }
        | AfError::MissingColumn { .. }
        | AfError::InvalidSourceId(_) => 2,
        AfError::StoreUnavailable(_)
        | AfError::AlphaFoldHttp(_)
        | AfError::AlphaFoldStatus { .. }
        | AfError::FetchFailed { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, rust_log.as_deref()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Resolve(args) => {
            apply_input(&mut config, args.input.as_deref());
            let options = RunOptions {
                verbose: cli.verbose,
                overwrite: args.overwrite,
            };
            let store_config = config.require_store()?.clone();
            let app = build_app(config)?;
            let open_store = || SqliteAccessionStore::open(&store_config);
            let summary = match output_mode {
                OutputMode::Json => app.run_verified(open_store, options, &JsonOutput)?,
                OutputMode::Human => app.run_verified(open_store, options, &ConsoleOutput)?,
            };
            print_summary(output_mode, &summary)
        }
        Commands::Guess(args) => {
            apply_input(&mut config, args.input.as_deref());
            let options = RunOptions {
                verbose: cli.verbose,
                overwrite: false,
            };
            let app = build_app(config)?;
            let summary = match output_mode {
                OutputMode::Json => app.run_guess(options, &JsonOutput)?,
                OutputMode::Human => app.run_guess(options, &ConsoleOutput)?,
            };
            print_summary(output_mode, &summary)
        }
        Commands::FetchOne(args) => {
            let uniprot_id: SourceId = args.uniprot_id.parse()?;
            let af_id = args
                .af_id
                .unwrap_or_else(|| uniprot_id.guess_external_id());
            let version = args.model_version.unwrap_or(config.guess_version);
            let options = RunOptions {
                verbose: cli.verbose,
                overwrite: false,
            };
            let app = build_app(config)?;
            match output_mode {
                OutputMode::Json => {
                    let result = app.fetch_one(uniprot_id, &af_id, version, options, &JsonOutput)?;
                    JsonOutput::print_fetch_one(&result).into_diagnostic()
                }
                OutputMode::Human => {
                    let result =
                        app.fetch_one(uniprot_id, &af_id, version, options, &ConsoleOutput)?;
                    ConsoleOutput::print_fetch_one(&result);
                    Ok(())
                }
            }
        }
    }
}

/// `RUST_LOG` wins when set; otherwise `--verbose` lifts the log to info.
fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    match rust_log {
        Some(directives) => EnvFilter::new(directives),
        None if verbose => EnvFilter::new("info"),
        None => EnvFilter::new("error"),
    }
}

fn apply_input(config: &mut RunConfig, input: Option<&str>) {
    if let Some(input) = input {
        config.input_csv = Some(Utf8PathBuf::from(input));
    }
}

fn build_app(config: RunConfig) -> Result<App<AlphaFoldHttpClient>, AfError> {
    let client = AlphaFoldHttpClient::new(&config.remote_base_url, config.request_timeout)?;
    Ok(App::new(config, client))
}

fn print_summary(
    output_mode: OutputMode,
    summary: &kira_alphafold::app::RunSummary,
) -> miette::Result<()> {
    match output_mode {
        OutputMode::Json => JsonOutput::print_summary(summary).into_diagnostic(),
        OutputMode::Human => {
            ConsoleOutput::print_summary(summary);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::filter::LevelFilter;

    use super::*;

    #[test]
    fn verbose_lifts_default_log_level() {
        assert_eq!(log_filter(true, None).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(log_filter(false, None).max_level_hint(), Some(LevelFilter::ERROR));
    }

    #[test]
    fn rust_log_overrides_verbose() {
        assert_eq!(
            log_filter(true, Some("warn")).max_level_hint(),
            Some(LevelFilter::WARN)
        );
    }
}
