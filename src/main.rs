use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::try_join_all;
use rayon::prelude::*;

use dtd_infer::cli::{CheckArgs, Cli, Command, InferArgs, ValidateArgs, VerbosityLevel};
use dtd_infer::config::{Config, ConfigError, ConfigManager};
use dtd_infer::document::{Document, check_input};
use dtd_infer::dtd_parser::RuleTable;
use dtd_infer::engine::{ProgressCallback, ValidationEngine, ValidationProgress};
use dtd_infer::error::DtdError;
use dtd_infer::error_reporter::ErrorReporter;
use dtd_infer::file_discovery::FileDiscovery;
use dtd_infer::inferrer::Inferrer;
use dtd_infer::output::Output;

const EXIT_SUCCESS: u8 = 0;
const EXIT_VIOLATIONS: u8 = 1;
const EXIT_FAILURE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let config = match ConfigManager::load_config(&cli).await {
        Ok(config) => config,
        Err(e) => {
            ErrorReporter::new(cli.verbosity()).report_config_error(&e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    // A repeated -v is the only way to reach debug output
    let verbosity = if cli.verbosity() == VerbosityLevel::Debug {
        VerbosityLevel::Debug
    } else {
        config.verbosity()
    };
    let reporter = ErrorReporter::with_timestamps(verbosity, verbosity == VerbosityLevel::Debug);
    let output = Output::new(config.output.format, verbosity);

    let outcome = match &cli.command {
        Command::Infer(args) => run_infer(args, &config).await,
        Command::Validate(args) => run_validate(args, &config, &reporter, &output).await,
        Command::Check(args) => run_check(args, &output).await,
    };

    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            report_failure(&reporter, &e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn report_failure(reporter: &ErrorReporter, error: &anyhow::Error) {
    if let Some(dtd_error) = error.downcast_ref::<DtdError>() {
        if reporter.verbosity() != VerbosityLevel::Quiet {
            // The context line names the file the error belongs to
            eprintln!("{}", error);
        }
        reporter.report_error(dtd_error);
    } else if let Some(config_error) = error.downcast_ref::<ConfigError>() {
        reporter.report_config_error(config_error);
    } else {
        eprintln!("Error: {:#}", error);
    }
}

async fn read_all(paths: &[PathBuf]) -> Result<Vec<String>> {
    try_join_all(paths.iter().map(|path| async move {
        tokio::fs::read_to_string(path)
            .await
            .map_err(DtdError::from)
            .with_context(|| format!("Failed to read {}", path.display()))
    }))
    .await
}

async fn run_infer(args: &InferArgs, config: &Config) -> Result<u8> {
    let texts = read_all(&args.files).await?;
    let options = config.parse_options();
    let files = args.files.clone();

    // Parsing is CPU-bound; examples are parsed in parallel and folded in order
    let documents = tokio::task::spawn_blocking(move || {
        texts
            .par_iter()
            .zip(files.par_iter())
            .map(|(text, path)| {
                Document::parse_with(text, &options)
                    .with_context(|| format!("Cannot infer from {}", path.display()))
            })
            .collect::<Result<Vec<Document>>>()
    })
    .await
    .context("Parsing task failed")??;

    let dtd = Inferrer::new(config.inference.mode).infer_all(&documents)?;

    match &args.output {
        Some(path) => tokio::fs::write(path, &dtd)
            .await
            .map_err(DtdError::from)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => print!("{}", dtd),
    }
    Ok(EXIT_SUCCESS)
}

async fn run_validate(
    args: &ValidateArgs,
    config: &Config,
    reporter: &ErrorReporter,
    output: &Output,
) -> Result<u8> {
    let dtd = tokio::fs::read_to_string(&args.dtd)
        .await
        .map_err(DtdError::from)
        .with_context(|| format!("Failed to read DTD {}", args.dtd.display()))?;
    let rules = Arc::new(RuleTable::parse(&dtd));

    let discovery = FileDiscovery::new()
        .with_extensions(config.files.extensions.clone())
        .with_include_patterns(config.files.include_patterns.clone())?
        .with_exclude_patterns(config.files.exclude_patterns.clone())?;

    let engine = ValidationEngine::new(rules, config.engine_config());
    let progress =
        show_progress(reporter.verbosity()).then(|| progress_callback(reporter.verbosity()));

    let results = engine
        .validate_path_with_progress(&args.path, &discovery, progress)
        .await
        .with_context(|| format!("Cannot validate {}", args.path.display()))?;

    print!("{}", output.format_results(&results)?);

    Ok(if results.error_files > 0 || results.unreadable_entries > 0 {
        EXIT_FAILURE
    } else if results.invalid_files > 0 {
        EXIT_VIOLATIONS
    } else {
        EXIT_SUCCESS
    })
}

async fn run_check(args: &CheckArgs, output: &Output) -> Result<u8> {
    let texts = read_all(&args.files).await?;
    let checks: Vec<_> = args
        .files
        .iter()
        .cloned()
        .zip(texts.iter().map(|text| check_input(text)))
        .collect();

    print!("{}", output.format_checks(&checks)?);

    let all_valid = checks.iter().all(|(_, check)| check.is_valid);
    Ok(if all_valid {
        EXIT_SUCCESS
    } else {
        EXIT_VIOLATIONS
    })
}

fn show_progress(verbosity: VerbosityLevel) -> bool {
    verbosity != VerbosityLevel::Quiet && atty::is(atty::Stream::Stderr)
}

fn progress_callback(verbosity: VerbosityLevel) -> ProgressCallback {
    let reporter = ErrorReporter::new(verbosity);
    Arc::new(move |progress: ValidationProgress| reporter.report_progress(&progress))
}
