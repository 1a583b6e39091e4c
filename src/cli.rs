use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::inferrer::InferenceMode;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show critical errors
    Quiet,
    /// Show standard information
    #[default]
    Normal,
    /// Show detailed information
    Verbose,
    /// Show all available debugging information
    Debug,
}

impl VerbosityLevel {
    /// `quiet` wins; a repeated `-v` selects `Debug`
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => VerbosityLevel::Quiet,
            (false, 0) => VerbosityLevel::Normal,
            (false, 1) => VerbosityLevel::Verbose,
            (false, _) => VerbosityLevel::Debug,
        }
    }
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Readable text, coloured on a terminal
    #[default]
    Human,
    /// Machine-readable JSON
    Json,
    /// Counts only
    Summary,
}

/// Infer DTDs from example XML and validate XML against DTDs
#[derive(Parser, Debug, Clone)]
#[command(name = "dtd-infer")]
#[command(about = "Infer a DTD from example XML documents and validate documents against a DTD")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long = "format", value_enum, global = true)]
    pub format: Option<OutputFormat>,

    /// Verbose output; repeat for debug detail
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Maximum element nesting depth accepted by the parser
    #[arg(long = "max-depth", global = true)]
    pub max_depth: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Infer a DTD from one or more example documents
    Infer(InferArgs),
    /// Validate a file or every matching file under a directory
    Validate(ValidateArgs),
    /// Check that documents are well-formed
    Check(CheckArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InferArgs {
    /// Example documents
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Content-model rendering policy
    #[arg(short = 'm', long = "mode", value_enum)]
    pub mode: Option<InferenceMode>,

    /// Write the DTD here instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// File or directory to validate
    pub path: PathBuf,

    /// DTD to validate against
    #[arg(long = "dtd")]
    pub dtd: PathBuf,

    /// File extensions to process (comma-separated)
    #[arg(
        short = 'e',
        long = "extensions",
        help = "File extensions to process (e.g., 'xml,svg')"
    )]
    pub extensions: Option<String>,

    /// Include file patterns (glob syntax)
    #[arg(long = "include", action = clap::ArgAction::Append)]
    pub include_patterns: Vec<String>,

    /// Exclude file patterns (glob syntax)
    #[arg(long = "exclude", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Number of concurrent validations
    #[arg(short = 't', long = "threads")]
    pub threads: Option<usize>,

    /// Stop after the first failing file
    #[arg(long = "fail-fast")]
    pub fail_fast: bool,

    /// Per-file timeout in seconds
    #[arg(long = "timeout")]
    pub timeout: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Documents to check
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        VerbosityLevel::from_flags(self.verbose, self.quiet)
    }
}

impl ValidateArgs {
    pub fn get_extensions(&self) -> Option<Vec<String>> {
        self.extensions.as_ref().map(|extensions| {
            extensions
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
    }
}
