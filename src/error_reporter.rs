use crate::cli::VerbosityLevel;
use crate::config::ConfigError;
use crate::engine::{ValidationPhase, ValidationProgress};
use crate::error::DtdError;

/// Writes failures and progress to stderr at a configurable verbosity
pub struct ErrorReporter {
    verbosity: VerbosityLevel,
    show_timestamps: bool,
}

impl ErrorReporter {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_timestamps: false,
        }
    }

    pub fn with_timestamps(verbosity: VerbosityLevel, show_timestamps: bool) -> Self {
        Self {
            verbosity,
            show_timestamps,
        }
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        self.verbosity
    }

    /// Report a library error; quiet mode only shows critical ones
    pub fn report_error(&self, error: &DtdError) {
        if let Some(message) = self.format_error(error) {
            eprintln!("{}", message);
        }
    }

    pub fn report_config_error(&self, error: &ConfigError) {
        eprintln!("{}", self.format_config_error(error));
    }

    /// Report one progress update of a batch run
    pub fn report_progress(&self, progress: &ValidationProgress) {
        if let Some(line) = self.format_progress(progress) {
            eprint!("{}", line);
            if progress.phase == ValidationPhase::Complete {
                eprintln!();
            }
        }
    }

    pub fn format_error(&self, error: &DtdError) -> Option<String> {
        match self.verbosity {
            VerbosityLevel::Quiet => self
                .is_critical_error(error)
                .then(|| format!("ERROR: {}", error)),
            VerbosityLevel::Normal => Some(self.format_error_normal(error)),
            VerbosityLevel::Verbose => Some(self.format_error_verbose(error)),
            VerbosityLevel::Debug => Some(self.format_error_debug(error)),
        }
    }

    pub fn format_config_error(&self, error: &ConfigError) -> String {
        match self.verbosity {
            VerbosityLevel::Quiet => format!("Config error: {}", error),
            VerbosityLevel::Normal | VerbosityLevel::Verbose => {
                format!("Configuration Error: {}\n{}", error, config_help(error))
            }
            VerbosityLevel::Debug => format!(
                "Configuration Error: {}\nDebug: {:?}\n{}",
                error,
                error,
                config_help(error)
            ),
        }
    }

    pub fn format_progress(&self, progress: &ValidationProgress) -> Option<String> {
        if self.verbosity == VerbosityLevel::Quiet {
            return None;
        }
        match progress.phase {
            ValidationPhase::Discovery => return None,
            // Only terminates the progress line
            ValidationPhase::Complete => return (progress.total > 0).then(String::new),
            ValidationPhase::Validation => {}
        }

        let percentage = if progress.total == 0 {
            100
        } else {
            (progress.completed as f64 / progress.total as f64 * 100.0) as u32
        };

        let mut line = format!(
            "\rProgress: {}/{} ({}%)",
            progress.completed, progress.total, percentage
        );
        if self.verbosity >= VerbosityLevel::Verbose
            && let Some(file) = &progress.current_file
        {
            line.push_str(&format!(" - {}", file.display()));
        }
        Some(line)
    }

    /// Failures of the environment rather than of one input document
    fn is_critical_error(&self, error: &DtdError) -> bool {
        matches!(
            error,
            DtdError::Config(_)
                | DtdError::Io(_)
                | DtdError::FileSystemTraversal { .. }
                | DtdError::Concurrency { .. }
        )
    }

    fn format_error_normal(&self, error: &DtdError) -> String {
        let timestamp = if self.show_timestamps {
            format!("[{}] ", chrono::Local::now().format("%H:%M:%S"))
        } else {
            String::new()
        };

        format!("{}{}", timestamp, error)
    }

    fn format_error_verbose(&self, error: &DtdError) -> String {
        let mut output = self.format_error_normal(error);

        match error {
            DtdError::InvalidInput { .. } => {
                output.push_str("\nSuggestion: Check that every element is closed and the document has a single root");
            }
            DtdError::InvalidMode { .. } => {
                output.push_str("\nSuggestion: Use --mode normal or --mode strict");
            }
            DtdError::DepthLimitExceeded { .. } => {
                output.push_str("\nSuggestion: Raise the limit with --max-depth if the nesting is intended");
            }
            DtdError::Timeout { .. } => {
                output.push_str("\nSuggestion: Increase --timeout for very large documents");
            }
            DtdError::FileSystemTraversal { path, .. } => {
                output.push_str(&format!(
                    "\nSuggestion: Check that {} exists and is readable",
                    path.display()
                ));
            }
            _ => {}
        }

        output
    }

    fn format_error_debug(&self, error: &DtdError) -> String {
        let mut output = self.format_error_verbose(error);
        output.push_str(&format!("\nDebug Info: {:?}", error));

        output.push_str("\nError Chain:");
        let mut current_error: &dyn std::error::Error = error;
        let mut level = 0;
        while let Some(source) = current_error.source() {
            output.push_str(&format!("\n  {}: {}", level + 1, source));
            current_error = source;
            level += 1;
        }

        output
    }
}

fn config_help(error: &ConfigError) -> &'static str {
    match error {
        ConfigError::Io(_) => "Check that the configuration file exists and is readable",
        ConfigError::TomlParsing(_) | ConfigError::JsonParsing(_) => {
            "Check the configuration file syntax (TOML/JSON format expected)"
        }
        ConfigError::Validation(_) => "Fix the offending value where it is set",
        ConfigError::Environment(_) => "Fix or unset the offending DTD_INFER_* variable",
        ConfigError::UnsupportedFormat(_) => "Use a .toml or .json configuration file",
    }
}
