//! Result formatting for stdout
//!
//! Human output is coloured when stdout is a terminal. JSON output is stable
//! enough to script against: durations are whole milliseconds and statuses are
//! lowercase strings.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{OutputFormat, VerbosityLevel};
use crate::document::InputCheck;
use crate::engine::{FileValidationResult, ValidationResults, ValidationStatus};
use crate::error::Result;

pub struct Output {
    format: OutputFormat,
    verbosity: VerbosityLevel,
    show_colors: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbosity: VerbosityLevel) -> Self {
        Self {
            format,
            verbosity,
            show_colors: format == OutputFormat::Human && atty::is(atty::Stream::Stdout),
        }
    }

    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    pub fn format_results(&self, results: &ValidationResults) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&JsonResults::from(results))?),
            OutputFormat::Summary => Ok(format!("{}\n", self.format_summary_line(results))),
            OutputFormat::Human => Ok(self.format_human(results)),
        }
    }

    fn format_human(&self, results: &ValidationResults) -> String {
        let mut output = String::new();

        if self.verbosity == VerbosityLevel::Quiet {
            for file_result in &results.file_results {
                if file_result.status.is_invalid() || file_result.status.is_error() {
                    output.push_str(&self.format_file_result(file_result));
                    output.push('\n');
                }
            }
            output.push_str(&self.format_unreadable(results));
            return output;
        }

        for file_result in &results.file_results {
            if !file_result.status.is_valid() || self.verbosity >= VerbosityLevel::Verbose {
                output.push_str(&self.format_file_result(file_result));
                output.push('\n');
            }
        }
        output.push_str(&self.format_unreadable(results));

        if results.total_files > 1 || self.verbosity >= VerbosityLevel::Verbose {
            output.push_str(&self.format_summary(results));
        } else if results.all_valid() {
            output.push_str(&format!("{}\n", self.colorize("Valid.", "32")));
        } else if results.total_files == 0 {
            output.push_str("No files to validate.\n");
        }

        output
    }

    fn format_unreadable(&self, results: &ValidationResults) -> String {
        let label = self.colorize("⚠ ERROR", "33");
        match results.unreadable_entries {
            0 => String::new(),
            1 => format!("{}  1 entry could not be read\n", label),
            n => format!("{}  {} entries could not be read\n", label, n),
        }
    }

    pub fn format_file_result(&self, result: &FileValidationResult) -> String {
        let path_display = result.path.display();
        let duration_str = format_duration(result.duration);

        match &result.status {
            ValidationStatus::Valid => format!(
                "{}  {} ({})",
                self.colorize("✓ VALID", "32"),
                path_display,
                duration_str
            ),
            ValidationStatus::Invalid { error_count } => {
                let mut output = format!(
                    "{}  {} ({}) - {} error{}",
                    self.colorize("✗ INVALID", "31"),
                    path_display,
                    duration_str,
                    error_count,
                    if *error_count == 1 { "" } else { "s" }
                );
                for diagnostic in &result.errors {
                    output.push_str(&format!("\n    {}", diagnostic));
                }
                output
            }
            ValidationStatus::Error { message } => format!(
                "{}  {} ({}) - {}",
                self.colorize("⚠ ERROR", "33"),
                path_display,
                duration_str,
                message
            ),
            ValidationStatus::Skipped { reason } => format!(
                "{}  {} - {}",
                self.colorize("- SKIPPED", "36"),
                path_display,
                reason
            ),
        }
    }

    fn format_summary(&self, results: &ValidationResults) -> String {
        let mut output = String::new();
        output.push_str("Validation Summary:\n");
        output.push_str(&format!("  Total files: {}\n", results.total_files));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Valid:", "32"),
            results.valid_files
        ));

        if results.invalid_files > 0 {
            output.push_str(&format!(
                "  {} {} ({} diagnostics)\n",
                self.colorize("Invalid:", "31"),
                results.invalid_files,
                results.total_violations()
            ));
        }
        if results.error_files > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Errors:", "33"),
                results.error_files
            ));
        }
        if results.skipped_files > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Skipped:", "36"),
                results.skipped_files
            ));
        }
        if results.unreadable_entries > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Unreadable:", "33"),
                results.unreadable_entries
            ));
        }

        output.push_str(&format!("  Success rate: {:.1}%\n", results.success_rate()));
        if self.verbosity >= VerbosityLevel::Verbose {
            output.push_str(&format!(
                "  Duration: {} (average {})\n",
                format_duration(results.total_duration),
                format_duration(results.average_duration)
            ));
        }

        output
    }

    fn format_summary_line(&self, results: &ValidationResults) -> String {
        let mut line = format!(
            "{} files: {} valid, {} invalid, {} errors, {} skipped",
            results.total_files,
            results.valid_files,
            results.invalid_files,
            results.error_files,
            results.skipped_files
        );
        if results.unreadable_entries > 0 {
            line.push_str(&format!(", {} unreadable", results.unreadable_entries));
        }
        line
    }

    /// Well-formedness check results, one entry per file
    pub fn format_checks(&self, checks: &[(PathBuf, InputCheck)]) -> Result<String> {
        if self.format == OutputFormat::Json {
            let entries: Vec<JsonCheck<'_>> = checks
                .iter()
                .map(|(path, check)| JsonCheck { path, check })
                .collect();
            return Ok(serde_json::to_string_pretty(&entries)?);
        }

        let passed = checks.iter().filter(|(_, check)| check.is_valid).count();
        let mut output = String::new();

        if self.format == OutputFormat::Human {
            for (path, check) in checks {
                if check.is_valid && self.verbosity == VerbosityLevel::Quiet {
                    continue;
                }
                let label = if check.is_valid {
                    self.colorize("✓", "32")
                } else {
                    self.colorize("✗", "31")
                };
                output.push_str(&format!("{} {}: {}\n", label, path.display(), check.message));
            }
        }

        if self.format == OutputFormat::Summary || checks.len() > 1 {
            output.push_str(&format!(
                "{} of {} files are well-formed\n",
                passed,
                checks.len()
            ));
        }

        Ok(output)
    }
}

#[derive(Serialize)]
struct JsonResults<'a> {
    total_files: usize,
    valid_files: usize,
    invalid_files: usize,
    error_files: usize,
    skipped_files: usize,
    unreadable_entries: usize,
    total_duration_ms: u128,
    files: Vec<JsonFileResult<'a>>,
}

#[derive(Serialize)]
struct JsonFileResult<'a> {
    path: &'a Path,
    status: &'static str,
    duration_ms: u128,
    errors: &'a [String],
}

#[derive(Serialize)]
struct JsonCheck<'a> {
    path: &'a Path,
    #[serde(flatten)]
    check: &'a InputCheck,
}

impl<'a> From<&'a ValidationResults> for JsonResults<'a> {
    fn from(results: &'a ValidationResults) -> Self {
        Self {
            total_files: results.total_files,
            valid_files: results.valid_files,
            invalid_files: results.invalid_files,
            error_files: results.error_files,
            skipped_files: results.skipped_files,
            unreadable_entries: results.unreadable_entries,
            total_duration_ms: results.total_duration.as_millis(),
            files: results
                .file_results
                .iter()
                .map(|result| JsonFileResult {
                    path: &result.path,
                    status: status_name(&result.status),
                    duration_ms: result.duration.as_millis(),
                    errors: &result.errors,
                })
                .collect(),
        }
    }
}

fn status_name(status: &ValidationStatus) -> &'static str {
    match status {
        ValidationStatus::Valid => "valid",
        ValidationStatus::Invalid { .. } => "invalid",
        ValidationStatus::Error { .. } => "error",
        ValidationStatus::Skipped { .. } => "skipped",
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}
