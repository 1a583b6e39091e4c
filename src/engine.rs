//! Batch Validation Engine
//!
//! Validates many files against one shared rule table:
//! - **Async I/O**: file discovery and reading
//! - **Blocking CPU work**: parsing and checking run on the blocking pool
//! - **Bounded concurrency**: a semaphore caps validations in flight
//!
//! Each file is an independent computation. The rule table is shared read-only
//! behind an `Arc`, so no locking is needed.

use futures::future::try_join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::document::{Document, ParseOptions};
use crate::dtd_parser::RuleTable;
use crate::error::{DtdError, Result};
use crate::file_discovery::FileDiscovery;
use crate::validator::Validator;

/// Engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Number of files validated at once
    pub max_concurrent_validations: usize,
    /// Timeout for a single file
    ///
    /// The file is reported as timed out, but a parse already running on the
    /// blocking pool is not cancelled and holds its thread until it finishes.
    pub validation_timeout: Duration,
    /// Skip remaining files once one fails
    pub fail_fast: bool,
    /// Limits applied when parsing each file
    pub parse_options: ParseOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_validations: num_cpus::get(),
            validation_timeout: Duration::from_secs(30),
            fail_fast: false,
            parse_options: ParseOptions::default(),
        }
    }
}

/// Status of a single file validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    /// No diagnostics
    Valid,
    /// One or more rule violations
    Invalid { error_count: usize },
    /// The file could not be read or is not well-formed
    Error { message: String },
    /// Not validated (fail-fast)
    Skipped { reason: String },
}

impl ValidationStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationStatus::Valid)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, ValidationStatus::Invalid { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ValidationStatus::Error { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ValidationStatus::Skipped { .. })
    }
}

/// Result of validating a single file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileValidationResult {
    pub path: PathBuf,
    pub status: ValidationStatus,
    pub duration: Duration,
    /// Diagnostics, or the error message for failed files
    pub errors: Vec<String>,
}

impl FileValidationResult {
    pub fn valid(path: PathBuf, duration: Duration) -> Self {
        Self {
            path,
            status: ValidationStatus::Valid,
            duration,
            errors: Vec::new(),
        }
    }

    pub fn invalid(path: PathBuf, errors: Vec<String>, duration: Duration) -> Self {
        Self {
            path,
            status: ValidationStatus::Invalid {
                error_count: errors.len(),
            },
            duration,
            errors,
        }
    }

    pub fn error(path: PathBuf, error: DtdError, duration: Duration) -> Self {
        Self {
            path,
            status: ValidationStatus::Error {
                message: error.to_string(),
            },
            duration,
            errors: vec![error.to_string()],
        }
    }

    pub fn skipped(path: PathBuf, reason: String, duration: Duration) -> Self {
        Self {
            path,
            status: ValidationStatus::Skipped {
                reason: reason.clone(),
            },
            duration,
            errors: vec![reason],
        }
    }
}

/// Progress update for validation
#[derive(Debug, Clone)]
pub struct ValidationProgress {
    pub current_file: Option<PathBuf>,
    pub completed: usize,
    pub total: usize,
    pub phase: ValidationPhase,
}

/// Phase of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationPhase {
    Discovery,
    Validation,
    Complete,
}

/// Progress callback type for validation updates
pub type ProgressCallback = Arc<dyn Fn(ValidationProgress) + Send + Sync>;

/// Aggregated results of validating multiple files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResults {
    pub total_files: usize,
    pub valid_files: usize,
    pub invalid_files: usize,
    pub error_files: usize,
    pub skipped_files: usize,
    /// Directory entries the walk could not read; their documents were never checked
    #[serde(default)]
    pub unreadable_entries: usize,
    /// Sum of per-file durations
    pub total_duration: Duration,
    pub average_duration: Duration,
    pub file_results: Vec<FileValidationResult>,
}

impl ValidationResults {
    /// Aggregate individual file results into a summary
    pub fn aggregate(file_results: Vec<FileValidationResult>) -> Self {
        let total_files = file_results.len();
        let mut valid_files = 0;
        let mut invalid_files = 0;
        let mut error_files = 0;
        let mut skipped_files = 0;
        let mut total_duration = Duration::ZERO;

        for result in &file_results {
            match result.status {
                ValidationStatus::Valid => valid_files += 1,
                ValidationStatus::Invalid { .. } => invalid_files += 1,
                ValidationStatus::Error { .. } => error_files += 1,
                ValidationStatus::Skipped { .. } => skipped_files += 1,
            }
            total_duration += result.duration;
        }

        let average_duration = if total_files > 0 {
            total_duration / total_files as u32
        } else {
            Duration::ZERO
        };

        Self {
            total_files,
            valid_files,
            invalid_files,
            error_files,
            skipped_files,
            unreadable_entries: 0,
            total_duration,
            average_duration,
            file_results,
        }
    }

    pub fn with_unreadable_entries(mut self, count: usize) -> Self {
        self.unreadable_entries = count;
        self
    }

    pub fn all_valid(&self) -> bool {
        self.valid_files == self.total_files
            && self.total_files > 0
            && self.unreadable_entries == 0
    }

    pub fn has_errors(&self) -> bool {
        self.error_files > 0 || self.invalid_files > 0 || self.unreadable_entries > 0
    }

    /// Total number of diagnostics across invalid files
    pub fn total_violations(&self) -> usize {
        self.file_results
            .iter()
            .filter(|r| r.status.is_invalid())
            .map(|r| r.errors.len())
            .sum()
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.valid_files as f64 / self.total_files as f64) * 100.0
        }
    }
}

/// Validates batches of files against one rule table
pub struct ValidationEngine {
    rules: Arc<RuleTable>,
    config: EngineConfig,
}

impl ValidationEngine {
    pub fn new(rules: Arc<RuleTable>, config: EngineConfig) -> Self {
        Self { rules, config }
    }

    /// Build an engine straight from DTD text
    pub fn from_dtd(dtd: &str, config: EngineConfig) -> Self {
        Self::new(Arc::new(RuleTable::parse(dtd)), config)
    }

    pub fn rules(&self) -> &Arc<RuleTable> {
        &self.rules
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate every matching file under a path (directory or file)
    pub async fn validate_path(
        &self,
        path: &Path,
        file_discovery: &FileDiscovery,
    ) -> Result<ValidationResults> {
        self.validate_path_with_progress(path, file_discovery, None)
            .await
    }

    pub async fn validate_path_with_progress(
        &self,
        path: &Path,
        file_discovery: &FileDiscovery,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<ValidationResults> {
        if let Some(ref callback) = progress_callback {
            callback(ValidationProgress {
                current_file: None,
                completed: 0,
                total: 0,
                phase: ValidationPhase::Discovery,
            });
        }

        let discovery = file_discovery.discover(path).await?;
        let results = self
            .validate_files_with_progress(discovery.files, progress_callback.clone())
            .await?;
        let results =
            ValidationResults::aggregate(results).with_unreadable_entries(discovery.unreadable);

        if let Some(ref callback) = progress_callback {
            callback(ValidationProgress {
                current_file: None,
                completed: results.total_files,
                total: results.total_files,
                phase: ValidationPhase::Complete,
            });
        }

        Ok(results)
    }

    pub async fn validate_files(&self, files: Vec<PathBuf>) -> Result<Vec<FileValidationResult>> {
        self.validate_files_with_progress(files, None).await
    }

    /// Validate files concurrently; results come back in input order
    pub async fn validate_files_with_progress(
        &self,
        files: Vec<PathBuf>,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<Vec<FileValidationResult>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let total_files = files.len();
        let completed = Arc::new(AtomicUsize::new(0));
        let stop = Arc::new(AtomicBool::new(false));
        let semaphore = Arc::new(tokio::sync::Semaphore::new(
            self.config.max_concurrent_validations.max(1),
        ));

        let tasks: Vec<_> = files
            .into_iter()
            .map(|file_path| {
                let rules = Arc::clone(&self.rules);
                let semaphore = Arc::clone(&semaphore);
                let completed = Arc::clone(&completed);
                let stop = Arc::clone(&stop);
                let progress_callback = progress_callback.clone();
                let timeout = self.config.validation_timeout;
                let fail_fast = self.config.fail_fast;
                let options = self.config.parse_options;

                tokio::spawn(async move {
                    let _permit = semaphore.acquire().await.map_err(|_| {
                        DtdError::Concurrency {
                            details: "Failed to acquire validation semaphore".to_string(),
                        }
                    })?;

                    let result = if fail_fast && stop.load(Ordering::SeqCst) {
                        FileValidationResult::skipped(
                            file_path.clone(),
                            "Skipped after an earlier failure (fail-fast)".to_string(),
                            Duration::ZERO,
                        )
                    } else {
                        match tokio::time::timeout(
                            timeout,
                            Self::validate_file_internal(file_path.clone(), rules, options),
                        )
                        .await
                        {
                            Ok(result) => result,
                            Err(_) => FileValidationResult::error(
                                file_path.clone(),
                                DtdError::Timeout {
                                    path: file_path.clone(),
                                    timeout_seconds: timeout.as_secs(),
                                },
                                timeout,
                            ),
                        }
                    };

                    if fail_fast && (result.status.is_invalid() || result.status.is_error()) {
                        stop.store(true, Ordering::SeqCst);
                    }

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(ref callback) = progress_callback {
                        callback(ValidationProgress {
                            current_file: Some(file_path),
                            completed: done,
                            total: total_files,
                            phase: ValidationPhase::Validation,
                        });
                    }

                    Ok::<FileValidationResult, DtdError>(result)
                })
            })
            .collect();

        let task_results = try_join_all(tasks)
            .await
            .map_err(|e| DtdError::Concurrency {
                details: format!("Task join error: {}", e),
            })?;

        task_results.into_iter().collect()
    }

    /// Validate one file
    pub async fn validate_single_file(&self, file_path: &Path) -> FileValidationResult {
        Self::validate_file_internal(
            file_path.to_path_buf(),
            Arc::clone(&self.rules),
            self.config.parse_options,
        )
        .await
    }

    async fn validate_file_internal(
        file_path: PathBuf,
        rules: Arc<RuleTable>,
        options: ParseOptions,
    ) -> FileValidationResult {
        let start_time = Instant::now();

        let text = match tokio::fs::read_to_string(&file_path).await {
            Ok(text) => text,
            Err(e) => return FileValidationResult::error(file_path, e.into(), start_time.elapsed()),
        };

        // Parsing and checking are CPU-bound; keep them off the async workers
        let checked = tokio::task::spawn_blocking(move || {
            Document::parse_with(&text, &options)
                .map(|document| Validator::new(&rules).validate(&document))
        })
        .await;

        let duration = start_time.elapsed();
        match checked {
            Ok(Ok(report)) if report.valid => FileValidationResult::valid(file_path, duration),
            Ok(Ok(report)) => FileValidationResult::invalid(file_path, report.errors, duration),
            Ok(Err(e)) => FileValidationResult::error(file_path, e, duration),
            Err(e) => FileValidationResult::error(
                file_path,
                DtdError::Concurrency {
                    details: format!("Join error: {}", e),
                },
                duration,
            ),
        }
    }
}
