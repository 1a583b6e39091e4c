use crate::cli::{Cli, Command, OutputFormat, VerbosityLevel};
use crate::document::{DEFAULT_MAX_DEPTH, ParseOptions};
use crate::engine::EngineConfig;
use crate::inferrer::InferenceMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Trait for abstracting environment variable access
#[cfg_attr(test, mockall::automock)]
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub inference: InferenceConfig,
    pub parsing: ParsingConfig,
    pub validation: ValidationConfig,
    pub output: OutputConfig,
    pub files: FileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct InferenceConfig {
    pub mode: InferenceMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParsingConfig {
    /// Deepest element nesting accepted before a document is rejected
    pub max_depth: usize,
}

/// Batch validation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Concurrent validations (None = one per CPU)
    pub threads: Option<usize>,
    /// Stop validation on first failing file
    pub fail_fast: bool,
    /// Per-file timeout
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub verbose: bool,
    /// Quiet mode (errors only)
    pub quiet: bool,
}

/// Which files a directory validation picks up
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub extensions: Vec<String>,
    /// Include patterns (glob syntax)
    pub include_patterns: Vec<String>,
    /// Exclude patterns (glob syntax)
    pub exclude_patterns: Vec<String>,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            threads: None,
            fail_fast: false,
            timeout_seconds: 30,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["xml".to_string()],
            include_patterns: vec![],
            exclude_patterns: vec![],
        }
    }
}

impl Config {
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            max_depth: self.parsing.max_depth,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_concurrent_validations: ConfigManager::get_thread_count(self),
            validation_timeout: ConfigManager::get_timeout_duration(self),
            fail_fast: self.validation.fail_fast,
            parse_options: self.parse_options(),
        }
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.output.quiet {
            VerbosityLevel::Quiet
        } else if self.output.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

const CONFIG_FILE_NAMES: [&str; 4] = [
    "dtd-infer.toml",
    "dtd-infer.json",
    ".dtd-infer.toml",
    ".dtd-infer.json",
];

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        Self::load_config_with(&SystemEnvProvider, cli).await
    }

    pub async fn load_config_with(env: &impl EnvProvider, cli: &Cli) -> Result<Config> {
        let mut config = Config::default();

        let file_config = match &cli.config {
            Some(config_path) => Some(Self::load_from_file(config_path).await?),
            None => Self::find_config_file().await?,
        };
        if let Some(file_config) = file_config {
            config = Self::merge_configs(config, file_config);
        }

        config = Self::apply_environment_overrides_with(env, config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => match toml::from_str::<Config>(&content) {
                Ok(config) => Ok(config),
                Err(_) => Ok(serde_json::from_str(&content)?),
            },
        }
    }

    /// First config file found in the working directory, then the user config directory
    pub async fn find_config_file() -> Result<Option<Config>> {
        let mut candidates: Vec<PathBuf> = CONFIG_FILE_NAMES.iter().map(PathBuf::from).collect();
        if let Some(config_dir) = dirs::config_dir() {
            let app_dir = config_dir.join("dtd-infer");
            candidates.extend(CONFIG_FILE_NAMES.iter().map(|name| app_dir.join(name)));
        }

        for path in candidates {
            if path.is_file() {
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }
        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(mode) = env.get("DTD_INFER_MODE") {
            config.inference.mode = InferenceMode::from_str(&mode).map_err(|_| {
                ConfigError::Environment(format!("Invalid DTD_INFER_MODE value: {}", mode))
            })?;
        }

        if let Some(depth) = env.get("DTD_INFER_MAX_DEPTH") {
            config.parsing.max_depth = parse_env("DTD_INFER_MAX_DEPTH", &depth)?;
        }

        if let Some(threads) = env.get("DTD_INFER_THREADS") {
            config.validation.threads = Some(parse_env("DTD_INFER_THREADS", &threads)?);
        }

        if let Some(fail_fast) = env.get("DTD_INFER_FAIL_FAST") {
            config.validation.fail_fast = parse_env("DTD_INFER_FAIL_FAST", &fail_fast)?;
        }

        if let Some(timeout) = env.get("DTD_INFER_TIMEOUT") {
            config.validation.timeout_seconds = parse_env("DTD_INFER_TIMEOUT", &timeout)?;
        }

        if let Some(format) = env.get("DTD_INFER_FORMAT") {
            config.output.format = match format.to_lowercase().as_str() {
                "human" => OutputFormat::Human,
                "json" => OutputFormat::Json,
                "summary" => OutputFormat::Summary,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid DTD_INFER_FORMAT value: {}",
                        format
                    )));
                }
            };
        }

        if let Some(verbose) = env.get("DTD_INFER_VERBOSE") {
            config.output.verbose = parse_env("DTD_INFER_VERBOSE", &verbose)?;
        }

        if let Some(quiet) = env.get("DTD_INFER_QUIET") {
            config.output.quiet = parse_env("DTD_INFER_QUIET", &quiet)?;
        }

        if let Some(extensions) = env.get("DTD_INFER_EXTENSIONS") {
            config.files.extensions = split_list(&extensions);
        }

        Ok(config)
    }

    /// Overlay flags the user actually passed; absent flags leave the config alone
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if let Some(format) = cli.format {
            config.output.format = format;
        }
        if cli.verbose > 0 {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
        }
        if let Some(max_depth) = cli.max_depth {
            config.parsing.max_depth = max_depth;
        }

        match &cli.command {
            Command::Infer(args) => {
                if let Some(mode) = args.mode {
                    config.inference.mode = mode;
                }
            }
            Command::Validate(args) => {
                if args.threads.is_some() {
                    config.validation.threads = args.threads;
                }
                if args.fail_fast {
                    config.validation.fail_fast = true;
                }
                if let Some(timeout) = args.timeout {
                    config.validation.timeout_seconds = timeout;
                }
                if let Some(extensions) = args.get_extensions() {
                    config.files.extensions = extensions;
                }
                if !args.include_patterns.is_empty() {
                    config.files.include_patterns = args.include_patterns.clone();
                }
                if !args.exclude_patterns.is_empty() {
                    config.files.exclude_patterns = args.exclude_patterns.clone();
                }
            }
            Command::Check(_) => {}
        }

        config
    }

    /// Merge two configurations (second takes precedence; empty lists do not override)
    pub fn merge_configs(mut base: Config, override_config: Config) -> Config {
        base.inference = override_config.inference;
        base.parsing = override_config.parsing;

        if override_config.validation.threads.is_some() {
            base.validation.threads = override_config.validation.threads;
        }
        base.validation.fail_fast = override_config.validation.fail_fast;
        base.validation.timeout_seconds = override_config.validation.timeout_seconds;

        base.output = override_config.output;

        if !override_config.files.extensions.is_empty() {
            base.files.extensions = override_config.files.extensions;
        }
        if !override_config.files.include_patterns.is_empty() {
            base.files.include_patterns = override_config.files.include_patterns;
        }
        if !override_config.files.exclude_patterns.is_empty() {
            base.files.exclude_patterns = override_config.files.exclude_patterns;
        }

        base
    }

    pub fn validate_config(config: &Config) -> Result<()> {
        if let Some(threads) = config.validation.threads {
            if threads == 0 {
                return Err(ConfigError::Validation(
                    "Number of threads must be greater than 0".to_string(),
                ));
            }
            if threads > 1000 {
                return Err(ConfigError::Validation(
                    "Number of threads cannot exceed 1000".to_string(),
                ));
            }
        }

        if config.parsing.max_depth == 0 {
            return Err(ConfigError::Validation(
                "Maximum nesting depth must be greater than 0".to_string(),
            ));
        }

        if config.validation.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        if config.files.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "At least one file extension must be specified".to_string(),
            ));
        }

        for ext in &config.files.extensions {
            if ext.contains('/') || ext.contains('\\') || ext.contains('.') {
                return Err(ConfigError::Validation(format!(
                    "Invalid file extension: {}",
                    ext
                )));
            }
        }

        Ok(())
    }

    pub fn get_thread_count(config: &Config) -> usize {
        config.validation.threads.unwrap_or_else(num_cpus::get)
    }

    pub fn get_timeout_duration(config: &Config) -> Duration {
        Duration::from_secs(config.validation.timeout_seconds)
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, value)))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
