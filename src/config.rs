//! Configuration management for cdpipe
//!
//! Two layers of configuration exist:
//!
//! - [`AppConfig`]: process settings loaded from environment variables with
//!   defaults (where the definitions live, log level, output format)
//! - [`PipelinesFile`]: the pipeline definitions themselves, loaded from YAML or
//!   TOML. Its `defaults` section carries values shared by every pipeline
//!   (credential reference, notification target, build image, environments),
//!   which are injected into each pipeline's settings unless it overrides them.
//!
//! # Environment Variables
//!
//! - `CDPIPE_CONFIG`: pipeline definitions file - default: "pipelines.yaml"
//! - `CDPIPE_LOG_LEVEL`: logging level - default: "info"
//! - `CDPIPE_LOG_JSON`: JSON log output (true|false) - default: "false"
//! - `CDPIPE_OUTPUT_FORMAT`: json|yaml|yml|human - default: "human"
//!
//! # Example
//!
//! ```no_run
//! use cdpipe::config::{AppConfig, PipelinesFile};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! config.validate()?;
//!
//! let file = PipelinesFile::load(&config.config_path)?;
//! for settings in file.resolve_all()? {
//!     println!("{}", settings.name);
//! }
//! # Ok(())
//! # }
//! ```

use crate::cli::output::OutputFormat;
use crate::topology::settings::{CredentialRef, PipelineSettings};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const DEFAULT_CONFIG_PATH: &str = "pipelines.yaml";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_OUTPUT_FORMAT: &str = "human";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// Definitions file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Definitions file could not be parsed
    #[error("Failed to parse {path}: {error}")]
    Parse { path: PathBuf, error: String },

    /// Extension is neither YAML nor TOML
    #[error("Unsupported definitions format for {0}. Use .yaml, .yml or .toml")]
    UnsupportedFormat(PathBuf),

    /// Two pipelines share a name
    #[error("Pipeline '{0}' is defined more than once")]
    DuplicatePipeline(String),

    /// Requested pipeline is not defined
    #[error("Unknown pipeline '{name}'. Defined pipelines: {available}")]
    UnknownPipeline { name: String, available: String },
}

/// Process-level settings
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Pipeline definitions file
    pub config_path: PathBuf,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Emit logs as JSON
    pub log_json: bool,

    /// Default output format (json, yaml, human)
    pub output_format: String,
}

impl Default for AppConfig {
    /// Loads `CDPIPE_*` environment variables, falling back to defaults
    fn default() -> Self {
        let config_path = env::var("CDPIPE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let log_level = env::var("CDPIPE_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        let log_json = env::var("CDPIPE_LOG_JSON")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        let output_format = env::var("CDPIPE_OUTPUT_FORMAT")
            .unwrap_or_else(|_| DEFAULT_OUTPUT_FORMAT.to_string())
            .to_lowercase();

        Self {
            config_path,
            log_level,
            log_json,
            output_format,
        }
    }
}

impl AppConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unknown log levels or output formats
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        if OutputFormat::parse(&self.output_format).is_none() {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid output format: {}. Valid options: json, yaml, yml, human",
                self.output_format
            )));
        }

        if self.config_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Definitions path cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl fmt::Display for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "cdpipe Configuration:")?;
        writeln!(f, "  Definitions: {}", self.config_path.display())?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        writeln!(f, "  Log JSON: {}", self.log_json)?;
        writeln!(f, "  Output Format: {}", self.output_format)?;
        Ok(())
    }
}

/// Values injected into every pipeline unless the pipeline sets its own
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedSettings {
    #[serde(default)]
    pub credential: Option<CredentialRef>,
    #[serde(default)]
    pub notification_target: Option<String>,
    #[serde(default)]
    pub build_image: Option<String>,
    #[serde(default)]
    pub environments: Option<Vec<String>>,
}

impl SharedSettings {
    /// Fills the gaps in `settings` from these shared values
    pub fn apply(&self, mut settings: PipelineSettings) -> PipelineSettings {
        if settings.source.credential.is_none() {
            settings.source.credential = self.credential.clone();
        }
        if settings.notification_target.is_none() {
            settings.notification_target = self.notification_target.clone();
        }
        if settings.build.build_image.is_none() {
            settings.build.build_image = self.build_image.clone();
        }
        if settings.environments.is_none() {
            settings.environments = self.environments.clone();
        }
        settings
    }
}

/// A pipeline definitions file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelinesFile {
    #[serde(default)]
    pub defaults: SharedSettings,
    #[serde(default)]
    pub pipelines: Vec<PipelineSettings>,
}

impl PipelinesFile {
    /// Loads definitions, choosing the parser by file extension
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        let file = match extension.as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            Some("toml") => Self::from_toml(&content),
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
        .map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })?;

        debug!(
            path = %path.display(),
            pipelines = file.pipelines.len(),
            "Loaded pipeline definitions"
        );
        Ok(file)
    }

    pub fn from_yaml(content: &str) -> Result<Self, String> {
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    pub fn names(&self) -> Vec<&str> {
        self.pipelines.iter().map(|p| p.name.as_str()).collect()
    }

    /// Every pipeline with shared defaults applied
    pub fn resolve_all(&self) -> Result<Vec<PipelineSettings>, ConfigError> {
        let mut seen = HashSet::new();
        for pipeline in &self.pipelines {
            if !seen.insert(pipeline.name.as_str()) {
                return Err(ConfigError::DuplicatePipeline(pipeline.name.clone()));
            }
        }
        Ok(self
            .pipelines
            .iter()
            .cloned()
            .map(|p| self.defaults.apply(p))
            .collect())
    }

    /// One pipeline by name, with shared defaults applied
    pub fn resolve(&self, name: &str) -> Result<PipelineSettings, ConfigError> {
        self.resolve_all()?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ConfigError::UnknownPipeline {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::settings::Variant;
    use serial_test::serial;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    const SAMPLE: &str = r#"
defaults:
  credential:
    secret_id: TriviaGitHubToken
  notification_target: arn:aws:sns:us-east-1:123456789012:trivia-notifications
  build_image: aws/codebuild/standard:7.0
pipelines:
  - name: trivia-backend
    source:
      owner: aws-samples
      repository: aws-reinvent-trivia-game
    build:
      build_spec: trivia-backend/infra/codedeploy-blue-green/buildspec.yml
    variant:
      type: container
      app_prefix: trivia-backend
      image_repository: reinvent-trivia-backend-base
  - name: trivia-backend-cfn
    source:
      owner: aws-samples
      repository: aws-reinvent-trivia-game
      credential:
        secret_id: OtherToken
    build:
      build_spec: trivia-backend/infra/cdk/buildspec.yml
    variant:
      type: template
      stack_prefix: TriviaGame
      subject: Backend
    environments: [Prod]
"#;

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = vec![
            EnvGuard::unset("CDPIPE_CONFIG"),
            EnvGuard::unset("CDPIPE_LOG_LEVEL"),
            EnvGuard::unset("CDPIPE_LOG_JSON"),
            EnvGuard::unset("CDPIPE_OUTPUT_FORMAT"),
        ];

        let config = AppConfig::default();
        assert_eq!(config.config_path, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert!(!config.log_json);
        assert_eq!(config.output_format, DEFAULT_OUTPUT_FORMAT);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let _guards = vec![
            EnvGuard::set("CDPIPE_CONFIG", "/etc/cdpipe/pipelines.toml"),
            EnvGuard::set("CDPIPE_LOG_LEVEL", "DEBUG"),
            EnvGuard::set("CDPIPE_LOG_JSON", "true"),
            EnvGuard::set("CDPIPE_OUTPUT_FORMAT", "yaml"),
        ];

        let config = AppConfig::default();
        assert_eq!(config.config_path, PathBuf::from("/etc/cdpipe/pipelines.toml"));
        assert_eq!(config.log_level, "debug");
        assert!(config.log_json);
        assert_eq!(config.output_format, "yaml");
    }

    #[test]
    fn test_configuration_validation_invalid_log_level() {
        let mut config = AppConfig::default();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_configuration_validation_invalid_format() {
        let mut config = AppConfig::default();
        config.log_level = "info".to_string();
        config.output_format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_configuration_accepts_every_output_format() {
        for format in ["json", "yaml", "yml", "human"] {
            let config = AppConfig {
                config_path: PathBuf::from("pipelines.yaml"),
                log_level: "info".to_string(),
                log_json: false,
                output_format: format.to_string(),
            };
            assert!(config.validate().is_ok(), "{} should be accepted", format);
            assert!(OutputFormat::parse(format).is_some());
        }
    }

    #[test]
    fn test_shared_defaults_are_injected() {
        let file = PipelinesFile::from_yaml(SAMPLE).unwrap();
        let backend = file.resolve("trivia-backend").unwrap();

        assert_eq!(
            backend.source.credential,
            Some(CredentialRef::new("TriviaGitHubToken"))
        );
        assert_eq!(
            backend.notification_target.as_deref(),
            Some("arn:aws:sns:us-east-1:123456789012:trivia-notifications")
        );
        assert_eq!(
            backend.build.build_image.as_deref(),
            Some("aws/codebuild/standard:7.0")
        );
        assert!(matches!(backend.variant, Variant::Container(_)));
    }

    #[test]
    fn test_pipeline_overrides_win() {
        let file = PipelinesFile::from_yaml(SAMPLE).unwrap();
        let cfn = file.resolve("trivia-backend-cfn").unwrap();
        assert_eq!(cfn.source.credential, Some(CredentialRef::new("OtherToken")));
        assert_eq!(cfn.environments, Some(vec!["Prod".to_string()]));
    }

    #[test]
    fn test_unknown_pipeline() {
        let file = PipelinesFile::from_yaml(SAMPLE).unwrap();
        match file.resolve("missing") {
            Err(ConfigError::UnknownPipeline { name, available }) => {
                assert_eq!(name, "missing");
                assert_eq!(available, "trivia-backend, trivia-backend-cfn");
            }
            other => panic!("Expected UnknownPipeline, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_pipeline() {
        let mut file = PipelinesFile::from_yaml(SAMPLE).unwrap();
        let copy = file.pipelines[0].clone();
        file.pipelines.push(copy);
        assert!(matches!(
            file.resolve_all(),
            Err(ConfigError::DuplicatePipeline(ref name)) if name == "trivia-backend"
        ));
    }

    #[test]
    fn test_toml_definitions() {
        let content = r#"
[defaults.credential]
secret_id = "GitHubToken"
json_field = "token"

[[pipelines]]
name = "site"
[pipelines.source]
owner = "aws-samples"
repository = "aws-reinvent-trivia-game"
branch = "release"
[pipelines.build]
build_spec = "static-site/buildspec.yml"
[pipelines.variant]
type = "template"
stack_prefix = "TriviaGame"
subject = "StaticSite"
"#;
        let file = PipelinesFile::from_toml(content).unwrap();
        let site = file.resolve("site").unwrap();
        assert_eq!(site.source.branch, "release");
        assert_eq!(
            site.source.credential,
            Some(CredentialRef::new("GitHubToken").with_field("token"))
        );
    }

    #[test]
    fn test_config_display() {
        let config = AppConfig::default();
        let display = format!("{}", config);
        assert!(display.contains("cdpipe Configuration:"));
        assert!(display.contains("Definitions:"));
    }
}
