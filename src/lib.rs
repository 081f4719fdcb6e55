//! cdpipe - declarative delivery pipeline topologies
//!
//! Builds the topology of a continuous-delivery pipeline from a small set of
//! settings: a Source stage fetching a repository revision, a Build stage
//! producing artifacts, then one deployment stage per environment (Test and
//! Prod by default), each promoting the same artifacts into pre-existing
//! resources named after the environment label.
//!
//! # Core Concepts
//!
//! - **Variant**: container blue/green deployments or template change sets
//! - **Deployment stage factory**: a single label-driven procedure for every
//!   environment, so environments differ only by name
//! - **Validation**: structural rules run before a topology is returned; a
//!   failing pipeline yields a [`ConfigurationError`] and nothing else
//!
//! # Example Usage
//!
//! ```
//! use cdpipe::topology::{
//!     BuildSettings, ContainerSettings, CredentialRef, PipelineBuilder, PipelineSettings,
//!     SourceSettings, Variant,
//! };
//!
//! let mut source = SourceSettings::new("aws-samples", "aws-reinvent-trivia-game");
//! source.credential = Some(CredentialRef::new("TriviaGitHubToken").with_field("token"));
//!
//! let settings = PipelineSettings {
//!     name: "trivia-backend".to_string(),
//!     source,
//!     build: BuildSettings {
//!         build_spec: "trivia-backend/buildspec.yml".to_string(),
//!         ..Default::default()
//!     },
//!     variant: Variant::Container(ContainerSettings::new(
//!         "trivia-backend",
//!         "reinvent-trivia-backend-base",
//!     )),
//!     environments: None,
//!     notification_target: None,
//! };
//!
//! let spec = PipelineBuilder::new(settings).build().unwrap();
//! println!("{}", spec);
//! ```
//!
//! # Project Structure
//!
//! - [`topology`]: pipeline model, builder and deployment stage factory
//! - [`validation`]: structural rules over assembled pipelines
//! - [`config`]: process configuration and pipeline definition files
//! - [`cli`]: command-line arguments, handlers and output formatting

pub mod cli;
pub mod config;
pub mod topology;
pub mod util;
pub mod validation;

pub use config::{AppConfig, ConfigError, PipelinesFile};
pub use topology::{ConfigurationError, PipelineBuilder, PipelineSettings, PipelineSpec};
pub use util::{init_logging, LoggingConfig};
pub use validation::{ValidationRule, Validator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_cdpipe() {
        assert_eq!(NAME, "cdpipe");
    }
}
