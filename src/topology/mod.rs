//! Delivery pipeline topology
//!
//! - [`model`]: stages, actions and artifacts as handed to the orchestration service
//! - [`settings`]: builder inputs, deserializable from pipeline definition files
//! - [`builder`]: assembles Source, Build and deployment stages
//! - [`factory`]: label-driven deployment stage construction
//! - [`naming`]: deployment target naming conventions

pub mod builder;
pub mod draft;
pub mod error;
pub mod factory;
pub mod model;
pub mod naming;
pub mod settings;

pub use builder::PipelineBuilder;
pub use draft::PipelineDraft;
pub use error::ConfigurationError;
pub use factory::{DeployInputs, DeploymentStageFactory};
pub use model::{
    Action, ActionKind, Artifact, ArtifactPath, NotificationRule, PermissionStatement,
    PipelineSpec, Stage,
};
pub use naming::{DeploymentTarget, TargetResources};
pub use settings::{
    BuildSettings, ContainerSettings, CredentialRef, PipelineSettings, SourceSettings,
    TemplateSettings, Variant,
};
