//! Builder inputs
//!
//! Every parameter the topology builder needs arrives through these structs.
//! String fields default to empty so that an absent value and a blank value
//! are both reported as a missing parameter by the builder, with the field path.

use super::error::{require, ConfigurationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_BUILD_IMAGE: &str = "aws/codebuild/standard:7.0";
pub const DEFAULT_IMAGE_TAG: &str = "release";
pub const DEFAULT_IMAGE_PLACEHOLDER: &str = "IMAGE1_NAME";
pub const DEFAULT_DEPLOYMENT_CONFIG: &str = "CodeDeployDefault.ECSAllAtOnce";
pub const DEFAULT_CLUSTER: &str = "default";
pub const DEFAULT_CHANGE_SET_NAME: &str = "StagedChangeSet";
pub const DEFAULT_STACK_CONFIGURATION: &str = "StackConfig.json";

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_image_tag() -> String {
    DEFAULT_IMAGE_TAG.to_string()
}

fn default_placeholder() -> String {
    DEFAULT_IMAGE_PLACEHOLDER.to_string()
}

fn default_deployment_config() -> String {
    DEFAULT_DEPLOYMENT_CONFIG.to_string()
}

fn default_cluster() -> String {
    DEFAULT_CLUSTER.to_string()
}

fn default_change_set_name() -> String {
    DEFAULT_CHANGE_SET_NAME.to_string()
}

fn default_stack_configuration() -> String {
    DEFAULT_STACK_CONFIGURATION.to_string()
}

fn default_true() -> bool {
    true
}

pub fn default_environments() -> Vec<String> {
    vec!["Test".to_string(), "Prod".to_string()]
}

/// Points at a secret in the secret store; the value itself is never read
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CredentialRef {
    #[serde(default)]
    pub secret_id: String,
    #[serde(default)]
    pub json_field: Option<String>,
}

impl CredentialRef {
    pub fn new(secret_id: impl Into<String>) -> Self {
        Self {
            secret_id: secret_id.into(),
            json_field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.json_field = Some(field.into());
        self
    }

    /// Dynamic reference the orchestration service resolves when the
    /// pipeline definition is deployed, once per definition rather than per run.
    /// Secret-store reference resolved once when the pipeline definition is deployed
    pub fn dynamic_reference(&self) -> Result<String, ConfigurationError> {
        let secret_id = require("source.credential.secret_id", &self.secret_id)?;
        match self.json_field {
            Some(ref field) => {
                let field = require("source.credential.json_field", field)?;
                Ok(format!(
                    "{{{{resolve:secretsmanager:{}:SecretString:{}}}}}",
                    secret_id, field
                ))
            }
            None => Ok(format!("{{{{resolve:secretsmanager:{}}}}}", secret_id)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSettings {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Falls back to the shared credential when absent
    #[serde(default)]
    pub credential: Option<CredentialRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Path of the build specification, relative to the source artifact
    #[serde(default)]
    pub build_spec: String,
    /// Falls back to the shared build image when absent
    #[serde(default)]
    pub build_image: Option<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

/// Blue/green container deployment parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSettings {
    /// Prefix of the deployment application and group names, e.g. `trivia-backend`
    #[serde(default)]
    pub app_prefix: String,
    #[serde(default = "default_cluster")]
    pub cluster: String,
    /// Registry repository holding the base image
    #[serde(default)]
    pub image_repository: String,
    #[serde(default = "default_image_tag")]
    pub image_tag: String,
    #[serde(default = "default_placeholder")]
    pub image_placeholder: String,
    #[serde(default = "default_deployment_config")]
    pub deployment_config: String,
    /// Stack name pattern the build may inspect; defaults to `<app_prefix>*`
    #[serde(default)]
    pub stack_pattern: Option<String>,
}

/// Staged change-set deployment parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSettings {
    /// Stack name prefix, e.g. `TriviaGame`
    #[serde(default)]
    pub stack_prefix: String,
    /// Stack subject, e.g. `Backend`
    #[serde(default)]
    pub subject: String,
    #[serde(default = "default_stack_configuration")]
    pub stack_configuration: String,
    #[serde(default = "default_change_set_name")]
    pub change_set_name: String,
    #[serde(default = "default_true")]
    pub admin_permissions: bool,
}

/// Deployment shape; the source and build stages are shared by both
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Variant {
    Container(ContainerSettings),
    Template(TemplateSettings),
}

impl Variant {
    pub fn name(&self) -> &'static str {
        match self {
            Variant::Container(_) => "container",
            Variant::Template(_) => "template",
        }
    }
}

/// Everything needed to assemble one pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default)]
    pub name: String,
    pub source: SourceSettings,
    #[serde(default)]
    pub build: BuildSettings,
    pub variant: Variant,
    /// Deployment environments in promotion order
    #[serde(default)]
    pub environments: Option<Vec<String>>,
    /// Target of the execution-failed notification; none disables it
    #[serde(default)]
    pub notification_target: Option<String>,
}

impl ContainerSettings {
    pub fn new(app_prefix: impl Into<String>, image_repository: impl Into<String>) -> Self {
        Self {
            app_prefix: app_prefix.into(),
            cluster: default_cluster(),
            image_repository: image_repository.into(),
            image_tag: default_image_tag(),
            image_placeholder: default_placeholder(),
            deployment_config: default_deployment_config(),
            stack_pattern: None,
        }
    }
}

impl TemplateSettings {
    pub fn new(stack_prefix: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            stack_prefix: stack_prefix.into(),
            subject: subject.into(),
            stack_configuration: default_stack_configuration(),
            change_set_name: default_change_set_name(),
            admin_permissions: true,
        }
    }
}

impl SourceSettings {
    pub fn new(owner: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repository: repository.into(),
            branch: default_branch(),
            credential: None,
        }
    }
}
