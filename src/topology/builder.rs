//! Pipeline topology builder
//!
//! Assembles the fixed stage sequence shared by every pipeline: Source, Build,
//! then one deployment stage per environment label. The variant decides what
//! the source and build stages emit and which deployment shape is used.

use super::draft::PipelineDraft;
use super::error::{require, ConfigurationError};
use super::factory::{DeployInputs, DeploymentStageFactory};
use super::model::{
    Action, ActionKind, Artifact, ContainerBuild, ImageSource, NotificationRule,
    PermissionStatement, PipelineSpec, SourceFetch, Stage, EXECUTION_FAILED_EVENT,
};
use super::naming::{stage_label, DeploymentTarget};
use super::settings::{
    default_environments, ContainerSettings, PipelineSettings, TemplateSettings, Variant,
    DEFAULT_BUILD_IMAGE,
};
use crate::validation::Validator;
use tracing::{debug, info};

pub const SOURCE_STAGE: &str = "Source";
pub const BUILD_STAGE: &str = "Build";

pub const SOURCE_ACTION: &str = "Source";
pub const BASE_IMAGE_ACTION: &str = "BaseImage";
pub const BUILD_ACTION: &str = "Build";

pub const SOURCE_OUTPUT: &str = "SourceOutput";
pub const BASE_IMAGE_OUTPUT: &str = "BaseImage";
pub const BUILD_OUTPUT: &str = "BuildOutput";
pub const IMAGE_DETAILS_OUTPUT: &str = "ImageDetails";

/// The only operation allowed on all resources; it has no resource-level scope
pub const REGISTRY_AUTH_OPERATION: &str = "ecr:GetAuthorizationToken";

const REGISTRY_PULL_OPERATIONS: [&str; 3] = [
    "ecr:BatchCheckLayerAvailability",
    "ecr:GetDownloadUrlForLayer",
    "ecr:BatchGetImage",
];

const REGISTRY_PUSH_OPERATIONS: [&str; 5] = [
    "ecr:BatchCheckLayerAvailability",
    "ecr:InitiateLayerUpload",
    "ecr:UploadLayerPart",
    "ecr:CompleteLayerUpload",
    "ecr:PutImage",
];

const DESCRIBE_STACK_OPERATION: &str = "cloudformation:DescribeStackResources";

fn repository_arn(repository: &str) -> String {
    format!("arn:aws:ecr:*:*:repository/{}", repository)
}

fn stack_arn(pattern: &str) -> String {
    format!("arn:aws:cloudformation:*:*:stack/{}/*", pattern)
}

/// Assembles one delivery pipeline from its settings.
///
/// ```
/// use cdpipe::topology::{
///     CredentialRef, PipelineBuilder, PipelineSettings, SourceSettings, TemplateSettings, Variant,
/// };
///
/// let mut source = SourceSettings::new("aws-samples", "aws-reinvent-trivia-game");
/// source.credential = Some(CredentialRef::new("TriviaGitHubToken"));
///
/// let settings = PipelineSettings {
///     name: "trivia-game-backend-cfn".to_string(),
///     source,
///     build: cdpipe::topology::BuildSettings {
///         build_spec: "trivia-backend/infra/cdk/buildspec.yml".to_string(),
///         ..Default::default()
///     },
///     variant: Variant::Template(TemplateSettings::new("TriviaGame", "Backend")),
///     environments: None,
///     notification_target: None,
/// };
///
/// let spec = PipelineBuilder::new(settings).build().unwrap();
/// assert_eq!(spec.stage_names(), vec!["Source", "Build", "Test", "Prod"]);
/// ```
pub struct PipelineBuilder {
    settings: PipelineSettings,
    validator: Validator,
}

impl PipelineBuilder {
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            settings,
            validator: Validator::default(),
        }
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    /// Environment labels in promotion order
    pub fn environments(&self) -> Vec<String> {
        self.settings
            .environments
            .clone()
            .unwrap_or_else(default_environments)
    }

    /// Deployment targets in promotion order, without assembling the pipeline
    pub fn targets(&self) -> Result<Vec<DeploymentTarget>, ConfigurationError> {
        self.environments()
            .iter()
            .map(|label| DeploymentTarget::resolve(&self.settings.variant, label))
            .collect()
    }

    pub fn build(&self) -> Result<PipelineSpec, ConfigurationError> {
        let settings = &self.settings;
        let name = require("name", &settings.name)?;
        info!(
            pipeline = name,
            variant = settings.variant.name(),
            "Assembling pipeline"
        );

        let environments = self.environments();
        if environments.is_empty() {
            return Err(ConfigurationError::missing("environments"));
        }

        let mut draft = PipelineDraft::new(name, settings.variant.name());

        let source_artifacts = self.source_stage(&mut draft)?;
        let inputs = self.build_stage(&mut draft, &source_artifacts)?;

        let factory = DeploymentStageFactory::new(&settings.variant, inputs);
        for label in &environments {
            factory.append(&mut draft, label)?;
        }

        if let Some(ref target) = settings.notification_target {
            let target = require("notification_target", target)?;
            draft.set_notification(NotificationRule {
                name: format!("{}-execution-failed", name),
                events: vec![EXECUTION_FAILED_EVENT.to_string()],
                target: target.to_string(),
            });
        }

        let spec = draft.finish(&self.validator)?;
        info!(
            pipeline = %spec.name,
            stages = spec.stages.len(),
            "Pipeline assembled"
        );
        Ok(spec)
    }

    fn source_stage(&self, draft: &mut PipelineDraft) -> Result<Vec<Artifact>, ConfigurationError> {
        let source = &self.settings.source;
        let owner = require("source.owner", &source.owner)?;
        let repository = require("source.repository", &source.repository)?;
        let branch = require("source.branch", &source.branch)?;
        let credential = source
            .credential
            .as_ref()
            .ok_or_else(|| ConfigurationError::missing("source.credential"))?
            .dynamic_reference()?;

        let source_output = Artifact::new(SOURCE_OUTPUT);
        let mut actions = vec![Action::new(
            SOURCE_ACTION,
            ActionKind::SourceFetch(SourceFetch {
                owner: owner.to_string(),
                repository: repository.to_string(),
                branch: branch.to_string(),
                credential,
            }),
        )
        .with_outputs([source_output.clone()])];
        let mut artifacts = vec![source_output];

        if let Variant::Container(container) = &self.settings.variant {
            let image_repository = require("variant.image_repository", &container.image_repository)?;
            let tag = require("variant.image_tag", &container.image_tag)?;
            let base_image = Artifact::new(BASE_IMAGE_OUTPUT);
            actions.push(
                Action::new(
                    BASE_IMAGE_ACTION,
                    ActionKind::ImageSource(ImageSource {
                        repository: image_repository.to_string(),
                        tag: tag.to_string(),
                    }),
                )
                .with_outputs([base_image.clone()]),
            );
            artifacts.push(base_image);
        }

        draft.push_stage(Stage::new(SOURCE_STAGE, actions))?;
        Ok(artifacts)
    }

    fn build_stage(
        &self,
        draft: &mut PipelineDraft,
        sources: &[Artifact],
    ) -> Result<DeployInputs, ConfigurationError> {
        let build = &self.settings.build;
        let build_spec = require("build.build_spec", &build.build_spec)?;
        let build_image = match build.build_image {
            Some(ref image) => require("build.build_image", image)?.to_string(),
            None => DEFAULT_BUILD_IMAGE.to_string(),
        };

        let build_output = Artifact::new(BUILD_OUTPUT);
        let (outputs, image_details, privileged, permissions) = match &self.settings.variant {
            Variant::Container(container) => {
                let image_details = Artifact::new(IMAGE_DETAILS_OUTPUT);
                (
                    vec![build_output.clone(), image_details.clone()],
                    Some(image_details),
                    true,
                    container_permissions(container)?,
                )
            }
            Variant::Template(template) => (
                vec![build_output.clone()],
                None,
                false,
                template_permissions(template)?,
            ),
        };
        debug!(
            build_spec,
            permissions = permissions.len(),
            "Build action declared"
        );

        let action = Action::new(
            BUILD_ACTION,
            ActionKind::ContainerizedBuild(ContainerBuild {
                project: format!("{}-build", draft.name()),
                build_spec: build_spec.to_string(),
                build_image,
                privileged,
                permissions,
                environment: build.environment.clone(),
            }),
        )
        .with_inputs(sources.iter().cloned())
        .with_outputs(outputs);

        draft.push_stage(Stage::new(BUILD_STAGE, vec![action]))?;
        Ok(DeployInputs {
            build_output,
            image_details,
        })
    }
}

/// Registry access for the base image and the application image, plus stack inspection
fn container_permissions(
    settings: &ContainerSettings,
) -> Result<Vec<PermissionStatement>, ConfigurationError> {
    let app_prefix = require("variant.app_prefix", &settings.app_prefix)?;
    let base_repository = require("variant.image_repository", &settings.image_repository)?;
    let stack_pattern = match settings.stack_pattern {
        Some(ref pattern) => require("variant.stack_pattern", pattern)?.to_string(),
        None => format!("{}*", app_prefix),
    };

    Ok(vec![
        PermissionStatement::new([REGISTRY_AUTH_OPERATION], ["*"]),
        PermissionStatement::new(REGISTRY_PULL_OPERATIONS, [repository_arn(base_repository)]),
        PermissionStatement::new(REGISTRY_PUSH_OPERATIONS, [repository_arn(app_prefix)]),
        PermissionStatement::new([DESCRIBE_STACK_OPERATION], [stack_arn(&stack_pattern)]),
    ])
}

fn template_permissions(
    settings: &TemplateSettings,
) -> Result<Vec<PermissionStatement>, ConfigurationError> {
    let prefix = require("variant.stack_prefix", &settings.stack_prefix)?;
    let subject = require("variant.subject", &settings.subject)?;
    let pattern = format!("{}{}*", prefix, stage_label(subject));
    Ok(vec![PermissionStatement::new(
        [DESCRIBE_STACK_OPERATION],
        [stack_arn(&pattern)],
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::settings::{BuildSettings, CredentialRef, SourceSettings};

    fn settings(variant: Variant) -> PipelineSettings {
        let mut source = SourceSettings::new("aws-samples", "aws-reinvent-trivia-game");
        source.credential = Some(CredentialRef::new("TriviaGitHubToken").with_field("token"));
        PipelineSettings {
            name: "trivia-backend".to_string(),
            source,
            build: BuildSettings {
                build_spec: "trivia-backend/infra/buildspec.yml".to_string(),
                ..Default::default()
            },
            variant,
            environments: None,
            notification_target: Some(
                "arn:aws:sns:us-east-1:123456789012:trivia-notifications".to_string(),
            ),
        }
    }

    fn container() -> Variant {
        Variant::Container(ContainerSettings::new(
            "trivia-backend",
            "reinvent-trivia-backend-base",
        ))
    }

    #[test]
    fn test_container_source_stage_has_two_actions() {
        let spec = PipelineBuilder::new(settings(container())).build().unwrap();
        let source = spec.stage(SOURCE_STAGE).unwrap();
        assert_eq!(source.actions.len(), 2);
        assert!(source.actions.iter().all(|a| a.run_order == 1));

        let build = spec.stage(BUILD_STAGE).unwrap().action(BUILD_ACTION).unwrap();
        let outputs: Vec<&str> = build.outputs.iter().map(|a| a.name()).collect();
        assert_eq!(outputs, vec![BUILD_OUTPUT, IMAGE_DETAILS_OUTPUT]);
        let inputs: Vec<&str> = build.inputs.iter().map(|a| a.name()).collect();
        assert_eq!(inputs, vec![SOURCE_OUTPUT, BASE_IMAGE_OUTPUT]);
    }

    #[test]
    fn test_template_source_stage_has_one_action() {
        let variant = Variant::Template(TemplateSettings::new("TriviaGame", "Backend"));
        let spec = PipelineBuilder::new(settings(variant)).build().unwrap();
        assert_eq!(spec.stage(SOURCE_STAGE).unwrap().actions.len(), 1);
        let build = spec.stage(BUILD_STAGE).unwrap().action(BUILD_ACTION).unwrap();
        assert_eq!(build.outputs, vec![Artifact::new(BUILD_OUTPUT)]);
    }

    #[test]
    fn test_credential_is_a_reference() {
        let spec = PipelineBuilder::new(settings(container())).build().unwrap();
        let source = spec.stage(SOURCE_STAGE).unwrap().action(SOURCE_ACTION).unwrap();
        match &source.kind {
            ActionKind::SourceFetch(fetch) => assert_eq!(
                fetch.credential,
                "{{resolve:secretsmanager:TriviaGitHubToken:SecretString:token}}"
            ),
            other => panic!("Expected source fetch, got {:?}", other),
        }
    }

    #[test]
    fn test_container_permissions_are_scoped() {
        let spec = PipelineBuilder::new(settings(container())).build().unwrap();
        let build = spec.stage(BUILD_STAGE).unwrap().action(BUILD_ACTION).unwrap();
        let ActionKind::ContainerizedBuild(ref project) = build.kind else {
            panic!("Expected containerized build");
        };
        assert!(project.privileged);
        for statement in &project.permissions {
            if statement.is_wildcard() {
                assert_eq!(statement.operations, vec![REGISTRY_AUTH_OPERATION]);
            }
        }
        assert!(project.permissions.iter().any(|p| p.resources
            == vec!["arn:aws:cloudformation:*:*:stack/trivia-backend*/*".to_string()]));
    }

    #[test]
    fn test_notification_rule() {
        let spec = PipelineBuilder::new(settings(container())).build().unwrap();
        let rule = spec.notification.unwrap();
        assert_eq!(rule.events, vec![EXECUTION_FAILED_EVENT.to_string()]);
        assert_eq!(rule.name, "trivia-backend-execution-failed");
    }

    #[test]
    fn test_missing_credential() {
        let mut s = settings(container());
        s.source.credential = None;
        assert_eq!(
            PipelineBuilder::new(s).build().unwrap_err(),
            ConfigurationError::missing("source.credential")
        );
    }

    #[test]
    fn test_empty_environment_list() {
        let mut s = settings(container());
        s.environments = Some(vec![]);
        assert_eq!(
            PipelineBuilder::new(s).build().unwrap_err(),
            ConfigurationError::missing("environments")
        );
    }

    #[test]
    fn test_custom_environments() {
        let mut s = settings(container());
        s.environments = Some(vec!["staging".to_string(), "prod".to_string()]);
        let spec = PipelineBuilder::new(s).build().unwrap();
        assert_eq!(spec.stage_names(), vec!["Source", "Build", "Staging", "Prod"]);
    }
}
