//! Deployment stage factory
//!
//! Every deployment environment is produced by the same procedure, driven only
//! by its label, so Test and Prod cannot drift apart structurally.

use super::draft::PipelineDraft;
use super::error::{require, ConfigurationError};
use super::model::{
    Action, ActionKind, Artifact, BlueGreenDeploy, ChangeSetExecute, ChangeSetPrepare,
    ImageSubstitution, Stage,
};
use super::naming::{resource_label, DeploymentTarget, TargetResources};
use super::settings::{ContainerSettings, TemplateSettings, Variant};
use tracing::debug;

pub const DEPLOY_ACTION: &str = "Deploy";
pub const PREPARE_ACTION: &str = "PrepareChanges";
pub const EXECUTE_ACTION: &str = "ExecuteChanges";
pub const PREPARE_RUN_ORDER: u32 = 1;
pub const EXECUTE_RUN_ORDER: u32 = 2;

/// Artifacts a deployment stage consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployInputs {
    pub build_output: Artifact,
    /// Image reference emitted by the build; container deployments only
    pub image_details: Option<Artifact>,
}

pub struct DeploymentStageFactory<'a> {
    variant: &'a Variant,
    inputs: DeployInputs,
}

impl<'a> DeploymentStageFactory<'a> {
    pub fn new(variant: &'a Variant, inputs: DeployInputs) -> Self {
        Self { variant, inputs }
    }

    /// Resolves the pre-existing resources `label` promotes into
    pub fn target(&self, label: &str) -> Result<DeploymentTarget, ConfigurationError> {
        DeploymentTarget::resolve(self.variant, label)
    }

    /// Builds the stage for `label` without touching any pipeline
    pub fn stage(&self, label: &str) -> Result<Stage, ConfigurationError> {
        let target = self.target(label)?;
        let actions = match self.variant {
            Variant::Container(settings) => self.container_actions(settings, &target)?,
            Variant::Template(settings) => self.template_actions(settings, &target)?,
        };
        Ok(Stage::new(target.label, actions))
    }

    /// Builds the stage for `label` and appends it to `draft`
    pub fn append(&self, draft: &mut PipelineDraft, label: &str) -> Result<(), ConfigurationError> {
        draft.claim_label(label)?;
        let stage = self.stage(label)?;
        debug!(pipeline = %draft.name(), label, "Appending deployment stage");
        draft.push_stage(stage)
    }

    fn container_actions(
        &self,
        settings: &ContainerSettings,
        target: &DeploymentTarget,
    ) -> Result<Vec<Action>, ConfigurationError> {
        let image = self
            .inputs
            .image_details
            .clone()
            .ok_or_else(|| ConfigurationError::missing("deploy.image_details"))?;
        let placeholder = require("variant.image_placeholder", &settings.image_placeholder)?;
        let (application, deployment_group, deployment_config) = match &target.resources {
            TargetResources::Container {
                application,
                deployment_group,
                deployment_config,
            } => (application, deployment_group, deployment_config),
            TargetResources::Stack { .. } => {
                return Err(ConfigurationError::invalid(
                    "deploy.target",
                    "container deployment resolved to a stack target",
                ))
            }
        };
        require("variant.deployment_config", deployment_config)?;

        let label = resource_label(&target.label);
        let build_output = &self.inputs.build_output;
        let deploy = Action::new(
            DEPLOY_ACTION,
            ActionKind::ContainerBlueGreenDeploy(BlueGreenDeploy {
                application: application.clone(),
                deployment_group: deployment_group.clone(),
                deployment_config: deployment_config.clone(),
                task_definition_template: build_output
                    .at_path(format!("task-definition-{}.json", label)),
                app_spec_template: build_output.at_path(format!("appspec-{}.json", label)),
                image_substitutions: vec![ImageSubstitution {
                    input: image.clone(),
                    placeholder: placeholder.to_string(),
                }],
            }),
        )
        .with_inputs([build_output.clone(), image]);

        Ok(vec![deploy])
    }

    fn template_actions(
        &self,
        settings: &TemplateSettings,
        target: &DeploymentTarget,
    ) -> Result<Vec<Action>, ConfigurationError> {
        let (stack_name, template_file) = match &target.resources {
            TargetResources::Stack {
                stack_name,
                template_file,
            } => (stack_name, template_file),
            TargetResources::Container { .. } => {
                return Err(ConfigurationError::invalid(
                    "deploy.target",
                    "template deployment resolved to a container target",
                ))
            }
        };
        let change_set_name = require("variant.change_set_name", &settings.change_set_name)?;
        let configuration = require("variant.stack_configuration", &settings.stack_configuration)?;
        let build_output = &self.inputs.build_output;

        let prepare = Action::new(
            PREPARE_ACTION,
            ActionKind::TemplateChangePrepare(ChangeSetPrepare {
                stack_name: stack_name.clone(),
                change_set_name: change_set_name.to_string(),
                template_path: build_output.at_path(template_file.clone()),
                template_configuration: build_output.at_path(configuration),
                admin_permissions: settings.admin_permissions,
            }),
        )
        .with_run_order(PREPARE_RUN_ORDER)
        .with_inputs([build_output.clone()]);

        let execute = Action::new(
            EXECUTE_ACTION,
            ActionKind::TemplateChangeExecute(ChangeSetExecute {
                stack_name: stack_name.clone(),
                change_set_name: change_set_name.to_string(),
            }),
        )
        .with_run_order(EXECUTE_RUN_ORDER);

        Ok(vec![prepare, execute])
    }
}
