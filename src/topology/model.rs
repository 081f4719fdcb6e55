//! Pipeline topology data structures
//!
//! These types describe a delivery pipeline the way the orchestration service
//! consumes it: an ordered list of stages, each holding actions that pass
//! named artifacts to one another. Nothing here carries runtime state.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Run-order assigned to actions that need no explicit sequencing
pub const DEFAULT_RUN_ORDER: u32 = 1;

/// Event fired by the orchestration service when an execution fails
pub const EXECUTION_FAILED_EVENT: &str = "codepipeline-pipeline-pipeline-execution-failed";

/// A named handle to data passed between actions
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Artifact(String);

impl Artifact {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Addresses a file inside this artifact
    pub fn at_path(&self, path: impl Into<String>) -> ArtifactPath {
        ArtifactPath {
            artifact: self.clone(),
            path: path.into(),
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file inside an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPath {
    pub artifact: Artifact,
    pub path: String,
}

impl fmt::Display for ArtifactPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.artifact, self.path)
    }
}

/// Allow-listed operations on a set of resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionStatement {
    pub operations: Vec<String>,
    pub resources: Vec<String>,
}

impl PermissionStatement {
    pub fn new<O, R>(operations: O, resources: R) -> Self
    where
        O: IntoIterator,
        O::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            operations: operations.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.resources.iter().any(|r| r == "*")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFetch {
    pub owner: String,
    pub repository: String,
    pub branch: String,
    /// Opaque reference resolved by the secret store, never the secret itself
    pub credential: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSource {
    pub repository: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerBuild {
    pub project: String,
    pub build_spec: String,
    pub build_image: String,
    /// Required when the build itself produces container images
    pub privileged: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<PermissionStatement>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSetPrepare {
    pub stack_name: String,
    pub change_set_name: String,
    pub template_path: ArtifactPath,
    pub template_configuration: ArtifactPath,
    pub admin_permissions: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSetExecute {
    pub stack_name: String,
    pub change_set_name: String,
}

/// Maps an image artifact onto the placeholder the task definition template uses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSubstitution {
    pub input: Artifact,
    pub placeholder: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlueGreenDeploy {
    pub application: String,
    pub deployment_group: String,
    pub deployment_config: String,
    pub task_definition_template: ArtifactPath,
    pub app_spec_template: ArtifactPath,
    pub image_substitutions: Vec<ImageSubstitution>,
}

/// What an action does, with its kind-specific parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "configuration", rename_all = "kebab-case")]
pub enum ActionKind {
    SourceFetch(SourceFetch),
    ImageSource(ImageSource),
    ContainerizedBuild(ContainerBuild),
    TemplateChangePrepare(ChangeSetPrepare),
    TemplateChangeExecute(ChangeSetExecute),
    ContainerBlueGreenDeploy(BlueGreenDeploy),
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::SourceFetch(_) => "source-fetch",
            ActionKind::ImageSource(_) => "image-source",
            ActionKind::ContainerizedBuild(_) => "containerized-build",
            ActionKind::TemplateChangePrepare(_) => "template-change-prepare",
            ActionKind::TemplateChangeExecute(_) => "template-change-execute",
            ActionKind::ContainerBlueGreenDeploy(_) => "container-blue-green-deploy",
        }
    }

    /// Artifacts addressed by parameters rather than declared inputs
    fn referenced_artifacts(&self) -> Vec<&Artifact> {
        match self {
            ActionKind::TemplateChangePrepare(p) => {
                vec![&p.template_path.artifact, &p.template_configuration.artifact]
            }
            ActionKind::ContainerBlueGreenDeploy(d) => {
                let mut refs = vec![
                    &d.task_definition_template.artifact,
                    &d.app_spec_template.artifact,
                ];
                refs.extend(d.image_substitutions.iter().map(|s| &s.input));
                refs
            }
            _ => Vec::new(),
        }
    }
}

/// A single unit of work inside a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    pub run_order: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<Artifact>,
    #[serde(flatten)]
    pub kind: ActionKind,
}

impl Action {
    pub fn new(name: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            name: name.into(),
            run_order: DEFAULT_RUN_ORDER,
            inputs: Vec::new(),
            outputs: Vec::new(),
            kind,
        }
    }

    pub fn with_run_order(mut self, run_order: u32) -> Self {
        self.run_order = run_order;
        self
    }

    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = Artifact>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    pub fn with_outputs(mut self, outputs: impl IntoIterator<Item = Artifact>) -> Self {
        self.outputs.extend(outputs);
        self
    }

    /// Declared inputs plus any artifact the parameters point into, deduplicated
    pub fn consumed_artifacts(&self) -> Vec<&Artifact> {
        let mut consumed: Vec<&Artifact> = self.inputs.iter().collect();
        for artifact in self.kind.referenced_artifacts() {
            if !consumed.contains(&artifact) {
                consumed.push(artifact);
            }
        }
        consumed
    }
}

/// A named phase of a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub actions: Vec<Action>,
}

impl Stage {
    pub fn new(name: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            name: name.into(),
            actions,
        }
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }
}

/// Forwards selected pipeline events to a fixed target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRule {
    pub name: String,
    pub events: Vec<String>,
    pub target: String,
}

/// A fully wired delivery pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub name: String,
    pub variant: String,
    pub stages: Vec<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationRule>,
}

impl PipelineSpec {
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Iterates `(stage, action)` pairs in declaration order
    pub fn actions(&self) -> impl Iterator<Item = (&Stage, &Action)> {
        self.stages
            .iter()
            .flat_map(|stage| stage.actions.iter().map(move |action| (stage, action)))
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// SHA-256 over the canonical JSON encoding, hex encoded.
    ///
    /// Two syntheses of the same settings always share a fingerprint.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let canonical = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&canonical)))
    }
}

impl fmt::Display for PipelineSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline {} ({})", self.name, self.variant)?;
        for stage in &self.stages {
            writeln!(f, "  Stage {}", stage.name)?;
            for action in &stage.actions {
                write!(
                    f,
                    "    [{}] {} <{}>",
                    action.run_order,
                    action.name,
                    action.kind.label()
                )?;
                let consumed = action.consumed_artifacts();
                if !consumed.is_empty() {
                    let names: Vec<&str> = consumed.iter().map(|a| a.name()).collect();
                    write!(f, " in: {}", names.join(", "))?;
                }
                if !action.outputs.is_empty() {
                    let names: Vec<&str> = action.outputs.iter().map(|a| a.name()).collect();
                    write!(f, " out: {}", names.join(", "))?;
                }
                writeln!(f)?;
            }
        }
        if let Some(ref rule) = self.notification {
            writeln!(f, "  Notify {} on {}", rule.target, rule.events.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deploy_action() -> Action {
        let build = Artifact::new("BuildOutput");
        let image = Artifact::new("ImageDetails");
        Action::new(
            "Deploy",
            ActionKind::ContainerBlueGreenDeploy(BlueGreenDeploy {
                application: "AppECS-default-app-test".to_string(),
                deployment_group: "DgpECS-default-app-test".to_string(),
                deployment_config: "CodeDeployDefault.ECSAllAtOnce".to_string(),
                task_definition_template: build.at_path("task-definition-test.json"),
                app_spec_template: build.at_path("appspec-test.json"),
                image_substitutions: vec![ImageSubstitution {
                    input: image.clone(),
                    placeholder: "IMAGE1_NAME".to_string(),
                }],
            }),
        )
        .with_inputs([build, image])
    }

    #[test]
    fn test_consumed_artifacts_deduplicated() {
        let action = deploy_action();
        let consumed: Vec<&str> = action.consumed_artifacts().iter().map(|a| a.name()).collect();
        assert_eq!(consumed, vec!["BuildOutput", "ImageDetails"]);
    }

    #[test]
    fn test_consumed_artifacts_include_parameter_references() {
        let mut action = deploy_action();
        action.inputs.clear();
        let consumed: Vec<&str> = action.consumed_artifacts().iter().map(|a| a.name()).collect();
        assert_eq!(consumed, vec!["BuildOutput", "ImageDetails"]);
    }

    #[test]
    fn test_action_kind_serialization() {
        let action = deploy_action();
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["kind"], "container-blue-green-deploy");
        assert_eq!(json["run_order"], 1);
        assert_eq!(
            json["configuration"]["application"],
            "AppECS-default-app-test"
        );
        assert_eq!(
            json["configuration"]["task_definition_template"]["path"],
            "task-definition-test.json"
        );

        let parsed: Action = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, action);
    }

    #[test]
    fn test_permission_wildcard() {
        let scoped = PermissionStatement::new(["ecr:PutImage"], ["arn:aws:ecr:*:*:repository/app"]);
        let wildcard = PermissionStatement::new(["ecr:GetAuthorizationToken"], ["*"]);
        assert!(!scoped.is_wildcard());
        assert!(wildcard.is_wildcard());
    }

    #[test]
    fn test_to_yaml_returns_typed_error() {
        let spec = PipelineSpec {
            name: "demo".to_string(),
            variant: "container".to_string(),
            stages: vec![Stage::new("Prod", vec![deploy_action()])],
            notification: None,
        };
        let rendered: Result<String, serde_yaml::Error> = spec.to_yaml();
        let parsed: PipelineSpec = serde_yaml::from_str(&rendered.unwrap()).unwrap();
        assert_eq!(parsed, spec);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let spec = PipelineSpec {
            name: "demo".to_string(),
            variant: "container".to_string(),
            stages: vec![Stage::new("Prod", vec![deploy_action()])],
            notification: None,
        };
        let first = spec.fingerprint().unwrap();
        assert_eq!(first, spec.clone().fingerprint().unwrap());
        assert_eq!(first.len(), 64);

        let mut renamed = spec.clone();
        renamed.name = "other".to_string();
        assert_ne!(first, renamed.fingerprint().unwrap());
    }

    #[test]
    fn test_display_lists_stages_and_artifacts() {
        let spec = PipelineSpec {
            name: "demo".to_string(),
            variant: "container".to_string(),
            stages: vec![Stage::new("Test", vec![deploy_action()])],
            notification: Some(NotificationRule {
                name: "demo-failures".to_string(),
                events: vec![EXECUTION_FAILED_EVENT.to_string()],
                target: "arn:aws:sns:us-east-1:123456789012:alerts".to_string(),
            }),
        };
        let text = spec.to_string();
        assert!(text.contains("Pipeline demo (container)"));
        assert!(text.contains("Stage Test"));
        assert!(text.contains("[1] Deploy <container-blue-green-deploy> in: BuildOutput, ImageDetails"));
        assert!(text.contains("Notify arn:aws:sns"));
    }
}
