//! Naming conventions for deployment targets
//!
//! Deployment targets already exist outside the pipeline; the pipeline only
//! needs their names, which are derived from the environment label.

use super::error::{require, ConfigurationError};
use super::settings::{ContainerSettings, TemplateSettings, Variant};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const MAX_STACK_NAME_LEN: usize = 128;
const MAX_DEPLOYMENT_NAME_LEN: usize = 100;

fn stack_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]*$").expect("valid stack pattern"))
}

fn deployment_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._+=,@-]+$").expect("valid deployment name pattern")
    })
}

/// Stage-name form of a label: surrounding whitespace removed, first letter upper-cased
pub fn stage_label(label: &str) -> String {
    let trimmed = label.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Resource-name form of a label
pub fn resource_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Pre-existing resources a deployment stage promotes into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetResources {
    Container {
        application: String,
        deployment_group: String,
        deployment_config: String,
    },
    Stack {
        stack_name: String,
        template_file: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentTarget {
    pub label: String,
    #[serde(flatten)]
    pub resources: TargetResources,
}

impl DeploymentTarget {
    /// Resolves the target `label` promotes into under the given variant
    pub fn resolve(variant: &Variant, label: &str) -> Result<Self, ConfigurationError> {
        if resource_label(label).is_empty() {
            return Err(ConfigurationError::EmptyLabel);
        }
        match variant {
            Variant::Container(settings) => Self::container(settings, label),
            Variant::Template(settings) => Self::stack(settings, label),
        }
    }

    /// Resolves the container target for `label`: `AppECS-<cluster>-<prefix>-<label>`
    /// and `DgpECS-<cluster>-<prefix>-<label>`, all lower case after the kind marker.
    pub fn container(
        settings: &ContainerSettings,
        label: &str,
    ) -> Result<Self, ConfigurationError> {
        let cluster = require("variant.cluster", &settings.cluster)?;
        let app_prefix = require("variant.app_prefix", &settings.app_prefix)?;
        let suffix = format!("{}-{}-{}", cluster, app_prefix, resource_label(label)).to_lowercase();
        let application = format!("AppECS-{}", suffix);
        let deployment_group = format!("DgpECS-{}", suffix);
        check_deployment_name("application", &application)?;
        check_deployment_name("deployment_group", &deployment_group)?;

        Ok(Self {
            label: stage_label(label),
            resources: TargetResources::Container {
                application,
                deployment_group,
                deployment_config: settings.deployment_config.trim().to_string(),
            },
        })
    }

    /// Resolves the stack target for `label`: `<prefix><Subject><Label>`
    pub fn stack(settings: &TemplateSettings, label: &str) -> Result<Self, ConfigurationError> {
        let stack_prefix = require("variant.stack_prefix", &settings.stack_prefix)?;
        let subject = require("variant.subject", &settings.subject)?;
        let stack_name = format!("{}{}{}", stack_prefix, stage_label(subject), stage_label(label));
        check_stack_name(&stack_name)?;
        let template_file = format!("{}.template.yaml", stack_name);

        Ok(Self {
            label: stage_label(label),
            resources: TargetResources::Stack {
                stack_name,
                template_file,
            },
        })
    }
}

fn check_stack_name(name: &str) -> Result<(), ConfigurationError> {
    if name.len() > MAX_STACK_NAME_LEN {
        return Err(ConfigurationError::invalid(
            "stack_name",
            format!("'{}' exceeds {} characters", name, MAX_STACK_NAME_LEN),
        ));
    }
    if !stack_name_pattern().is_match(name) {
        return Err(ConfigurationError::invalid(
            "stack_name",
            format!(
                "'{}' must start with a letter and contain only letters, digits and hyphens",
                name
            ),
        ));
    }
    Ok(())
}

fn check_deployment_name(field: &str, name: &str) -> Result<(), ConfigurationError> {
    if name.len() > MAX_DEPLOYMENT_NAME_LEN {
        return Err(ConfigurationError::invalid(
            field,
            format!("'{}' exceeds {} characters", name, MAX_DEPLOYMENT_NAME_LEN),
        ));
    }
    if !deployment_name_pattern().is_match(name) {
        return Err(ConfigurationError::invalid(
            field,
            format!("'{}' contains characters not allowed in deployment names", name),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        lower = { "test", "Test" },
        already_title = { "Prod", "Prod" },
        padded = { "  staging ", "Staging" },
        empty = { "", "" },
    )]
    fn test_stage_label(input: &str, expected: &str) {
        assert_eq!(stage_label(input), expected);
    }

    #[test]
    fn test_container_target_naming() {
        let settings = ContainerSettings::new("trivia-backend", "reinvent-trivia-backend-base");
        let target = DeploymentTarget::container(&settings, "Test").unwrap();
        assert_eq!(target.label, "Test");
        assert_eq!(
            target.resources,
            TargetResources::Container {
                application: "AppECS-default-trivia-backend-test".to_string(),
                deployment_group: "DgpECS-default-trivia-backend-test".to_string(),
                deployment_config: "CodeDeployDefault.ECSAllAtOnce".to_string(),
            }
        );
    }

    #[test]
    fn test_stack_target_naming() {
        let settings = TemplateSettings::new("TriviaGame", "Backend");
        let target = DeploymentTarget::stack(&settings, "Prod").unwrap();
        assert_eq!(
            target.resources,
            TargetResources::Stack {
                stack_name: "TriviaGameBackendProd".to_string(),
                template_file: "TriviaGameBackendProd.template.yaml".to_string(),
            }
        );
    }

    #[test]
    fn test_stack_label_is_title_cased() {
        let settings = TemplateSettings::new("TriviaGame", "Backend");
        let target = DeploymentTarget::stack(&settings, "prod").unwrap();
        assert_eq!(target.label, "Prod");
        match target.resources {
            TargetResources::Stack { stack_name, .. } => {
                assert_eq!(stack_name, "TriviaGameBackendProd")
            }
            other => panic!("Expected stack target, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_stack_name() {
        let settings = TemplateSettings::new("Trivia Game", "Backend");
        let err = DeploymentTarget::stack(&settings, "Prod").unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidParameter { ref field, .. } if field == "stack_name"));
    }

    #[test]
    fn test_blank_cluster_is_missing() {
        let mut settings = ContainerSettings::new("trivia-backend", "base");
        settings.cluster = " ".to_string();
        assert_eq!(
            DeploymentTarget::container(&settings, "Test").unwrap_err(),
            ConfigurationError::missing("variant.cluster")
        );
    }

    #[test]
    fn test_blank_app_prefix_is_missing() {
        let settings = ContainerSettings::new("", "base");
        assert_eq!(
            DeploymentTarget::container(&settings, "Test").unwrap_err(),
            ConfigurationError::missing("variant.app_prefix")
        );
    }

    #[parameterized(
        prefix = { "", "Backend", "variant.stack_prefix" },
        subject = { "TriviaGame", "  ", "variant.subject" },
        both = { "", "", "variant.stack_prefix" },
    )]
    fn test_blank_stack_segments_are_missing(prefix: &str, subject: &str, field: &str) {
        let settings = TemplateSettings::new(prefix, subject);
        assert_eq!(
            DeploymentTarget::stack(&settings, "Prod").unwrap_err(),
            ConfigurationError::missing(field)
        );
    }

    #[test]
    fn test_padded_segments_are_trimmed() {
        let mut settings = ContainerSettings::new(" trivia-backend ", "base");
        settings.cluster = " default ".to_string();
        let target = DeploymentTarget::container(&settings, "Test").unwrap();
        match target.resources {
            TargetResources::Container { application, .. } => {
                assert_eq!(application, "AppECS-default-trivia-backend-test")
            }
            other => panic!("Expected container target, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_deployment_name() {
        let settings = ContainerSettings::new("trivia/backend", "base");
        let err = DeploymentTarget::container(&settings, "Test").unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidParameter { ref field, .. } if field == "application"));
    }
}
