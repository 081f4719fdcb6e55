use crate::topology::error::ConfigurationError;
use crate::topology::model::PipelineSpec;
use crate::validation::rules::{
    ArtifactLineageRule, ChangeSetPairingRule, ScopedPermissionsRule, StageOrderRule,
    UniqueStageNamesRule, ValidationRule,
};
use serde::Serialize;
use tracing::{debug, warn};

/// Result of one rule against one pipeline
#[derive(Debug, Clone, Serialize)]
pub struct RuleOutcome {
    pub rule: &'static str,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: Vec<Box<dyn ValidationRule>>) -> Self {
        Self { rules }
    }

    /// Stops at the first failing rule
    pub fn validate(&self, spec: &PipelineSpec) -> Result<(), ConfigurationError> {
        for rule in &self.rules {
            if let Err(e) = rule.validate(spec) {
                warn!(pipeline = %spec.name, rule = rule.name(), error = %e, "Validation failed");
                return Err(e);
            }
            debug!(pipeline = %spec.name, rule = rule.name(), "Rule passed");
        }
        Ok(())
    }

    /// Runs every rule and reports each outcome
    pub fn report(&self, spec: &PipelineSpec) -> Vec<RuleOutcome> {
        self.rules
            .iter()
            .map(|rule| match rule.validate(spec) {
                Ok(()) => RuleOutcome {
                    rule: rule.name(),
                    passed: true,
                    error: None,
                },
                Err(e) => RuleOutcome {
                    rule: rule.name(),
                    passed: false,
                    error: Some(e.to_string()),
                },
            })
            .collect()
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            rules: vec![
                Box::new(UniqueStageNamesRule),
                Box::new(StageOrderRule),
                Box::new(ArtifactLineageRule),
                Box::new(ChangeSetPairingRule),
                Box::new(ScopedPermissionsRule),
            ],
        }
    }
}
