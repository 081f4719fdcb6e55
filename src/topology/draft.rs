//! Mutable pipeline under assembly

use super::error::ConfigurationError;
use super::model::{NotificationRule, PipelineSpec, Stage};
use super::naming::{resource_label, stage_label};
use crate::validation::Validator;
use tracing::debug;

/// Collects stages while a pipeline is being assembled.
///
/// A draft only becomes a [`PipelineSpec`] through [`PipelineDraft::finish`],
/// which runs the validator first; a failing draft is dropped whole.
#[derive(Debug)]
pub struct PipelineDraft {
    name: String,
    variant: String,
    stages: Vec<Stage>,
    notification: Option<NotificationRule>,
}

impl PipelineDraft {
    pub fn new(name: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variant: variant.into(),
            stages: Vec::new(),
            notification: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn push_stage(&mut self, stage: Stage) -> Result<(), ConfigurationError> {
        if self.stages.iter().any(|s| s.name == stage.name) {
            return Err(ConfigurationError::DuplicateStage(stage.name));
        }
        debug!(
            pipeline = %self.name,
            stage = %stage.name,
            actions = stage.actions.len(),
            "Stage added"
        );
        self.stages.push(stage);
        Ok(())
    }

    /// Checks that `label` names a new environment and returns its stage name.
    ///
    /// Labels compare case-insensitively because resource names are derived
    /// from the lower-cased label.
    pub fn claim_label(&self, label: &str) -> Result<String, ConfigurationError> {
        let normalized = resource_label(label);
        if normalized.is_empty() {
            return Err(ConfigurationError::EmptyLabel);
        }
        if let Some(existing) = self
            .stages
            .iter()
            .find(|s| s.name.to_lowercase() == normalized)
        {
            return Err(ConfigurationError::DuplicateLabel {
                label: label.to_string(),
                existing: existing.name.clone(),
            });
        }
        Ok(stage_label(label))
    }

    pub fn set_notification(&mut self, rule: NotificationRule) {
        self.notification = Some(rule);
    }

    pub fn finish(self, validator: &Validator) -> Result<PipelineSpec, ConfigurationError> {
        let spec = PipelineSpec {
            name: self.name,
            variant: self.variant,
            stages: self.stages,
            notification: self.notification,
        };
        validator.validate(&spec)?;
        Ok(spec)
    }
}
