use crate::topology::builder::{BUILD_STAGE, REGISTRY_AUTH_OPERATION, SOURCE_STAGE};
use crate::topology::error::ConfigurationError;
use crate::topology::model::{ActionKind, PipelineSpec};
use std::collections::{HashMap, HashSet};

pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn validate(&self, spec: &PipelineSpec) -> Result<(), ConfigurationError>;
}

pub struct UniqueStageNamesRule;

impl ValidationRule for UniqueStageNamesRule {
    fn name(&self) -> &'static str {
        "UniqueStageNames"
    }

    fn validate(&self, spec: &PipelineSpec) -> Result<(), ConfigurationError> {
        let mut seen = HashSet::new();
        for stage in &spec.stages {
            if !seen.insert(stage.name.as_str()) {
                return Err(ConfigurationError::DuplicateStage(stage.name.clone()));
            }
        }
        Ok(())
    }
}

/// Source first, Build second, then at least one deployment stage
pub struct StageOrderRule;

impl ValidationRule for StageOrderRule {
    fn name(&self) -> &'static str {
        "StageOrder"
    }

    fn validate(&self, spec: &PipelineSpec) -> Result<(), ConfigurationError> {
        if spec.stages.len() < 3 {
            return Err(ConfigurationError::StageOrder(format!(
                "expected Source, Build and at least one deployment stage, got {} stage(s)",
                spec.stages.len()
            )));
        }

        for (idx, stage) in spec.stages.iter().enumerate() {
            if stage.actions.is_empty() {
                return Err(ConfigurationError::StageOrder(format!(
                    "stage '{}' has no actions",
                    stage.name
                )));
            }
            for action in &stage.actions {
                let allowed = match idx {
                    0 => matches!(
                        action.kind,
                        ActionKind::SourceFetch(_) | ActionKind::ImageSource(_)
                    ),
                    1 => matches!(action.kind, ActionKind::ContainerizedBuild(_)),
                    _ => matches!(
                        action.kind,
                        ActionKind::TemplateChangePrepare(_)
                            | ActionKind::TemplateChangeExecute(_)
                            | ActionKind::ContainerBlueGreenDeploy(_)
                    ),
                };
                if !allowed {
                    return Err(ConfigurationError::StageOrder(format!(
                        "action '{}' ({}) does not belong in stage '{}' at position {}",
                        action.name,
                        action.kind.label(),
                        stage.name,
                        idx + 1
                    )));
                }
            }
        }

        if spec.stages[0].name != SOURCE_STAGE {
            return Err(ConfigurationError::StageOrder(format!(
                "first stage must be '{}', got '{}'",
                SOURCE_STAGE, spec.stages[0].name
            )));
        }
        if spec.stages[1].name != BUILD_STAGE {
            return Err(ConfigurationError::StageOrder(format!(
                "second stage must be '{}', got '{}'",
                BUILD_STAGE, spec.stages[1].name
            )));
        }
        Ok(())
    }
}

/// Every artifact has one producer, and it runs before every consumer.
///
/// Within a stage, a consumer must have a strictly higher run-order than the
/// producer, otherwise the engine may run both at once.
pub struct ArtifactLineageRule;

impl ValidationRule for ArtifactLineageRule {
    fn name(&self) -> &'static str {
        "ArtifactLineage"
    }

    fn validate(&self, spec: &PipelineSpec) -> Result<(), ConfigurationError> {
        // artifact -> (producing action, stage index, run order)
        let mut producers: HashMap<&str, (&str, usize, u32)> = HashMap::new();
        for (stage_idx, stage) in spec.stages.iter().enumerate() {
            for action in &stage.actions {
                for output in &action.outputs {
                    if let Some((first, _, _)) = producers.get(output.name()) {
                        return Err(ConfigurationError::DuplicateArtifact {
                            artifact: output.name().to_string(),
                            first: first.to_string(),
                            second: action.name.clone(),
                        });
                    }
                    producers.insert(
                        output.name(),
                        (action.name.as_str(), stage_idx, action.run_order),
                    );
                }
            }
        }

        for (stage_idx, stage) in spec.stages.iter().enumerate() {
            for action in &stage.actions {
                for input in action.consumed_artifacts() {
                    let produced_earlier = match producers.get(input.name()) {
                        Some(&(_, p_stage, p_order)) => {
                            p_stage < stage_idx
                                || (p_stage == stage_idx && p_order < action.run_order)
                        }
                        None => false,
                    };
                    if !produced_earlier {
                        return Err(ConfigurationError::DanglingArtifact {
                            action: action.name.clone(),
                            artifact: input.name().to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Each prepare has a later execute on the same stack and change set, and vice versa
pub struct ChangeSetPairingRule;

impl ValidationRule for ChangeSetPairingRule {
    fn name(&self) -> &'static str {
        "ChangeSetPairing"
    }

    fn validate(&self, spec: &PipelineSpec) -> Result<(), ConfigurationError> {
        for stage in &spec.stages {
            let prepares: Vec<_> = stage
                .actions
                .iter()
                .filter_map(|a| match &a.kind {
                    ActionKind::TemplateChangePrepare(p) => {
                        Some((a, p.stack_name.as_str(), p.change_set_name.as_str()))
                    }
                    _ => None,
                })
                .collect();
            let executes: Vec<_> = stage
                .actions
                .iter()
                .filter_map(|a| match &a.kind {
                    ActionKind::TemplateChangeExecute(e) => {
                        Some((a, e.stack_name.as_str(), e.change_set_name.as_str()))
                    }
                    _ => None,
                })
                .collect();

            for (prepare, stack, change_set) in &prepares {
                let paired = executes.iter().find(|(_, s, c)| s == stack && c == change_set);
                match paired {
                    None => {
                        return Err(ConfigurationError::ChangeSetMismatch {
                            stage: stage.name.clone(),
                            reason: format!(
                                "change set '{}' on '{}' is prepared but never executed",
                                change_set, stack
                            ),
                        })
                    }
                    Some((execute, _, _)) if execute.run_order <= prepare.run_order => {
                        return Err(ConfigurationError::ChangeSetMismatch {
                            stage: stage.name.clone(),
                            reason: format!(
                                "'{}' (run order {}) must run after '{}' (run order {})",
                                execute.name, execute.run_order, prepare.name, prepare.run_order
                            ),
                        })
                    }
                    Some(_) => {}
                }
            }

            for (execute, stack, change_set) in &executes {
                if !prepares.iter().any(|(_, s, c)| s == stack && c == change_set) {
                    return Err(ConfigurationError::ChangeSetMismatch {
                        stage: stage.name.clone(),
                        reason: format!(
                            "'{}' executes change set '{}' on '{}' which this stage never prepares",
                            execute.name, change_set, stack
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Wildcard resources only for operations that cannot be scoped
pub struct ScopedPermissionsRule;

impl ValidationRule for ScopedPermissionsRule {
    fn name(&self) -> &'static str {
        "ScopedPermissions"
    }

    fn validate(&self, spec: &PipelineSpec) -> Result<(), ConfigurationError> {
        for (_, action) in spec.actions() {
            let ActionKind::ContainerizedBuild(ref build) = action.kind else {
                continue;
            };
            for statement in build.permissions.iter().filter(|s| s.is_wildcard()) {
                if let Some(operation) = statement
                    .operations
                    .iter()
                    .find(|op| op.as_str() != REGISTRY_AUTH_OPERATION)
                {
                    return Err(ConfigurationError::UnscopedPermission {
                        action: action.name.clone(),
                        operation: operation.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
