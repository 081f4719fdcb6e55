//! Assembly-time errors for pipeline topologies.

use thiserror::Error;

/// Errors raised while assembling or checking a pipeline topology.
///
/// All of these are detected before anything is handed to the orchestration
/// service. A builder that returns one of them returns no topology at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A required parameter was absent or empty
    #[error("Missing required parameter: {field}")]
    MissingParameter { field: String },

    /// A parameter was present but not acceptable
    #[error("Invalid value for {field}: {reason}")]
    InvalidParameter { field: String, reason: String },

    /// Two stages in one pipeline share a name
    #[error("Duplicate stage name '{0}'")]
    DuplicateStage(String),

    /// Deployment stage requested with an empty environment label
    #[error("Environment label cannot be empty")]
    EmptyLabel,

    /// Environment label already used in this pipeline
    #[error("Environment label '{label}' collides with '{existing}'")]
    DuplicateLabel { label: String, existing: String },

    /// An action consumes an artifact that no earlier action produces
    #[error("Action '{action}' consumes artifact '{artifact}' which no earlier action produces")]
    DanglingArtifact { action: String, artifact: String },

    /// Two actions produce the same artifact
    #[error("Artifact '{artifact}' is produced by both '{first}' and '{second}'")]
    DuplicateArtifact {
        artifact: String,
        first: String,
        second: String,
    },

    /// Stage sequence does not follow Source, Build, deployments
    #[error("Stage order violated: {0}")]
    StageOrder(String),

    /// Change-set prepare/execute pair is broken
    #[error("Change set mismatch in stage '{stage}': {reason}")]
    ChangeSetMismatch { stage: String, reason: String },

    /// A permission grants wildcard resources to a scopable operation
    #[error("Action '{action}' grants '{operation}' on all resources")]
    UnscopedPermission { action: String, operation: String },
}

impl ConfigurationError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingParameter {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Returns the trimmed value, or `MissingParameter` when it is blank.
pub(crate) fn require<'a>(field: &str, value: &'a str) -> Result<&'a str, ConfigurationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigurationError::missing(field));
    }
    Ok(trimmed)
}
