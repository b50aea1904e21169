use thiserror::Error;

/// Core error type for the reporting workflow
///
/// Expected user mistakes never show up here: they are reported as field
/// errors on the stage that received them. A `CoreError` means the store, a
/// collaborator, the configuration, or the caller itself misbehaved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Session store error
    #[error("Session store error: {0}")]
    SessionStoreError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// External collaborator error (geocoder, CESCO, registry, mailer, renderer)
    #[error("Collaborator error ({collaborator}): {message}")]
    CollaboratorError {
        /// Name of the collaborator that failed
        collaborator: String,
        /// Failure description
        message: String,
    },

    /// Collaborator did not answer in time
    #[error("Collaborator timed out ({0})")]
    CollaboratorTimeout(String),

    /// The caller broke a contract of the API (wrong input for a stage, ...)
    #[error("Precondition violation: {0}")]
    PreconditionViolation(String),

    /// Workflow is in a state that does not allow the operation
    #[error("Workflow error: {0}")]
    WorkflowError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Build a collaborator error
    pub fn collaborator(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::CollaboratorError {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for CoreError {
    fn from(err: serde_yaml::Error) -> Self {
        CoreError::ConfigurationError(err.to_string())
    }
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Other(err)
    }
}

impl From<&str> for CoreError {
    fn from(err: &str) -> Self {
        CoreError::Other(err.to_string())
    }
}
