//! Error types for the embedding runtime.

/// Errors surfaced by a run.
///
/// Variants carrying a `String` hold the aggregated, newline-joined
/// diagnostics of the step that failed. [`RuntimeError::message`] returns that
/// text without the variant prefix.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("Process initialization failed: {0}")]
    Initialization(String),

    #[error("Failed to create environment: {0}")]
    EnvironmentCreation(String),

    #[error("Failed to register native module: {0}")]
    ModuleRegistration(String),

    #[error("Failed to load bootstrap: {0}")]
    BootstrapLoad(String),

    #[error("Invalid run options: {0}")]
    InvalidOptions(String),

    #[error("An environment is already running")]
    AlreadyRunning,

    #[error("Environment exited with a non-zero exit code ({code})")]
    NonZeroExit { code: i32 },
}

impl RuntimeError {
    /// The diagnostic text carried by this error.
    pub fn message(&self) -> String {
        match self {
            RuntimeError::Initialization(msg)
            | RuntimeError::EnvironmentCreation(msg)
            | RuntimeError::ModuleRegistration(msg)
            | RuntimeError::BootstrapLoad(msg)
            | RuntimeError::InvalidOptions(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// Errors from converting a stop status into a `Result`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StopError {
    #[error("Failed to stop: no environment is running")]
    NotRunning,

    #[error("Failed to stop (code: {code})")]
    Failed { code: i32 },
}
