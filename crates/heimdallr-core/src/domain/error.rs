//! Domain-level error taxonomy for Heimdallr.

/// Heimdallr domain errors.
#[derive(Debug, thiserror::Error)]
pub enum HeimdallrError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown step: {0}")]
    UnknownStep(String),

    #[error("step {step} missing required parameters: {missing:?}")]
    MissingParameters { step: String, missing: Vec<String> },

    #[error("task executor error: {0}")]
    Executor(#[from] crate::executor::ExecutorError),

    #[error("response parse error: {0}")]
    ResponseParse(String),

    #[error("dependency cycle among requested steps: {steps:?}")]
    DependencyCycle { steps: Vec<String> },

    #[error("coordination error: {0}")]
    Coordination(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config file error: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Heimdallr domain operations.
pub type Result<T> = std::result::Result<T, HeimdallrError>;
