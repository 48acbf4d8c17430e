//! Error types and handling
//!
//! Errors are grouped by subsystem so callers can match on the domain that
//! failed (configuration, container runtime, feature resolution, ...)
//! instead of parsing message strings.

use thiserror::Error;

/// Top-level error type for the orchestration core.
#[derive(Error, Debug)]
pub enum PacknplayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Docker(#[from] DockerError),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    /// A lifecycle command exited non-zero.
    #[error("lifecycle command failed: {0}")]
    Lifecycle(String),

    /// Catch-all for orchestration failures that don't belong to a
    /// specific subsystem.
    #[error("{0}")]
    Runtime(String),

    #[error("workspace error: {0}")]
    Workspace(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("compose error: {0}")]
    Compose(String),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl PacknplayError {
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }

    pub fn workspace(message: impl Into<String>) -> Self {
        Self::Workspace(message.into())
    }

    pub fn credential(message: impl Into<String>) -> Self {
        Self::Credential(message.into())
    }

    pub fn compose(message: impl Into<String>) -> Self {
        Self::Compose(message.into())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("devcontainer configuration not found starting from {path}")]
    NotFound { path: String },

    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {message}")]
    Parsing { message: String },

    #[error("invalid configuration: {message}")]
    Validation { message: String },

    #[error("unsupported configuration feature: {feature}")]
    NotImplemented { feature: String },
}

#[derive(Error, Debug)]
pub enum DockerError {
    #[error("container runtime CLI error: {0}")]
    CliError(String),

    #[error("container runtime command exited with status {code}")]
    ExecFailed { code: i32 },

    #[error("container runtime not found on PATH: {runtime}")]
    NotFound { runtime: String },

    #[error("container not found: {name}")]
    ContainerNotFound { name: String },
}

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("feature not found: {path}")]
    NotFound { path: String },

    #[error("failed to read feature: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse feature metadata: {message}")]
    Parsing { message: String },

    #[error("invalid feature metadata: {message}")]
    Validation { message: String },

    #[error("feature dependency cycle detected among: {ids}")]
    DependencyCycle { ids: String },

    #[error("failed to fetch feature {reference}: {message}")]
    FetchFailed { reference: String, message: String },
}

#[derive(Error, Debug)]
pub enum InternalError {
    #[error("internal error: {message}")]
    Generic { message: String },
}

impl InternalError {
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }
}

/// Convenience type alias for Results with [`PacknplayError`].
pub type Result<T> = std::result::Result<T, PacknplayError>;
