//! Error types for pools and singleton registries

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Non-public constructor not found for {0}")]
    ConstructorNotFound(&'static str),

    #[error("Object creation failed: {0}")]
    CreationFailed(String),

    #[error("Registry slot for {0} holds a value of another type")]
    TypeMismatch(&'static str),

    #[error("No host environment is configured for this context")]
    HostNotConfigured,

    #[error("Global context is not initialized")]
    ContextNotInitialized,

    #[error("Global context is already initialized")]
    ContextAlreadyInitialized,

    #[error("Operation was cancelled")]
    Cancelled,
}

pub type PoolResult<T> = Result<T, PoolError>;
