//! Error types for the managed certificate controller

use thiserror::Error;

use crate::provider::ProviderError;

#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// Provisioning backend error (not found, quota exceeded, generic failure)
    #[error("Provider error: {0}")]
    ProviderError(#[from] ProviderError),

    /// Invalid ManagedCertificate spec
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Invalid controller configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Rebuilding the state store at startup failed
    #[error("Could not initialize state: {0}")]
    StateInitializationError(String),

    /// The ManagedCertificate cache never reported itself as synced
    #[error("Timed out waiting for ManagedCertificate cache sync after {0:?}")]
    CacheSyncTimeout(std::time::Duration),

    /// A supervised loop terminated unexpectedly
    #[error("Controller loop {0} terminated: {1}")]
    LoopTerminated(String, String),
}

impl Error {
    /// Whether a reconcile failing with this error should be retried with backoff
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::KubeError(_) | Error::ProviderError(_) => true,
            Error::ValidationError(_)
            | Error::ConfigError(_)
            | Error::StateInitializationError(_)
            | Error::CacheSyncTimeout(_)
            | Error::LoopTerminated(..) => false,
        }
    }

    /// Whether this error must abort the controller instead of a single reconcile
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::StateInitializationError(_)
                | Error::CacheSyncTimeout(_)
                | Error::LoopTerminated(..)
        )
    }

    /// Short label used for the reconcile error metric
    pub fn kind(&self) -> &'static str {
        match self {
            Error::KubeError(_) => "kube",
            Error::ProviderError(ProviderError::NotFound(_)) => "not_found",
            Error::ProviderError(ProviderError::QuotaExceeded(_)) => "quota_exceeded",
            Error::ProviderError(ProviderError::Backend(_)) => "backend",
            Error::ValidationError(_) => "validation",
            Error::ConfigError(_) => "config",
            Error::StateInitializationError(_) => "state_init",
            Error::CacheSyncTimeout(_) => "cache_sync",
            Error::LoopTerminated(..) => "loop_terminated",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
