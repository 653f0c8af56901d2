//! Error types for bounded mapping.

use thiserror::Error;

/// Rejected configuration. Raised before any work is launched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("concurrency must be at least 1, got {0}")]
    InvalidConcurrency(i64),

    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },
}

/// Gate failure. Defensive only: a live gate owns a sender of its own token
/// channel, so the channel cannot close while anyone can call `acquire`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("Admission gate closed")]
    Closed,
}

/// Failure of a bounded map.
///
/// Only the first failure observed (by completion order) is reported.
#[derive(Debug, Error)]
pub enum MapError<E> {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("transform failed for input {index}")]
    Transform {
        index: usize,
        #[source]
        source: E,
    },

    #[error("transform panicked for input {index}: {message}")]
    Panicked { index: usize, message: String },

    /// Not produced while the mapper's gate is alive; see [`GateError`].
    #[error(transparent)]
    Gate(#[from] GateError),
}

impl<E> MapError<E> {
    /// Input index of the failed unit of work, if the failure belongs to one.
    pub fn index(&self) -> Option<usize> {
        match self {
            MapError::Transform { index, .. } | MapError::Panicked { index, .. } => Some(*index),
            MapError::Config(_) | MapError::Gate(_) => None,
        }
    }

    /// Recover the original transform error.
    pub fn into_transform_error(self) -> Option<E> {
        match self {
            MapError::Transform { source, .. } => Some(source),
            _ => None,
        }
    }
}
