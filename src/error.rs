// src/error.rs
//! Error handling for the physics core.
//!
//! Nothing inside a fixed step returns these: flush phases skip stale work and log it.
//! Errors surface only from the gameplay-facing lifecycle calls and from initialization.

use thiserror::Error;

use crate::components::{ColliderId, RigidId};
use crate::scene::GameObjectId;

/// A handle that failed its liveness lookup.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaleHandle {
    #[error("game object {0:?} is no longer alive")]
    GameObject(GameObjectId),

    #[error("rigid body {0:?} is no longer alive")]
    Rigid(RigidId),

    #[error("collider {0:?} is no longer alive")]
    Collider(ColliderId),
}

/// Main error type for the crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Config file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid physics config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Stale(#[from] StaleHandle),

    /// A second rigid body was added to a game object that already has one.
    #[error("game object {0:?} already has a rigid body")]
    DuplicateRigidBody(GameObjectId),

    /// Attach was attempted before the rigid body was registered with the scene.
    #[error("rigid body {0:?} is not registered with the physics scene")]
    RigidNotRegistered(RigidId),

    #[error("invalid collider geometry: {0}")]
    InvalidGeometry(String),

    #[error("physics manager is not initialized")]
    NotInitialized,
}

impl Error {
    #[inline]
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    #[inline]
    pub fn is_stale(&self) -> bool {
        matches!(self, Error::Stale(_))
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_handles_convert_and_classify() {
        let err: Error = StaleHandle::Rigid(RigidId::from_bits(3)).into();
        assert!(err.is_stale());
        assert!(!Error::NotInitialized.is_stale());
    }

    #[test]
    fn config_errors_carry_message() {
        let err = Error::invalid_config("fixed_dt must be positive");
        assert_eq!(err.to_string(), "invalid physics config: fixed_dt must be positive");
    }
}
