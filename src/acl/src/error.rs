//! Error types for the access-control engine

use crate::types::{NodeId, NodeKind};
use thiserror::Error;

/// Access-control errors
#[derive(Debug, Error)]
pub enum AclError {
    /// A node id or rule field is not a usable identifier
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A node with this id is already registered for its kind
    #[error("Duplicate {kind}: {id}")]
    DuplicateNode { kind: NodeKind, id: NodeId },

    /// The id is not registered and could not be materialized
    #[error("{kind} {id} is unknown")]
    UnknownElement { kind: NodeKind, id: NodeId },

    /// Policy value outside the accepted set
    #[error("Invalid policy value: {0}")]
    InvalidPolicyValue(String),

    /// NOINHERIT combined with a role or an action
    #[error("Structural conflict: {0}")]
    StructuralConflict(String),

    /// Action rejected by the configured validator
    #[error("Action can not be validated: {0}")]
    ValidationFailed(String),

    /// External id kind name registered twice
    #[error("Cannot register the same name twice: {0}")]
    DuplicateRegistration(String),

    /// Compound id is not of the form `<kind>#<key>`
    #[error("Invalid external id: {0}")]
    InvalidExternalId(String),

    /// Compound id refers to a kind name that was never registered
    #[error("Unknown class: {0}")]
    UnknownClass(String),

    /// Configuration could not be parsed or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure raised by a loader or validator implementation
    #[error(transparent)]
    Collaborator(Box<dyn std::error::Error + Send + Sync>),
}

impl AclError {
    /// Wrap an error raised by a collaborator (rule store, record loader, ...)
    pub fn collaborator<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Collaborator(err.into())
    }

    pub(crate) fn unknown(kind: NodeKind, id: &NodeId) -> Self {
        Self::UnknownElement {
            kind,
            id: id.clone(),
        }
    }
}

/// Result type for access-control operations
pub type Result<T> = std::result::Result<T, AclError>;
