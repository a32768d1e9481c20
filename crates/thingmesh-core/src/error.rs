//! Error types for the Thingmesh system.

use thiserror::Error;

/// Machine-readable classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authentication,
    Authorization,
    NotFound,
    Validation,
    Conflict,
    Internal,
}

/// Input rejected before any storage access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name is empty or exceeds the maximum size")]
    NameSize,

    #[error("empty list provided")]
    EmptyList,

    #[error("invalid role")]
    InvalidRole,

    #[error("missing member id")]
    MissingMemberId,

    #[error("missing entity id")]
    MissingId,

    #[error("missing thing key")]
    MissingKey,

    #[error("limit is out of range")]
    LimitSize,

    #[error("offset must not be negative")]
    OffsetSize,

    #[error("invalid order field")]
    InvalidOrder,

    #[error("invalid order direction")]
    InvalidDirection,

    #[error("malformed entity: {0}")]
    MalformedEntity(String),

    #[error("metadata must be a JSON object")]
    InvalidMetadata,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication failed: {reason}")]
    Authentication { reason: String },

    #[error("Authorization denied: {reason}")]
    Authorization { reason: String },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Entity already exists: {entity}")]
    Conflict { entity: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Authentication { .. } => ErrorKind::Authentication,
            Error::Authorization { .. } => ErrorKind::Authorization,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Conflict { .. } => ErrorKind::Conflict,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Error::Authorization {
            reason: reason.into(),
        }
    }

    pub fn conflict(entity: &str) -> Self {
        Error::Conflict {
            entity: entity.into(),
        }
    }
}

pub type MeshResult<T> = Result<T, Error>;
