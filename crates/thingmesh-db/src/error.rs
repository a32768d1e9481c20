//! Database-specific error types and conversions.

use std::collections::HashMap;

use thingmesh_core::error::Error;
use tracing::error;

/// Marker used by `THROW` guards inside transactions, followed by the
/// name of the missing parent entity.
pub(crate) const MISSING_MARKER: &str = "missing:";

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Unique constraint violated on {entity}: {detail}")]
    Conflict { entity: String, detail: String },

    #[error("Query on {entity} failed: {detail}")]
    Query { entity: String, detail: String },

    #[error("Corrupt {entity} record: {detail}")]
    Corrupt { entity: String, detail: String },
}

impl DbError {
    pub(crate) fn corrupt(entity: &str, detail: impl ToString) -> Self {
        DbError::Corrupt {
            entity: entity.into(),
            detail: detail.to_string(),
        }
    }

    /// Classify a single statement failure reported by SurrealDB.
    fn classify(entity: &str, message: String) -> Self {
        if message.contains("already contains") || message.contains("already exists") {
            return DbError::Conflict {
                entity: entity.into(),
                detail: message,
            };
        }
        if let Some(pos) = message.find(MISSING_MARKER) {
            let missing: String = message[pos + MISSING_MARKER.len()..]
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect();
            return DbError::NotFound {
                entity: missing,
                id: String::new(),
            };
        }
        DbError::Query {
            entity: entity.into(),
            detail: message,
        }
    }
}

/// Turn the per-statement errors of a response into one error.
///
/// When a transaction fails, SurrealDB reports the statements it did not
/// run as "not executed"; the statement that actually failed carries the
/// cause, so the most specific classification wins.
pub(crate) fn check_statements(
    entity: &str,
    errors: HashMap<usize, surrealdb::Error>,
) -> Result<(), DbError> {
    if errors.is_empty() {
        return Ok(());
    }

    let mut ordered: Vec<_> = errors.into_iter().collect();
    ordered.sort_by_key(|(idx, _)| *idx);

    let mut fallback: Option<String> = None;
    for (_, err) in ordered {
        match DbError::classify(entity, err.to_string()) {
            DbError::Query { detail, .. } => {
                let better = fallback.as_ref().is_none_or(|f| {
                    f.contains("not executed") && !detail.contains("not executed")
                });
                if better {
                    fallback = Some(detail);
                }
            }
            specific => return Err(specific),
        }
    }

    Err(DbError::Query {
        entity: entity.into(),
        detail: fallback.unwrap_or_default(),
    })
}

impl From<DbError> for Error {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => Error::NotFound { entity, id },
            DbError::Conflict { entity, .. } => Error::Conflict { entity },
            other => {
                // Storage details stay in the log; callers get an opaque error.
                error!(error = %other, "storage failure");
                Error::Internal("storage failure".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use thingmesh_core::ErrorKind;

    use super::*;

    #[test]
    fn unique_index_violation_is_conflict() {
        let err = DbError::classify(
            "thing",
            "Database index `idx_thing_key` already contains 'k1', with record `thing:abc`".into(),
        );
        assert!(matches!(err, DbError::Conflict { .. }));
        assert_eq!(Error::from(err).kind(), ErrorKind::Conflict);
    }

    #[test]
    fn existing_record_is_conflict() {
        let err = DbError::classify("group", "Database record `group:x` already exists".into());
        assert!(matches!(err, DbError::Conflict { .. }));
    }

    #[test]
    fn throw_guard_is_not_found() {
        let err = DbError::classify("thing", "An error occurred: missing:group".into());
        match err {
            DbError::NotFound { entity, .. } => assert_eq!(entity, "group"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn other_failures_are_opaque() {
        let err = DbError::classify("thing", "connection reset".into());
        let core: Error = err.into();
        assert_eq!(core.kind(), ErrorKind::Internal);
        assert!(!core.to_string().contains("connection reset"));
    }
}
