//! Service-layer error taxonomy.
//!
//! Everything the domain modules surface to a transport adapter maps onto
//! one of these variants: `Validation` → 400, `NotFound` → 404,
//! `Forbidden` → 403, `Database` → 500.

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed or missing input. `valid` carries the accepted values
    /// when the rejected field is a closed set.
    #[error("{message}")]
    Validation {
        message: String,
        valid: Option<Vec<&'static str>>,
    },

    /// The referenced row does not exist or does not belong to the given
    /// patient. Ownership failures are indistinguishable from absence.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Attempt to mutate an immutable (non-note) event.
    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation {
            message: message.into(),
            valid: None,
        }
    }

    pub fn invalid_choice(message: impl Into<String>, valid: &[&'static str]) -> Self {
        DomainError::Validation {
            message: message.into(),
            valid: Some(valid.to_vec()),
        }
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        DomainError::NotFound { entity, id }
    }
}

impl From<rusqlite::Error> for DomainError {
    fn from(err: rusqlite::Error) -> Self {
        DomainError::Database(DatabaseError::Sqlite(err))
    }
}
