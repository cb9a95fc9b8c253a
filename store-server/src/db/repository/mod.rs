//! Repository Module
//!
//! Raw SQL access to the collaborator tables, one module per table.
//! Queries use runtime binds so the crate builds without a live database.

pub mod address;
pub mod cart;

use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepoError::NotFound("row".to_string()),
            other => RepoError::Database(other.to_string()),
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;
