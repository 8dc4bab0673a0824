//! Shared error type for cross-cutting, non-validation failures.

use thiserror::Error;

/// Errors that do not belong to a single crate's narrower error type
/// (`PolicyError`, `TokenError`, `SqlError`, `ValidationError`) but can
/// surface at the seams between them.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The SQL submitted by the agent exceeds the backend's fixed byte cap
    /// (spec: 8192 bytes in v1), checked before the parser collaborator runs.
    #[error("SQL statement of {actual} bytes exceeds the {limit}-byte cap")]
    SqlTooLarge { actual: usize, limit: usize },

    /// Submitted SQL was not valid UTF-8.
    #[error("SQL statement is not valid UTF-8")]
    InvalidUtf8,

    /// The named connection profile does not exist in the loaded catalog.
    #[error("unknown connection profile: {0}")]
    UnknownProfile(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
