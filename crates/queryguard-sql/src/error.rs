//! Error types for queryguard-sql

use thiserror::Error;

/// SQL parsing errors
#[derive(Error, Debug)]
pub enum SqlError {
    /// SQL parse error
    #[error("SQL parse error: {message}")]
    ParseError { message: String },

    /// Empty SQL
    #[error("SQL is empty")]
    EmptySql,

    /// SQL statement exceeds the backend's fixed byte cap (spec: 8192 bytes, v1)
    #[error("SQL statement of {actual} bytes exceeds the {limit}-byte cap")]
    TooLarge { actual: usize, limit: usize },
}

/// Result type alias for SqlError
pub type SqlResult<T> = Result<T, SqlError>;
