use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("col_ref must not be empty")]
    EmptyColRef,

    #[error("a NULL value entry must carry a zero-length value")]
    NullWithNonemptyValue,

    #[error("token index overflowed u32")]
    IndexOverflow,

    #[error("malformed token: missing `tok_` prefix")]
    MissingPrefix,

    #[error("malformed token: could not locate generation/index separators")]
    MissingSeparators,

    #[error("malformed token: generation field is not a valid u32")]
    InvalidGeneration,

    #[error("malformed token: index field is not a valid u32")]
    InvalidIndex,

    #[error("malformed token: connection name must be 1..={max} bytes")]
    ConnectionNameLength { max: usize },

    #[error("no entry at index {0} in this store")]
    UnknownIndex(u32),

    #[error("token's connection name does not match this store")]
    ConnectionMismatch,
}

pub type TokenResult<T> = Result<T, TokenError>;
