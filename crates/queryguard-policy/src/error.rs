use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("config is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("`databases` must be a non-empty list")]
    EmptyDatabases,

    #[error("duplicate connection name (case-insensitive): {0}")]
    DuplicateConnectionName(String),

    #[error("connectionName `{0}` is {1} bytes; the token wire format allows at most {2} bytes")]
    ConnectionNameTooLong(String, usize, usize),

    #[error("unsupported database type `{0}`; only \"postgres\" is supported in v1")]
    UnsupportedDatabaseType(String),

    #[error("invalid `readOnly` value `{0}`; expected yes/no or a recognized synonym")]
    InvalidReadOnly(String),

    #[error("`maxQueryKiloBytes` is a legacy key and is no longer accepted; use `maxPayloadKiloBytes`")]
    LegacyMaxQueryKiloBytes,

    #[error("malformed column spec `{0}`; expected \"[schema.]table.column\"")]
    InvalidColumnSpec(String),

    #[error("malformed function spec `{0}`; expected \"[schema.]name\"")]
    InvalidFunctionSpec(String),
}

pub type PolicyResult<T> = Result<T, PolicyError>;
