//! Contracts for the components this crate family treats as external
//! collaborators: the backend adapter that actually executes accepted SQL,
//! and the result materializer that tokenizes sensitive cells before a
//! result reaches the agent. Neither has a real implementation here — only
//! the trait surface needed to exercise the validator and token store
//! end-to-end in integration tests against a fake backend.

/// A single bound parameter value, as the request path would substitute it
/// for a `$n` placeholder (either the agent's literal or a detokenized
/// sensitive value looked up in the token store).
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

/// A single result cell, prior to any sensitive-column tokenization.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Byte representation used as token-store dedup input. Mirrors how the
    /// backend would serialize the cell on the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            CellValue::Null => Vec::new(),
            CellValue::Bool(b) => vec![*b as u8],
            CellValue::Int(i) => i.to_be_bytes().to_vec(),
            CellValue::Float(f) => f.to_be_bytes().to_vec(),
            CellValue::Text(s) => s.as_bytes().to_vec(),
            CellValue::Bytes(b) => b.clone(),
        }
    }
}

/// A rectangular result set as the backend adapter would hand it to the
/// result materializer: column names plus row-major cell values.
#[derive(Debug, Clone, Default)]
pub struct QueryResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// Contract for the (out-of-scope) component that executes an accepted,
/// parameter-bound SELECT against a real database connection.
pub trait BackendExecutor: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn execute_select(
        &self,
        sql: &str,
        params: &[ParamValue],
    ) -> Result<QueryResultSet, Self::Error>;
}

/// One output column's disclosure tag. Mirrors `queryguard-validator`'s
/// `PlanEntry` one-for-one; duplicated here rather than imported so this
/// crate, which sits below the validator in the dependency graph, can still
/// describe the materializer contract the validator's output plan feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisclosureTag {
    Plaintext,
    /// `source_col_id` is the canonical "[schema.]table.column" string of
    /// the originating base relation, as minted into the token store.
    Token { source_col_id: String },
}

/// A result set after a materializer has applied an output plan: every
/// `Token`-tagged column's cells replaced by opaque token text, every
/// `Plaintext`-tagged column untouched.
#[derive(Debug, Clone, Default)]
pub struct MaterializedResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// Contract for the (out-of-scope) component that turns a raw
/// [`QueryResultSet`] plus an output plan into the response an agent
/// actually sees: one disclosure tag per output column, in column order.
/// `plan.len()` must equal `results.columns.len()`; implementations may
/// assume the validator already enforced that invariant.
pub trait ResultMaterializer: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn materialize(
        &mut self,
        plan: &[DisclosureTag],
        results: QueryResultSet,
    ) -> Result<MaterializedResultSet, Self::Error>;
}
