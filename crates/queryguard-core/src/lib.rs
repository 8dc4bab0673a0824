//! queryguard-core — shared identifiers, error types, and the backend
//! contract every other crate in the family builds on.

pub mod backend;
pub mod error;
pub mod identifier;

pub use backend::{
    BackendExecutor, CellValue, DisclosureTag, MaterializedResultSet, ParamValue, QueryResultSet, ResultMaterializer,
};
pub use error::{CoreError, CoreResult};
pub use identifier::{ColumnRef, Identifier, QualifiedName};
