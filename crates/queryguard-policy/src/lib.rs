//! queryguard-policy — the Policy Catalog: immutable per-connection
//! sensitivity and safe-function decisions, plus the YAML config loader
//! that builds it.

pub mod catalog;
pub mod config;
pub mod error;

pub use catalog::{
    is_column_sensitive, is_function_safe, ColumnPolicyRule, ColumnStrategy, PolicyCatalogEntry,
    RuleScope, SafeFunctionRule, SafetyPolicy,
};
pub use config::{load_from_path, load_from_str};
pub use error::{PolicyError, PolicyResult};
