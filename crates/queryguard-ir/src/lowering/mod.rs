//! Lowering: converts a parsed `sqlparser::ast::Statement` into the Query
//! IR. Lowering never fails — anything it cannot model precisely becomes
//! `QueryStatus::Unsupported` or `Expr::Unsupported`, and the validator is
//! the sole component that turns that into a rejection (spec §4.3: the
//! IR's `status` is `UNSUPPORTED` "if it encountered a construct
//! deliberately outside scope").

mod expr;
mod join;
mod query;

pub use query::lower_statement;

use queryguard_core::Identifier;

/// Lowercases and wraps a raw SQL identifier. sqlparser guarantees
/// identifiers are non-empty, so this only panics on a parser bug.
pub(crate) fn ident(raw: &str) -> Identifier {
    Identifier::new(raw)
}

pub(crate) fn ident_from(ident_ast: &sqlparser::ast::Ident) -> Identifier {
    ident(&ident_ast.value)
}
