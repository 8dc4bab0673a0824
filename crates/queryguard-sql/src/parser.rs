//! Parser wrapper: dialect-bound entry point for turning raw SQL text into
//! sqlparser AST statements, enforcing the fixed byte cap ahead of parsing.

use sqlparser::ast::Statement;

use crate::dialect::{PostgresDialect, SqlDialect};
use crate::error::{SqlError, SqlResult};

/// Fixed request-body cap, spec v1: a single SQL statement may not exceed
/// 8192 bytes. The cap is checked before parsing so an oversized statement
/// fails fast with `SqlError::TooLarge` rather than burning parser time.
pub const MAX_SQL_BYTES: usize = 8192;

/// Thin wrapper binding a [`SqlDialect`] to the shared size cap and
/// empty-input check every caller needs before handing SQL to the lowering
/// stage.
pub struct SqlParser<D: SqlDialect> {
    dialect: D,
}

impl SqlParser<PostgresDialect> {
    /// The only dialect wired up in v1.
    pub fn postgres() -> Self {
        Self { dialect: PostgresDialect::new() }
    }
}

impl<D: SqlDialect> SqlParser<D> {
    pub fn new(dialect: D) -> Self {
        Self { dialect }
    }

    pub fn dialect_name(&self) -> &'static str {
        self.dialect.name()
    }

    /// Parse `sql` into zero or more AST statements, after validating size
    /// and non-emptiness.
    pub fn parse(&self, sql: &str) -> SqlResult<Vec<Statement>> {
        check_size(sql)?;
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            return Err(SqlError::EmptySql);
        }
        self.dialect.parse(sql)
    }

    /// Parse `sql`, requiring exactly one statement — the shape the
    /// validator operates on (spec: one statement per request).
    pub fn parse_single(&self, sql: &str) -> SqlResult<Statement> {
        let mut stmts = self.parse(sql)?;
        if stmts.len() != 1 {
            return Err(SqlError::ParseError {
                message: format!("expected exactly one statement, found {}", stmts.len()),
            });
        }
        Ok(stmts.remove(0))
    }
}

fn check_size(sql: &str) -> SqlResult<()> {
    let actual = sql.len();
    if actual > MAX_SQL_BYTES {
        return Err(SqlError::TooLarge { actual, limit: MAX_SQL_BYTES });
    }
    Ok(())
}
