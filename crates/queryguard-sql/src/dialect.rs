//! SQL dialect abstraction
//!
//! v1 only ships the Postgres dialect (spec: "type ... only `\"postgres\"`
//! in v1"), but the trait is kept open the way the teacher repo keeps a
//! `SqlDialect` trait open across DuckDB and Snowflake — a future backend
//! adds a dialect without touching the parser wrapper.

use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, PostgreSqlDialect as SqlParserPostgres};
use sqlparser::parser::Parser;

use crate::error::{SqlError, SqlResult};

/// Trait for SQL dialect implementations
pub trait SqlDialect: Send + Sync {
    /// Get the underlying sqlparser dialect
    fn parser_dialect(&self) -> &dyn Dialect;

    /// Parse SQL into AST statements
    fn parse(&self, sql: &str) -> SqlResult<Vec<Statement>> {
        Parser::parse_sql(self.parser_dialect(), sql)
            .map_err(|e| SqlError::ParseError { message: e.to_string() })
    }

    /// Get the dialect name
    fn name(&self) -> &'static str;
}

/// PostgreSQL SQL dialect — the only backend supported in v1.
pub struct PostgresDialect {
    dialect: SqlParserPostgres,
}

impl PostgresDialect {
    pub fn new() -> Self {
        Self {
            dialect: SqlParserPostgres {},
        }
    }
}

impl Default for PostgresDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlDialect for PostgresDialect {
    fn parser_dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_parse() {
        let dialect = PostgresDialect::new();
        let stmts = dialect.parse("SELECT * FROM users").unwrap();
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn test_parse_error_surfaces() {
        let dialect = PostgresDialect::new();
        assert!(dialect.parse("SELECT FROM").is_err());
    }
}
