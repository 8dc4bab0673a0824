//! queryguard-test — fixture builders shared across the crate family's
//! test suites: a policy catalog entry with a convenient builder, and a
//! one-call SQL-to-IR helper so validator tests read as SQL literals
//! rather than hand-built trees.

use queryguard_core::Identifier;
use queryguard_ir::{lower_statement, Query};
use queryguard_policy::{ColumnPolicyRule, ColumnStrategy, PolicyCatalogEntry, RuleScope, SafeFunctionRule, SafetyPolicy};
use queryguard_sql::SqlParser;

/// Builder for a [`PolicyCatalogEntry`] fixture. Defaults: read-only,
/// `max_rows = 200`, deterministic strategy, no sensitive columns, no safe
/// functions — callers add exactly what their scenario needs.
pub struct PolicyFixture {
    connection_name: String,
    max_rows: u32,
    strategy: ColumnStrategy,
    global_sensitive: Vec<(&'static str, &'static str)>,
    schema_sensitive: Vec<(&'static str, &'static str, &'static [&'static str])>,
    global_safe_functions: Vec<&'static str>,
}

impl Default for PolicyFixture {
    fn default() -> Self {
        Self {
            connection_name: "test_conn".to_string(),
            max_rows: 200,
            strategy: ColumnStrategy::Deterministic,
            global_sensitive: Vec::new(),
            schema_sensitive: Vec::new(),
            global_safe_functions: Vec::new(),
        }
    }
}

impl PolicyFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_name(mut self, name: &str) -> Self {
        self.connection_name = name.to_string();
        self
    }

    pub fn max_rows(mut self, n: u32) -> Self {
        self.max_rows = n;
        self
    }

    pub fn strategy(mut self, s: ColumnStrategy) -> Self {
        self.strategy = s;
        self
    }

    /// Mark `table.column` sensitive in any schema.
    pub fn sensitive(mut self, table: &'static str, column: &'static str) -> Self {
        self.global_sensitive.push((table, column));
        self
    }

    /// Mark `table.column` sensitive only when referenced under one of
    /// `schemas`.
    pub fn sensitive_in_schemas(
        mut self,
        table: &'static str,
        column: &'static str,
        schemas: &'static [&'static str],
    ) -> Self {
        self.schema_sensitive.push((table, column, schemas));
        self
    }

    pub fn safe_function(mut self, name: &'static str) -> Self {
        self.global_safe_functions.push(name);
        self
    }

    pub fn build(self) -> PolicyCatalogEntry {
        let mut column_policy = Vec::new();
        for (table, column) in self.global_sensitive {
            column_policy.push(ColumnPolicyRule {
                table: Identifier::new(table),
                column: Identifier::new(column),
                scope: RuleScope::Global,
            });
        }
        for (table, column, schemas) in self.schema_sensitive {
            column_policy.push(ColumnPolicyRule {
                table: Identifier::new(table),
                column: Identifier::new(column),
                scope: RuleScope::SchemaScoped(schemas.iter().map(|s| Identifier::new(s)).collect()),
            });
        }

        let safe_function_policy = self
            .global_safe_functions
            .into_iter()
            .map(|name| SafeFunctionRule { name: Identifier::new(name), scope: RuleScope::Global })
            .collect();

        PolicyCatalogEntry {
            connection_name: self.connection_name,
            safety_policy: SafetyPolicy {
                read_only: true,
                statement_timeout_ms: 30_000,
                max_rows: self.max_rows,
                max_payload_bytes: 1024 * 1024,
                column_strategy: self.strategy,
            },
            column_policy,
            safe_function_policy,
        }
    }
}

/// Parse and lower one SQL statement through the Postgres dialect,
/// panicking on parse failure — test scenarios hand-write valid SQL, so a
/// parse failure means the test itself is wrong.
pub fn lower_sql(sql: &str) -> Query {
    let parser = SqlParser::postgres();
    let stmt = parser.parse_single(sql).expect("test SQL must parse");
    lower_statement(&stmt)
}
