//! YAML configuration loading into a [`PolicyCatalogEntry`] per connection
//! (spec §6). Unknown keys are fatal everywhere via `deny_unknown_fields`;
//! the legacy `maxQueryKiloBytes` key is explicitly recognized and rejected
//! with a pointed message rather than a generic unknown-field error.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use queryguard_core::Identifier;

use crate::catalog::{ColumnPolicyRule, ColumnStrategy, PolicyCatalogEntry, RuleScope, SafeFunctionRule, SafetyPolicy};
use crate::error::{PolicyError, PolicyResult};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(rename = "safetyPolicy", default)]
    safety_policy: Option<RawSafetyPolicy>,
    databases: Vec<RawDatabase>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
struct RawSafetyPolicy {
    #[serde(rename = "readOnly", default)]
    read_only: Option<String>,
    #[serde(rename = "statementTimeoutMs", default)]
    statement_timeout_ms: Option<u32>,
    #[serde(rename = "maxRowReturned", default)]
    max_row_returned: Option<u32>,
    #[serde(rename = "maxPayloadKiloBytes", default)]
    max_payload_kilobytes: Option<u32>,
    #[serde(rename = "columnPolicy", default)]
    column_policy: Option<RawColumnPolicyConfig>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
struct RawColumnPolicyConfig {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    strategy: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDatabase {
    #[serde(rename = "type")]
    db_type: String,
    #[serde(rename = "connectionName")]
    connection_name: String,
    #[allow(dead_code)]
    host: String,
    #[allow(dead_code)]
    port: u16,
    #[allow(dead_code)]
    username: String,
    #[allow(dead_code)]
    database: String,
    #[serde(default)]
    #[allow(dead_code)]
    options: Option<HashMap<String, String>>,
    #[serde(rename = "safetyPolicy", default)]
    safety_policy: Option<RawSafetyPolicy>,
    #[serde(rename = "sensitiveColumns", default)]
    sensitive_columns: Vec<String>,
    #[serde(rename = "safeFunctions", default)]
    safe_functions: Vec<String>,
}

const DEFAULT_STATEMENT_TIMEOUT_MS: u32 = 30_000;
const DEFAULT_MAX_ROWS: u32 = 1_000;
const DEFAULT_MAX_PAYLOAD_KB: u32 = 1_024;

/// Mirrors `queryguard_tokens::CONN_NAME_MAX` (spec §6: the wire format
/// allows `connectionName` lengths in `[1, 64]` bytes). Duplicated here
/// rather than imported so the Policy Catalog, a leaf component, does not
/// need to depend on the Token Store for one constant.
pub const CONN_NAME_MAX: usize = 64;

fn parse_read_only(raw: &str) -> PolicyResult<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "yes" | "true" => Ok(true),
        "no" | "false" | "no unsafe" => Ok(false),
        other => Err(PolicyError::InvalidReadOnly(other.to_string())),
    }
}

fn parse_strategy(raw: &str) -> PolicyResult<ColumnStrategy> {
    match raw.to_ascii_lowercase().as_str() {
        "deterministic" => Ok(ColumnStrategy::Deterministic),
        "randomized" => Ok(ColumnStrategy::Randomized),
        other => Err(PolicyError::InvalidColumnSpec(format!("unknown strategy `{other}`"))),
    }
}

/// Merge a database-level `safetyPolicy` override onto the top-level
/// default, field by field — a database that sets only `maxRowReturned`
/// keeps every other default untouched.
fn build_safety_policy(
    top: &Option<RawSafetyPolicy>,
    db: &Option<RawSafetyPolicy>,
) -> PolicyResult<SafetyPolicy> {
    let top = top.clone().unwrap_or_default();
    let db = db.clone().unwrap_or_default();

    let read_only_raw = db.read_only.or(top.read_only);
    let read_only = match read_only_raw {
        Some(r) => parse_read_only(&r)?,
        None => true,
    };

    let statement_timeout_ms = db
        .statement_timeout_ms
        .or(top.statement_timeout_ms)
        .unwrap_or(DEFAULT_STATEMENT_TIMEOUT_MS);

    let max_rows = db.max_row_returned.or(top.max_row_returned).unwrap_or(DEFAULT_MAX_ROWS);

    let max_payload_kb = db
        .max_payload_kilobytes
        .or(top.max_payload_kilobytes)
        .unwrap_or(DEFAULT_MAX_PAYLOAD_KB);

    let column_policy_cfg = db.column_policy.or(top.column_policy).unwrap_or_default();
    if let Some(mode) = &column_policy_cfg.mode {
        if mode != "pseudonymize" {
            return Err(PolicyError::InvalidColumnSpec(format!("unknown columnPolicy.mode `{mode}`")));
        }
    }
    let column_strategy = match column_policy_cfg.strategy {
        Some(s) => parse_strategy(&s)?,
        None => ColumnStrategy::Deterministic,
    };

    Ok(SafetyPolicy {
        read_only,
        statement_timeout_ms,
        max_rows,
        max_payload_bytes: max_payload_kb.saturating_mul(1024),
        column_strategy,
    })
}

/// Parse `"[schema.]table.column"` into (schema, table, column).
fn parse_column_spec(spec: &str) -> PolicyResult<(Option<Identifier>, Identifier, Identifier)> {
    let parts: Vec<&str> = spec.split('.').collect();
    let invalid = || PolicyError::InvalidColumnSpec(spec.to_string());
    match parts.as_slice() {
        [table, column] => {
            Ok((None, Identifier::try_new(table).ok_or_else(invalid)?, Identifier::try_new(column).ok_or_else(invalid)?))
        }
        [schema, table, column] => Ok((
            Some(Identifier::try_new(schema).ok_or_else(invalid)?),
            Identifier::try_new(table).ok_or_else(invalid)?,
            Identifier::try_new(column).ok_or_else(invalid)?,
        )),
        _ => Err(invalid()),
    }
}

/// Parse `"[schema.]name"` into (schema, name).
fn parse_function_spec(spec: &str) -> PolicyResult<(Option<Identifier>, Identifier)> {
    let parts: Vec<&str> = spec.split('.').collect();
    let invalid = || PolicyError::InvalidFunctionSpec(spec.to_string());
    match parts.as_slice() {
        [name] => Ok((None, Identifier::try_new(name).ok_or_else(invalid)?)),
        [schema, name] => {
            Ok((Some(Identifier::try_new(schema).ok_or_else(invalid)?), Identifier::try_new(name).ok_or_else(invalid)?))
        }
        _ => Err(invalid()),
    }
}

/// Merge `(schema, table, column)` specs into rules, deduping/sorting
/// schema lists. A global rule and a schema-scoped rule may coexist for the
/// same `(table,column)` (spec §3's sensitivity decision is written to
/// tolerate both: "if a global rule exists ... sensitive regardless of
/// schema; otherwise, if the query qualified ..."); the only stated
/// invariant is "at most one global rule per (table,column)", which holds
/// here for free since `globals` is a set keyed on that pair.
fn build_column_policy(specs: &[String]) -> PolicyResult<Vec<ColumnPolicyRule>> {
    let mut globals: HashMap<(Identifier, Identifier), ()> = HashMap::new();
    let mut scoped: HashMap<(Identifier, Identifier), Vec<Identifier>> = HashMap::new();

    for spec in specs {
        let (schema, table, column) = parse_column_spec(spec)?;
        let key = (table, column);
        match schema {
            None => {
                globals.insert(key, ());
            }
            Some(s) => {
                scoped.entry(key).or_default().push(s);
            }
        }
    }

    let mut rules = Vec::with_capacity(globals.len() + scoped.len());
    for (table, column) in globals.keys() {
        rules.push(ColumnPolicyRule { table: table.clone(), column: column.clone(), scope: RuleScope::Global });
    }
    for ((table, column), mut schemas) in scoped {
        if globals.contains_key(&(table.clone(), column.clone())) {
            continue;
        }
        schemas.sort();
        schemas.dedup();
        rules.push(ColumnPolicyRule { table, column, scope: RuleScope::SchemaScoped(schemas) });
    }
    Ok(rules)
}

/// Same global-vs-schema-scoped structure as [`build_column_policy`]; a
/// global rule coexists with (and subsumes) any schema-scoped rule for the
/// same function name rather than failing load.
fn build_safe_function_policy(specs: &[String]) -> PolicyResult<Vec<SafeFunctionRule>> {
    let mut globals: HashMap<Identifier, ()> = HashMap::new();
    let mut scoped: HashMap<Identifier, Vec<Identifier>> = HashMap::new();

    for spec in specs {
        let (schema, name) = parse_function_spec(spec)?;
        match schema {
            None => {
                globals.insert(name, ());
            }
            Some(s) => {
                scoped.entry(name).or_default().push(s);
            }
        }
    }

    let mut rules = Vec::with_capacity(globals.len() + scoped.len());
    for name in globals.keys() {
        rules.push(SafeFunctionRule { name: name.clone(), scope: RuleScope::Global });
    }
    for (name, mut schemas) in scoped {
        if globals.contains_key(&name) {
            continue;
        }
        schemas.sort();
        schemas.dedup();
        rules.push(SafeFunctionRule { name, scope: RuleScope::SchemaScoped(schemas) });
    }
    Ok(rules)
}

/// Reject the legacy `maxQueryKiloBytes` key everywhere it might appear,
/// with a message pointing at the replacement, before attempting the
/// strict typed parse (whose `deny_unknown_fields` error would otherwise
/// read like any other unrecognized key).
fn reject_legacy_keys(raw: &serde_yaml::Value) -> PolicyResult<()> {
    fn walk(v: &serde_yaml::Value) -> bool {
        match v {
            serde_yaml::Value::Mapping(m) => m.iter().any(|(k, val)| {
                matches!(k.as_str(), Some("maxQueryKiloBytes")) || walk(val)
            }),
            serde_yaml::Value::Sequence(s) => s.iter().any(walk),
            _ => false,
        }
    }
    if walk(raw) {
        return Err(PolicyError::LegacyMaxQueryKiloBytes);
    }
    Ok(())
}

/// Load and validate a policy catalog from a YAML string, producing one
/// [`PolicyCatalogEntry`] per configured database.
pub fn load_from_str(yaml: &str) -> PolicyResult<Vec<PolicyCatalogEntry>> {
    let raw_value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    reject_legacy_keys(&raw_value)?;

    let raw: RawConfig = serde_yaml::from_str(yaml)?;
    if raw.databases.is_empty() {
        return Err(PolicyError::EmptyDatabases);
    }

    let mut seen_names: HashMap<String, ()> = HashMap::new();
    let mut entries = Vec::with_capacity(raw.databases.len());

    for db in &raw.databases {
        if db.db_type != "postgres" {
            return Err(PolicyError::UnsupportedDatabaseType(db.db_type.clone()));
        }
        if db.connection_name.is_empty() || db.connection_name.len() > CONN_NAME_MAX {
            return Err(PolicyError::ConnectionNameTooLong(
                db.connection_name.clone(),
                db.connection_name.len(),
                CONN_NAME_MAX,
            ));
        }
        let key = db.connection_name.to_ascii_lowercase();
        if seen_names.insert(key, ()).is_some() {
            return Err(PolicyError::DuplicateConnectionName(db.connection_name.clone()));
        }

        let safety_policy = build_safety_policy(&raw.safety_policy, &db.safety_policy)?;
        let column_policy = build_column_policy(&db.sensitive_columns)?;
        let safe_function_policy = build_safe_function_policy(&db.safe_functions)?;

        if column_policy.is_empty() {
            log::warn!(
                "connection `{}` declares no sensitiveColumns; every column it exposes will be treated as plaintext",
                db.connection_name
            );
        }
        log::debug!(
            "loaded policy catalog entry for `{}`: {} sensitive column rule(s), {} safe function rule(s)",
            db.connection_name,
            column_policy.len(),
            safe_function_policy.len()
        );

        entries.push(PolicyCatalogEntry {
            connection_name: db.connection_name.clone(),
            safety_policy,
            column_policy,
            safe_function_policy,
        });
    }

    Ok(entries)
}

pub fn load_from_path(path: impl AsRef<Path>) -> PolicyResult<Vec<PolicyCatalogEntry>> {
    let text = std::fs::read_to_string(path)?;
    load_from_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
databases:
  - type: postgres
    connectionName: MyPostgres
    host: localhost
    port: 5432
    username: app
    database: appdb
    sensitiveColumns:
      - users.fiscal_code
      - private.payroll.ssn
    safeFunctions:
      - lower
      - upper
"#;

    #[test]
    fn loads_minimal_config() {
        let entries = load_from_str(MINIMAL).unwrap();
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.connection_name, "MyPostgres");
        assert!(e.safety_policy.read_only);
        assert_eq!(e.safety_policy.max_rows, DEFAULT_MAX_ROWS);
    }

    #[test]
    fn merges_schema_scoped_column_rules() {
        let entries = load_from_str(MINIMAL).unwrap();
        let rules = &entries[0].column_policy;
        assert_eq!(rules.len(), 2);
    }

    #[test]
    fn rejects_legacy_key() {
        let yaml = r#"
safetyPolicy:
  maxQueryKiloBytes: 64
databases:
  - type: postgres
    connectionName: a
    host: h
    port: 1
    username: u
    database: d
"#;
        let err = load_from_str(yaml).unwrap_err();
        assert!(matches!(err, PolicyError::LegacyMaxQueryKiloBytes));
    }

    #[test]
    fn rejects_unknown_key() {
        let yaml = r#"
databases:
  - type: postgres
    connectionName: a
    host: h
    port: 1
    username: u
    database: d
    bogusKey: true
"#;
        assert!(load_from_str(yaml).is_err());
    }

    #[test]
    fn rejects_empty_databases() {
        let yaml = "databases: []\n";
        assert!(matches!(load_from_str(yaml), Err(PolicyError::EmptyDatabases)));
    }

    #[test]
    fn rejects_duplicate_connection_name_case_insensitive() {
        let yaml = r#"
databases:
  - type: postgres
    connectionName: MyDb
    host: h
    port: 1
    username: u
    database: d
  - type: postgres
    connectionName: mydb
    host: h
    port: 1
    username: u
    database: d
"#;
        assert!(matches!(load_from_str(yaml), Err(PolicyError::DuplicateConnectionName(_))));
    }

    #[test]
    fn global_rule_subsumes_scoped_rule_on_same_key() {
        let yaml = r#"
databases:
  - type: postgres
    connectionName: a
    host: h
    port: 1
    username: u
    database: d
    sensitiveColumns:
      - users.fiscal_code
      - private.users.fiscal_code
    safeFunctions: []
"#;
        // global (users.fiscal_code) and schema-scoped (private.users.fiscal_code)
        // both key on (users, fiscal_code): spec §3 tolerates both existing, with
        // the global rule taking precedence, so load succeeds and only the
        // global rule survives.
        let entries = load_from_str(yaml).unwrap();
        let rules = &entries[0].column_policy;
        assert_eq!(rules.len(), 1);
        assert!(rules[0].scope.is_global());
    }

    #[test]
    fn rejects_connection_name_longer_than_token_wire_format_allows() {
        let too_long = "a".repeat(CONN_NAME_MAX + 1);
        let yaml = format!(
            r#"
databases:
  - type: postgres
    connectionName: "{too_long}"
    host: h
    port: 1
    username: u
    database: d
"#
        );
        assert!(matches!(
            load_from_str(&yaml),
            Err(PolicyError::ConnectionNameTooLong(_, _, _))
        ));
    }

    #[test]
    fn rejects_column_spec_with_empty_segment_instead_of_panicking() {
        assert!(matches!(parse_column_spec("users."), Err(PolicyError::InvalidColumnSpec(_))));
        assert!(matches!(parse_column_spec(".fiscal_code"), Err(PolicyError::InvalidColumnSpec(_))));
        assert!(matches!(parse_column_spec("private..fiscal_code"), Err(PolicyError::InvalidColumnSpec(_))));
    }

    #[test]
    fn rejects_function_spec_with_empty_segment_instead_of_panicking() {
        assert!(matches!(parse_function_spec(""), Err(PolicyError::InvalidFunctionSpec(_))));
        assert!(matches!(parse_function_spec("private."), Err(PolicyError::InvalidFunctionSpec(_))));
    }

    #[test]
    fn max_payload_kilobytes_multiplied_to_bytes() {
        let yaml = r#"
safetyPolicy:
  maxPayloadKiloBytes: 2
databases:
  - type: postgres
    connectionName: a
    host: h
    port: 1
    username: u
    database: d
"#;
        let entries = load_from_str(yaml).unwrap();
        assert_eq!(entries[0].safety_policy.max_payload_bytes, 2048);
    }
}
