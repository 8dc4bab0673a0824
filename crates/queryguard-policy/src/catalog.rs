//! Policy Catalog: an immutable, per-connection description of what is
//! sensitive, what is safe, and what limits apply (spec §3). Built once
//! during configuration load and shared by reference thereafter — there is
//! no interior mutability here because nothing ever needs to change it
//! after load.

use queryguard_core::Identifier;

/// `safety_policy` (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyPolicy {
    pub read_only: bool,
    pub statement_timeout_ms: u32,
    pub max_rows: u32,
    pub max_payload_bytes: u32,
    pub column_strategy: ColumnStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnStrategy {
    Deterministic,
    Randomized,
}

/// Whether a rule applies in any schema, or only when the query explicitly
/// names one of a fixed, sorted, deduplicated set of schemas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleScope {
    Global,
    SchemaScoped(Vec<Identifier>),
}

impl RuleScope {
    fn matches(&self, schema: Option<&Identifier>) -> bool {
        match (self, schema) {
            (RuleScope::Global, _) => true,
            (RuleScope::SchemaScoped(schemas), Some(s)) => schemas.iter().any(|x| x == s),
            // Unqualified reference, no global rule: over-approximate toward
            // sensitivity (spec §3 sensitivity decision, third clause).
            (RuleScope::SchemaScoped(_), None) => true,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, RuleScope::Global)
    }
}

/// One `column_policy` rule, keyed by (table, column).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPolicyRule {
    pub table: Identifier,
    pub column: Identifier,
    pub scope: RuleScope,
}

/// One `safe_function_policy` rule, keyed by function name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeFunctionRule {
    pub name: Identifier,
    pub scope: RuleScope,
}

/// Per-connection policy, immutable after construction.
#[derive(Debug, Clone)]
pub struct PolicyCatalogEntry {
    pub connection_name: String,
    pub safety_policy: SafetyPolicy,
    pub column_policy: Vec<ColumnPolicyRule>,
    pub safe_function_policy: Vec<SafeFunctionRule>,
}

/// `is_column_sensitive(profile, schema, table, column)` (spec §4.1).
///
/// If a global rule exists for (table, column), the column is sensitive
/// regardless of schema. Otherwise, if the reference is schema-qualified,
/// it is sensitive iff that schema is listed by a schema-scoped rule for
/// (table, column). Otherwise (unqualified, no global rule) it is
/// sensitive iff any schema-scoped rule exists for (table, column) at all
/// — the system does not resolve `search_path`, so it over-approximates
/// toward sensitivity.
pub fn is_column_sensitive(
    profile: &PolicyCatalogEntry,
    schema: Option<&Identifier>,
    table: &Identifier,
    column: &Identifier,
) -> bool {
    let mut matching = profile
        .column_policy
        .iter()
        .filter(|r| &r.table == table && &r.column == column);

    if matching.clone().any(|r| r.scope.is_global()) {
        return true;
    }

    matching.any(|r| r.scope.matches(schema))
}

/// `is_function_safe(profile, schema, name)` (spec §4.1). Uses the same
/// global/schema-list logic as `is_column_sensitive`, but a function is
/// "safe" when a matching rule exists, rather than "sensitive" — absence
/// of any rule means unsafe (the default is to reject unrecognized
/// functions, spec's `VERR_FUNC_UNSAFE`).
pub fn is_function_safe(
    profile: &PolicyCatalogEntry,
    schema: Option<&Identifier>,
    name: &Identifier,
) -> bool {
    let mut matching = profile.safe_function_policy.iter().filter(|r| &r.name == name);

    if matching.clone().any(|r| r.scope.is_global()) {
        return true;
    }

    matching.any(|r| r.scope.matches(schema))
}
