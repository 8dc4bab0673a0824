//! The single-pass walk itself (spec §4.4 steps 2-4): builds the per-scope
//! alias/output tables, applies every rule in priority order, and recurses
//! into nested scopes (sub-queries and CTE bodies) before the enclosing
//! scope resumes, exactly as spec §4.4's state machine describes.
//!
//! Rather than aborting at the first rule that fires during the walk
//! itself, this implementation collects every violation it encounters
//! (scope by scope, in the structural clause order spec §4.4 step 3
//! lists) into one list, then reports whichever has the lowest-numbered
//! priority once the whole tree has been visited. This is equivalent to
//! "the first rule that fires halts the walk" for single-violation inputs,
//! and it is what makes the tie-break rule ("when multiple rules could
//! fire on the same node, the first-listed wins") well-defined even when
//! the violations are spread across different nodes.

use std::collections::HashMap;

use queryguard_core::Identifier;
use queryguard_ir::{BinaryOp, Expr, FromItem, Join, JoinKind, Query};
use queryguard_policy::{is_column_sensitive, is_function_safe, PolicyCatalogEntry};

use crate::context::{build_alias_table, build_output_table, AliasTable, ResolvedAlias};
use crate::error::VerrCode;

const PRIORITY_ORDER: &[VerrCode] = &[
    VerrCode::ParseFail,
    VerrCode::UnsupportedQuery,
    VerrCode::Star,
    VerrCode::NoTableAlias,
    VerrCode::NoColumnAlias,
    VerrCode::JoinNotInner,
    VerrCode::JoinOnInvalid,
    VerrCode::JoinOnSensitive,
    VerrCode::FuncUnsafe,
    VerrCode::SensitiveSelectExpr,
    VerrCode::SensitiveLoc,
    VerrCode::SensitiveCmp,
    VerrCode::WhereNotConj,
    VerrCode::ParamOutsideWhere,
    VerrCode::ParamNonSensitive,
    VerrCode::SensitiveOutsideMain,
    VerrCode::DistinctSensitive,
    VerrCode::OffsetSensitive,
    VerrCode::LimitRequired,
    VerrCode::LimitExceeds,
    VerrCode::AnalyzeFail,
];

pub(crate) fn priority_rank(code: VerrCode) -> usize {
    PRIORITY_ORDER.iter().position(|c| *c == code).unwrap_or(PRIORITY_ORDER.len())
}

/// Per-scope context that doesn't need to survive a recursion into a
/// nested scope: the output-alias table (GROUP BY/ORDER BY/HAVING may
/// reference a SELECT-list alias, but never one from an outer or inner
/// scope).
struct ScopeCtx<'q> {
    output_table: HashMap<Identifier, &'q Expr>,
}

pub(crate) struct Walker<'a> {
    pub(crate) profile: &'a PolicyCatalogEntry,
    pub(crate) violations: Vec<(VerrCode, String)>,
    /// Alias tables for every scope currently being walked, innermost
    /// last. A correlated subquery's WHERE clause may reference a table
    /// alias bound in an enclosing scope, so qualifier resolution searches
    /// this stack from the top down rather than just the current scope.
    scope_stack: Vec<AliasTable>,
}

impl<'a> Walker<'a> {
    pub(crate) fn new(profile: &'a PolicyCatalogEntry) -> Self {
        Self { profile, violations: Vec::new(), scope_stack: Vec::new() }
    }

    pub(crate) fn push(&mut self, code: VerrCode, message: String) {
        self.violations.push((code, message));
    }

    pub(crate) fn worst_violation(&self) -> Option<(VerrCode, String)> {
        self.violations
            .iter()
            .min_by_key(|(code, _)| priority_rank(*code))
            .cloned()
    }

    pub(crate) fn walk_query(&mut self, query: &Query, is_main: bool) {
        let join_rights = query.joins.iter().map(|j| &j.right);
        let alias_table = match build_alias_table(&query.from_items, join_rights) {
            Ok(t) => t,
            Err(()) => {
                self.push(VerrCode::NoTableAlias, "a FROM or JOIN item has no usable alias".to_string());
                AliasTable::new()
            }
        };
        let output_table = build_output_table(query);
        self.scope_stack.push(alias_table);
        let ctx = ScopeCtx { output_table };

        let mut scope_sensitive = false;

        for item in &query.select_items {
            match &item.value {
                Expr::Wildcard => self.push(VerrCode::Star, "SELECT list contains a wildcard".to_string()),
                Expr::ColRef { qualifier, column } => match self.is_sensitive_ref(qualifier, column) {
                    None => self.push(
                        VerrCode::NoColumnAlias,
                        format!("unresolved qualifier `{qualifier}` in SELECT list"),
                    ),
                    Some(true) => scope_sensitive = true,
                    Some(false) => {}
                },
                other => {
                    let refs = self.scan_general(other);
                    if refs.iter().any(|(_, _, s)| *s) {
                        scope_sensitive = true;
                        self.push(
                            VerrCode::SensitiveSelectExpr,
                            "sensitive column wrapped in a non-bare SELECT expression".to_string(),
                        );
                    }
                    self.scan_params_forbidden(other);
                }
            }
        }

        for join in &query.joins {
            self.check_join(join, &mut scope_sensitive);
        }

        for node in query.from_items.iter().chain(query.joins.iter().map(|j| &j.right)) {
            if let FromItem::Subquery(body) = &node.item {
                self.walk_query(body, false);
            }
        }

        for cte in &query.ctes {
            self.walk_query(&cte.body, false);
        }

        if let Some(where_expr) = &query.where_clause {
            if contains_or_or_not(where_expr) {
                self.push(
                    VerrCode::WhereNotConj,
                    "WHERE must be a chain of AND-connected predicates with no OR/NOT".to_string(),
                );
            }
            let mut leaves = Vec::new();
            flatten_and(where_expr, &mut leaves);
            for leaf in leaves {
                self.check_where_leaf(leaf, &mut scope_sensitive);
            }
        }

        self.walk_restricted_list(&ctx, &query.group_by, "GROUP BY", &mut scope_sensitive);
        if let Some(having) = &query.having {
            self.walk_restricted_list(&ctx, std::slice::from_ref(having), "HAVING", &mut scope_sensitive);
        }
        self.walk_restricted_list(&ctx, &query.order_by, "ORDER BY", &mut scope_sensitive);

        for e in &query.group_by {
            self.scan_params_forbidden(e);
        }
        if let Some(h) = &query.having {
            self.scan_params_forbidden(h);
        }
        for e in &query.order_by {
            self.scan_params_forbidden(e);
        }
        for j in &query.joins {
            if let Some(on) = &j.on {
                self.scan_params_forbidden(on);
            }
        }

        if is_main {
            if query.flags.has_distinct && scope_sensitive {
                self.push(VerrCode::DistinctSensitive, "SELECT DISTINCT used with a sensitive column".to_string());
            }
            if query.flags.has_offset && scope_sensitive {
                self.push(VerrCode::OffsetSensitive, "OFFSET used with a sensitive column".to_string());
            }
            if scope_sensitive {
                if !query.has_limit() {
                    self.push(
                        VerrCode::LimitRequired,
                        "a query selecting or constraining a sensitive column requires LIMIT".to_string(),
                    );
                } else if query.limit_value as u64 > u64::from(self.profile.safety_policy.max_rows) {
                    self.push(
                        VerrCode::LimitExceeds,
                        format!(
                            "LIMIT {} exceeds policy max_rows {}",
                            query.limit_value, self.profile.safety_policy.max_rows
                        ),
                    );
                }
            }
        } else if scope_sensitive {
            // Spec's sensitive-outside-main rule covers any location in a
            // non-main scope (CTE body or subquery), not just its SELECT
            // list: WHERE, GROUP BY, HAVING, ORDER BY and JOIN ON all set
            // `scope_sensitive` above, so one push here covers all of them.
            self.push(
                VerrCode::SensitiveOutsideMain,
                "sensitive column referenced inside a CTE body or sub-query".to_string(),
            );
        }

        self.scope_stack.pop();
    }

    /// Resolves `qualifier` against the innermost scope that binds it,
    /// searching outward so a correlated subquery can reach an alias from
    /// its enclosing scope.
    fn resolve_alias(&self, qualifier: &Identifier) -> Option<&ResolvedAlias> {
        self.scope_stack.iter().rev().find_map(|table| table.get(qualifier))
    }

    fn is_sensitive_ref(&self, qualifier: &Identifier, column: &Identifier) -> Option<bool> {
        self.resolve_alias(qualifier).map(|resolved| match resolved {
            ResolvedAlias::BaseRel { schema, table } => {
                is_column_sensitive(self.profile, schema.as_ref(), table, column)
            }
            ResolvedAlias::Opaque => false,
        })
    }

    fn peek_sensitive(&self, e: &Expr) -> Option<bool> {
        if let Expr::ColRef { qualifier, column } = e {
            return self.is_sensitive_ref(qualifier, column);
        }
        None
    }

    /// Recursively resolves every `ColRef` in `expr` against the current
    /// scope stack (pushing `NoColumnAlias` for unresolved qualifiers),
    /// checks every `FuncCall` against the safe-function policy (pushing
    /// `FuncUnsafe`), flags any expression-level `Unsupported` node, and
    /// walks an `Expr::Subquery` as its own nested scope so the sensitive-
    /// column and parameter rules apply inside it too. Returns every
    /// `ColRef` found in the *current* scope, tagged with whether it
    /// resolved sensitive; refs inside a nested subquery are reported
    /// directly by that nested walk and are not added to `out`.
    fn scan_general(&mut self, expr: &Expr) -> Vec<(Identifier, Identifier, bool)> {
        let mut out = Vec::new();
        self.scan_general_into(expr, &mut out);
        out
    }

    fn scan_general_into(&mut self, expr: &Expr, out: &mut Vec<(Identifier, Identifier, bool)>) {
        match expr {
            Expr::ColRef { qualifier, column } => match self.is_sensitive_ref(qualifier, column) {
                None => self.push(VerrCode::NoColumnAlias, format!("unresolved qualifier `{qualifier}`")),
                Some(sensitive) => out.push((qualifier.clone(), column.clone(), sensitive)),
            },
            Expr::BareIdent(name) => {
                self.push(VerrCode::NoColumnAlias, format!("unqualified reference `{name}`"));
            }
            Expr::Param(_) | Expr::Literal(_) | Expr::Wildcard => {}
            Expr::UnaryNot(inner) => self.scan_general_into(inner, out),
            Expr::Binary { lhs, rhs, .. } => {
                self.scan_general_into(lhs, out);
                self.scan_general_into(rhs, out);
            }
            Expr::In { lhs, items } => {
                self.scan_general_into(lhs, out);
                for item in items {
                    self.scan_general_into(item, out);
                }
            }
            Expr::Case { arg, arms, else_expr } => {
                if let Some(a) = arg {
                    self.scan_general_into(a, out);
                }
                for arm in arms {
                    self.scan_general_into(&arm.when, out);
                    self.scan_general_into(&arm.then, out);
                }
                if let Some(e) = else_expr {
                    self.scan_general_into(e, out);
                }
            }
            Expr::FuncCall { qualname, args, .. } => {
                if !is_function_safe(self.profile, qualname.schema.as_ref(), &qualname.name) {
                    self.push(VerrCode::FuncUnsafe, format!("function `{qualname}` is not safe for this connection"));
                }
                for a in args {
                    self.scan_general_into(a, out);
                }
            }
            Expr::WindowFunc { func, partition_by, order_by, .. } => {
                self.scan_general_into(func, out);
                for e in partition_by {
                    self.scan_general_into(e, out);
                }
                for e in order_by {
                    self.scan_general_into(e, out);
                }
            }
            Expr::Cast { expr, .. } => self.scan_general_into(expr, out),
            // A scalar subquery, `IN (SELECT ...)`, or `EXISTS (SELECT ...)`
            // is its own scope: walk it as a non-main scope so any sensitive
            // column it touches (in its SELECT list, WHERE, or elsewhere)
            // is caught by that scope's own `SensitiveOutsideMain` check,
            // correlated against the enclosing alias(es) still on the stack.
            Expr::Subquery(inner) => self.walk_query(inner, false),
            Expr::Unsupported(reason) => {
                self.push(VerrCode::UnsupportedQuery, format!("unsupported construct: {reason}"));
            }
        }
    }

    /// Any clause other than WHERE forbids `$n` parameters entirely
    /// (spec's `VERR_PARAM_OUTSIDE_WHERE`).
    fn scan_params_forbidden(&mut self, expr: &Expr) {
        match expr {
            Expr::Param(n) => self.push(VerrCode::ParamOutsideWhere, format!("parameter `${n}` used outside WHERE")),
            Expr::UnaryNot(inner) => self.scan_params_forbidden(inner),
            Expr::Binary { lhs, rhs, .. } => {
                self.scan_params_forbidden(lhs);
                self.scan_params_forbidden(rhs);
            }
            Expr::In { lhs, items } => {
                self.scan_params_forbidden(lhs);
                for item in items {
                    self.scan_params_forbidden(item);
                }
            }
            Expr::Case { arg, arms, else_expr } => {
                if let Some(a) = arg {
                    self.scan_params_forbidden(a);
                }
                for arm in arms {
                    self.scan_params_forbidden(&arm.when);
                    self.scan_params_forbidden(&arm.then);
                }
                if let Some(e) = else_expr {
                    self.scan_params_forbidden(e);
                }
            }
            Expr::FuncCall { args, .. } => {
                for a in args {
                    self.scan_params_forbidden(a);
                }
            }
            Expr::WindowFunc { func, partition_by, order_by, .. } => {
                self.scan_params_forbidden(func);
                for e in partition_by {
                    self.scan_params_forbidden(e);
                }
                for e in order_by {
                    self.scan_params_forbidden(e);
                }
            }
            Expr::Cast { expr, .. } => self.scan_params_forbidden(expr),
            // Left as a no-op deliberately: the paired `scan_general` call
            // on this same expression already walks the subquery as its
            // own scope, and that nested `walk_query` runs its own
            // `scan_params_forbidden` over its own clauses. Recursing here
            // too would just double-report the same violations.
            Expr::ColRef { .. }
            | Expr::Literal(_)
            | Expr::BareIdent(_)
            | Expr::Wildcard
            | Expr::Subquery(_)
            | Expr::Unsupported(_) => {}
        }
    }

    fn check_join(&mut self, join: &Join, scope_sensitive: &mut bool) {
        if join.kind != JoinKind::Inner {
            self.push(VerrCode::JoinNotInner, format!("join kind {:?} is not permitted; only INNER is", join.kind));
            return;
        }
        let Some(on_expr) = &join.on else { return };

        if !is_and_of_colref_eq(on_expr) {
            self.push(VerrCode::JoinOnInvalid, "JOIN ON must be a conjunction of column equalities".to_string());
        }

        let refs = self.scan_general(on_expr);
        if refs.iter().any(|(_, _, s)| *s) {
            *scope_sensitive = true;
            self.push(VerrCode::JoinOnSensitive, "join equality references a sensitive column".to_string());
        }
    }

    fn check_where_leaf(&mut self, leaf: &Expr, scope_sensitive: &mut bool) {
        let refs = self.scan_general(leaf);
        if refs.iter().any(|(_, _, s)| *s) {
            *scope_sensitive = true;
        }

        match leaf {
            Expr::Binary { kind, lhs, rhs }
                if matches!(
                    kind,
                    BinaryOp::Eq
                        | BinaryOp::Ne
                        | BinaryOp::Lt
                        | BinaryOp::Le
                        | BinaryOp::Gt
                        | BinaryOp::Ge
                        | BinaryOp::Like
                        | BinaryOp::NotLike
                ) =>
            {
                self.check_where_comparison(*kind, lhs, rhs, &refs);
            }
            Expr::In { lhs, items } => self.check_where_in(lhs, items, &refs),
            _ => {
                if refs.iter().any(|(_, _, s)| *s) {
                    self.push(
                        VerrCode::SensitiveCmp,
                        "sensitive column referenced in a WHERE predicate outside a permitted comparison shape"
                            .to_string(),
                    );
                }
            }
        }
    }

    fn check_where_comparison(
        &mut self,
        kind: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        all_refs: &[(Identifier, Identifier, bool)],
    ) {
        let lhs_sensitive = self.peek_sensitive(lhs);
        let rhs_sensitive = self.peek_sensitive(rhs);
        let any_sensitive_in_leaf = all_refs.iter().any(|(_, _, s)| *s);

        if lhs_sensitive == Some(true) {
            let ok = kind == BinaryOp::Eq && matches!(rhs, Expr::Param(_));
            if !ok {
                if let Expr::ColRef { qualifier, column } = lhs {
                    self.push(
                        VerrCode::SensitiveCmp,
                        format!("sensitive column `{qualifier}.{column}` compared with a disallowed operator or operand"),
                    );
                }
            }
        } else if rhs_sensitive == Some(true) {
            let ok = kind == BinaryOp::Eq && matches!(lhs, Expr::Param(_));
            if !ok {
                if let Expr::ColRef { qualifier, column } = rhs {
                    self.push(
                        VerrCode::SensitiveCmp,
                        format!("sensitive column `{qualifier}.{column}` compared with a disallowed operator or operand"),
                    );
                }
            }
        } else if any_sensitive_in_leaf {
            self.push(
                VerrCode::SensitiveCmp,
                "sensitive column referenced inside a wrapped WHERE expression".to_string(),
            );
        }

        if matches!(lhs, Expr::Param(_)) {
            if let Expr::ColRef { qualifier, column } = rhs {
                if rhs_sensitive == Some(false) {
                    self.push(
                        VerrCode::ParamNonSensitive,
                        format!("parameter compared against non-sensitive column `{qualifier}.{column}`"),
                    );
                }
            }
        }
        if matches!(rhs, Expr::Param(_)) {
            if let Expr::ColRef { qualifier, column } = lhs {
                if lhs_sensitive == Some(false) {
                    self.push(
                        VerrCode::ParamNonSensitive,
                        format!("parameter compared against non-sensitive column `{qualifier}.{column}`"),
                    );
                }
            }
        }
    }

    fn check_where_in(&mut self, lhs: &Expr, items: &[Expr], all_refs: &[(Identifier, Identifier, bool)]) {
        let lhs_sensitive = self.peek_sensitive(lhs);
        let any_sensitive_in_leaf = all_refs.iter().any(|(_, _, s)| *s);

        if lhs_sensitive == Some(true) {
            let all_params = items.iter().all(|i| matches!(i, Expr::Param(_)));
            if !all_params {
                if let Expr::ColRef { qualifier, column } = lhs {
                    self.push(
                        VerrCode::SensitiveCmp,
                        format!("sensitive column `{qualifier}.{column}` IN-list must consist of bound parameters"),
                    );
                }
            }
        } else if any_sensitive_in_leaf {
            self.push(
                VerrCode::SensitiveCmp,
                "sensitive column referenced inside a wrapped WHERE expression".to_string(),
            );
        }
    }

    fn walk_restricted_list(&mut self, ctx: &ScopeCtx<'_>, exprs: &[Expr], label: &str, scope_sensitive: &mut bool) {
        for expr in exprs {
            if let Expr::BareIdent(name) = expr {
                match ctx.output_table.get(name).copied() {
                    Some(Expr::ColRef { qualifier, column }) => {
                        if let Some(true) = self.is_sensitive_ref(qualifier, column) {
                            *scope_sensitive = true;
                            self.push(
                                VerrCode::SensitiveLoc,
                                format!(
                                    "sensitive column `{qualifier}.{column}` referenced via output alias `{name}` in {label}"
                                ),
                            );
                        }
                    }
                    Some(_) => self.push(
                        VerrCode::NoColumnAlias,
                        format!("`{name}` in {label} is not a plain column mapping"),
                    ),
                    None => {
                        self.push(VerrCode::NoColumnAlias, format!("unresolved alias `{name}` in {label}"));
                    }
                }
                continue;
            }

            let refs = self.scan_general(expr);
            if refs.iter().any(|(_, _, s)| *s) {
                *scope_sensitive = true;
                for (q, c, s) in &refs {
                    if *s {
                        self.push(VerrCode::SensitiveLoc, format!("sensitive column `{q}.{c}` referenced in {label}"));
                    }
                }
            }
        }
    }
}

fn flatten_and<'e>(expr: &'e Expr, out: &mut Vec<&'e Expr>) {
    match expr {
        Expr::Binary { kind: BinaryOp::And, lhs, rhs } => {
            flatten_and(lhs, out);
            flatten_and(rhs, out);
        }
        other => out.push(other),
    }
}

fn contains_or_or_not(expr: &Expr) -> bool {
    match expr {
        Expr::UnaryNot(_) => true,
        Expr::Binary { kind: BinaryOp::Or, .. } => true,
        Expr::Binary { lhs, rhs, .. } => contains_or_or_not(lhs) || contains_or_or_not(rhs),
        Expr::In { lhs, items } => contains_or_or_not(lhs) || items.iter().any(contains_or_or_not),
        Expr::Case { arg, arms, else_expr } => {
            arg.as_deref().is_some_and(contains_or_or_not)
                || arms.iter().any(|a| contains_or_or_not(&a.when) || contains_or_or_not(&a.then))
                || else_expr.as_deref().is_some_and(contains_or_or_not)
        }
        Expr::FuncCall { args, .. } => args.iter().any(contains_or_or_not),
        Expr::WindowFunc { func, .. } => contains_or_or_not(func),
        Expr::Cast { expr, .. } => contains_or_or_not(expr),
        _ => false,
    }
}

fn is_and_of_colref_eq(expr: &Expr) -> bool {
    match expr {
        Expr::Binary { kind: BinaryOp::And, lhs, rhs } => is_and_of_colref_eq(lhs) && is_and_of_colref_eq(rhs),
        Expr::Binary { kind: BinaryOp::Eq, lhs, rhs } => {
            matches!(**lhs, Expr::ColRef { .. }) && matches!(**rhs, Expr::ColRef { .. })
        }
        _ => false,
    }
}

#[cfg(test)]
mod priority_proptests {
    use super::*;
    use proptest::prelude::*;
    use queryguard_policy::{ColumnStrategy, SafetyPolicy};

    fn empty_profile() -> PolicyCatalogEntry {
        PolicyCatalogEntry {
            connection_name: "test".to_string(),
            safety_policy: SafetyPolicy {
                read_only: true,
                statement_timeout_ms: 1000,
                max_rows: 200,
                max_payload_bytes: 1024,
                column_strategy: ColumnStrategy::Deterministic,
            },
            column_policy: Vec::new(),
            safe_function_policy: Vec::new(),
        }
    }

    fn arb_code() -> impl Strategy<Value = VerrCode> {
        prop::sample::select(PRIORITY_ORDER.to_vec())
    }

    proptest! {
        /// spec §8 "Rule priority stability": whichever violations a walk
        /// collects, `worst_violation` must report the one appearing
        /// earliest in `PRIORITY_ORDER`, regardless of the order they were
        /// pushed in.
        #[test]
        fn worst_violation_picks_lowest_priority_rank(codes in prop::collection::vec(arb_code(), 1..10)) {
            let profile = empty_profile();
            let mut walker = Walker::new(&profile);
            for code in &codes {
                walker.push(*code, format!("{code}"));
            }
            let expected = codes.iter().copied().min_by_key(|c| priority_rank(*c)).unwrap();
            let (reported, _) = walker.worst_violation().unwrap();
            prop_assert_eq!(reported, expected);
        }

        /// Pushing the same violations in reverse order must not change
        /// which one wins — priority, not arrival order, decides.
        #[test]
        fn worst_violation_is_order_independent(codes in prop::collection::vec(arb_code(), 1..10)) {
            let profile = empty_profile();
            let mut forward = Walker::new(&profile);
            for code in &codes {
                forward.push(*code, String::new());
            }
            let mut backward = Walker::new(&profile);
            for code in codes.iter().rev() {
                backward.push(*code, String::new());
            }
            prop_assert_eq!(
                forward.worst_violation().map(|(c, _)| c),
                backward.worst_violation().map(|(c, _)| c)
            );
        }
    }
}
