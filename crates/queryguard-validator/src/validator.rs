//! Public entry point (spec §4.4, §6): `validate(request) -> (plan, err)`.

use queryguard_ir::{lower_statement, Query, QueryStatus};
use queryguard_policy::PolicyCatalogEntry;
use queryguard_sql::SqlParser;

use crate::error::{ValidationError, VerrCode};
use crate::plan::{OutputPlan, PlanEntry};
use crate::walk::Walker;

/// One request to validate: the SQL text plus the policy profile of the
/// connection it was submitted against.
pub struct ValidateRequest<'a> {
    pub profile: &'a PolicyCatalogEntry,
    pub sql: &'a str,
}

/// The single-pass SQL validator (spec §4). Carries no mutable state
/// between calls — every `validate` call parses, lowers, walks, and
/// discards its own scratch state.
#[derive(Debug, Default, Clone, Copy)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    /// Parses, lowers, and validates `request.sql` against
    /// `request.profile`. Returns the output plan on success; on
    /// rejection, returns the single highest-priority `VerrCode` that
    /// fired anywhere in the query tree (spec §4.4 "Tie-breaks").
    pub fn validate(&self, request: ValidateRequest<'_>) -> Result<OutputPlan, ValidationError> {
        let parser = SqlParser::postgres();
        let stmt = parser
            .parse_single(request.sql)
            .map_err(|_| ValidationError::new(VerrCode::ParseFail, "failed to parse SQL"))?;

        let query = lower_statement(&stmt);
        if !query.is_ok() {
            let code = match &query.status {
                QueryStatus::Unsupported { .. } => VerrCode::UnsupportedQuery,
                _ => VerrCode::ParseFail,
            };
            log::warn!(
                "rejecting query against connection `{}`: {:?}",
                request.profile.connection_name,
                code
            );
            return Err(ValidationError::new(code, "query shape is not supported"));
        }

        let mut walker = Walker::new(request.profile);
        walker.walk_query(&query, true);

        if let Some((code, message)) = walker.worst_violation() {
            log::warn!(
                "rejecting query against connection `{}`: {:?} ({message})",
                request.profile.connection_name,
                code
            );
            return Err(ValidationError::new(code, message));
        }

        log::debug!(
            "accepted query against connection `{}`, {} output column(s)",
            request.profile.connection_name,
            query.nselect()
        );
        Ok(build_output_plan(&query, request.profile))
    }
}

/// Re-derives the Output Plan (spec §3, §4.4 step 4) from an outermost
/// query already known to have passed validation: one entry per SELECT
/// output column, tagging bare references to sensitive columns for
/// tokenization and everything else as plaintext.
fn build_output_plan(query: &Query, profile: &PolicyCatalogEntry) -> OutputPlan {
    use queryguard_ir::{Expr, FromItem};
    use std::collections::HashMap;

    let mut alias_table = HashMap::new();
    for node in query.from_items.iter().chain(query.joins.iter().map(|j| &j.right)) {
        if let Some(name) = node.alias_or_bare_name() {
            if let FromItem::BaseRel { schema, name: table } = &node.item {
                alias_table.insert(name.clone(), (schema.clone(), table.clone()));
            }
        }
    }

    query
        .select_items
        .iter()
        .map(|item| match &item.value {
            Expr::ColRef { qualifier, column } => alias_table
                .get(qualifier)
                .filter(|(schema, table)| {
                    queryguard_policy::is_column_sensitive(profile, schema.as_ref(), table, column)
                })
                .map(|(schema, table)| {
                    let source_col_id = match schema {
                        Some(s) => format!("{s}.{table}.{column}"),
                        None => format!("{table}.{column}"),
                    };
                    PlanEntry::Token { source_col_id }
                })
                .unwrap_or(PlanEntry::Plaintext),
            _ => PlanEntry::Plaintext,
        })
        .collect()
}
