//! Per-scope analysis context (spec §4.4 step 2): an alias table mapping
//! FROM/JOIN aliases to resolved relations, and an output-column table
//! mapping SELECT output aliases to their underlying expression, both
//! keyed by lowercase identifier bytes. Scope-local and walk-local — never
//! shared across nested `Query` scopes (spec §9: "avoid back-pointers by
//! passing scope stacks explicitly").

use std::collections::HashMap;

use queryguard_core::Identifier;
use queryguard_ir::{Expr, FromItem, FromItemNode, Query};

/// What an alias resolves to, for the purposes of sensitivity lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAlias {
    BaseRel { schema: Option<Identifier>, table: Identifier },
    /// A subquery, CTE reference, VALUES list, or unsupported shape: the
    /// alias is a usable name, but its columns carry no column-policy
    /// identity of their own.
    Opaque,
}

pub type AliasTable = HashMap<Identifier, ResolvedAlias>;

/// Build the alias table for one scope's FROM list plus its JOIN
/// right-hand sides. Returns `Err(())` (the validator maps this to
/// `VERR_NO_TABLE_ALIAS`) for the first item with no usable name.
pub fn build_alias_table<'a>(
    from_items: &'a [FromItemNode],
    join_rights: impl Iterator<Item = &'a FromItemNode>,
) -> Result<AliasTable, ()> {
    let mut table = AliasTable::new();
    for node in from_items.iter().chain(join_rights) {
        let name = node.alias_or_bare_name().ok_or(())?;
        table.insert(name.clone(), resolve_from_item(&node.item));
    }
    Ok(table)
}

fn resolve_from_item(item: &FromItem) -> ResolvedAlias {
    match item {
        FromItem::BaseRel { schema, name } => {
            ResolvedAlias::BaseRel { schema: schema.clone(), table: name.clone() }
        }
        FromItem::Subquery(_) | FromItem::CteRef(_) | FromItem::Values(_) | FromItem::Unsupported => {
            ResolvedAlias::Opaque
        }
    }
}

/// Output-column table: output alias -> the SELECT item's value
/// expression, used to resolve ORDER BY/GROUP BY references that name an
/// output alias instead of a qualified column (spec §4.4's
/// `VERR_NO_COLUMN_ALIAS` carve-out for "a plain column mapping").
pub fn build_output_table(query: &Query) -> HashMap<Identifier, &Expr> {
    let mut table = HashMap::new();
    for item in &query.select_items {
        if let Some(alias) = &item.alias {
            table.insert(alias.clone(), &item.value);
        }
    }
    table
}
