use sqlparser::ast;

use crate::ir::{FromItem, FromItemNode, Join, JoinKind};

use super::expr::lower_expr;
use super::ident_from;
use super::query::lower_query;

/// Lower one `TableFactor` — a FROM-list entry or a JOIN right-hand side —
/// into a `FromItemNode`. Shapes outside scope (table functions, UNNEST,
/// pivots, nested joins) become `FromItem::Unsupported`; the validator
/// rejects them via `VERR_NO_TABLE_ALIAS` since an unsupported item never
/// has a usable bare name.
pub(crate) fn lower_table_factor(tf: &ast::TableFactor) -> Result<FromItemNode, String> {
    match tf {
        ast::TableFactor::Table { name, alias, .. } => {
            let (schema, rel_name) = split_object_name(name);
            Ok(FromItemNode {
                item: FromItem::BaseRel { schema, name: rel_name },
                alias: alias.as_ref().map(|a| ident_from(&a.name)),
            })
        }
        ast::TableFactor::Derived { subquery, alias, .. } => {
            let body = lower_query(subquery);
            Ok(FromItemNode {
                item: FromItem::Subquery(Box::new(body)),
                alias: alias.as_ref().map(|a| ident_from(&a.name)),
            })
        }
        _ => Ok(FromItemNode { item: FromItem::Unsupported, alias: None }),
    }
}

/// Split an `ObjectName` into (schema, table), taking the last two parts.
/// A name with more than two parts (catalog.schema.table) still resolves
/// sensibly because only the trailing schema/table pair ever matters to
/// policy lookups.
pub(crate) fn split_object_name(
    name: &ast::ObjectName,
) -> (Option<queryguard_core::Identifier>, queryguard_core::Identifier) {
    let parts = &name.0;
    match parts.len() {
        0 => (None, queryguard_core::Identifier::new("_")),
        1 => (None, super::ident_from(&parts[0])),
        _ => {
            let table = super::ident_from(&parts[parts.len() - 1]);
            let schema = super::ident_from(&parts[parts.len() - 2]);
            (Some(schema), table)
        }
    }
}

pub(crate) fn lower_join(j: &ast::Join) -> Result<Join, String> {
    let right = lower_table_factor(&j.relation)?;
    let (kind, constraint) = match &j.join_operator {
        ast::JoinOperator::Inner(c) => (JoinKind::Inner, Some(c)),
        ast::JoinOperator::LeftOuter(c) => (JoinKind::Left, Some(c)),
        ast::JoinOperator::RightOuter(c) => (JoinKind::Right, Some(c)),
        ast::JoinOperator::FullOuter(c) => (JoinKind::Full, Some(c)),
        ast::JoinOperator::CrossJoin => (JoinKind::Cross, None),
        other => {
            log::warn!("unrecognized join operator {other:?}, lowering as unsupported (validator will reject)");
            (JoinKind::Unsupported, None)
        }
    };

    let on = match constraint {
        Some(ast::JoinConstraint::On(expr)) => Some(lower_expr(expr)?),
        Some(ast::JoinConstraint::Using(_)) | Some(ast::JoinConstraint::Natural) | Some(ast::JoinConstraint::None) => {
            None
        }
        None => None,
    };

    Ok(Join { kind, right, on })
}
