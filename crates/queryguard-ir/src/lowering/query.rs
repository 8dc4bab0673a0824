use sqlparser::ast::{self, SetExpr, Statement};

use crate::ir::{Cte, Query, QueryFlags, QueryStatus, SelectItem};

use crate::ir::JoinKind;

use super::expr::lower_expr;
use super::ident_from;
use super::join::{lower_join, lower_table_factor};

/// Entry point: lower one top-level statement. Only `Statement::Query`
/// wrapping a SELECT body is in scope; everything else (DML, DDL, SET,
/// EXPLAIN, ...) is deliberately out of scope (spec §1 Non-goals) and
/// comes back as `Unsupported`.
pub fn lower_statement(stmt: &Statement) -> Query {
    match stmt {
        Statement::Query(query) => lower_query(query),
        other => {
            log::warn!("rejecting statement kind outside read-only SELECT scope: {other}");
            unsupported_query(format!("statement kind not supported: {other}"))
        }
    }
}

fn unsupported_query(reason: String) -> Query {
    Query {
        status: QueryStatus::Unsupported { reason },
        select_items: Vec::new(),
        from_items: Vec::new(),
        joins: Vec::new(),
        ctes: Vec::new(),
        where_clause: None,
        group_by: Vec::new(),
        having: None,
        order_by: Vec::new(),
        limit_value: -1,
        flags: QueryFlags::default(),
    }
}

/// Lower an `ast::Query` (a SELECT, possibly wrapped in `WITH ... ` and
/// trailing `ORDER BY`/`LIMIT`/`OFFSET`).
pub(crate) fn lower_query(query: &ast::Query) -> Query {
    let mut ir = match query.body.as_ref() {
        SetExpr::Select(select) => lower_select(select),
        SetExpr::Query(nested) => lower_query(nested),
        other => unsupported_query(format!("query shape not supported: {other}")),
    };

    if !ir.is_ok() {
        return ir;
    }

    if let Some(with) = &query.with {
        if with.recursive {
            return unsupported_query("recursive CTEs are not supported".to_string());
        }
        for cte_ast in &with.cte_tables {
            let body = lower_query(&cte_ast.query);
            if !body.is_ok() {
                return unsupported_query(format!(
                    "CTE `{}` body is unsupported",
                    cte_ast.alias.name
                ));
            }
            ir.ctes.push(Cte {
                name: ident_from(&cte_ast.alias.name),
                body: Box::new(body),
            });
        }
    }

    for order_expr in &query.order_by {
        match lower_expr(&order_expr.expr) {
            Ok(e) => ir.order_by.push(e),
            Err(reason) => return unsupported_query(reason),
        }
    }

    if let Some(limit) = &query.limit {
        match limit {
            ast::Expr::Value(ast::Value::Number(n, _)) => {
                ir.limit_value = n.parse::<i64>().unwrap_or(-1);
            }
            _ => return unsupported_query("LIMIT must be a literal integer".to_string()),
        }
    }

    if query.offset.is_some() {
        ir.flags.has_offset = true;
    }

    ir
}

fn lower_select(select: &ast::Select) -> Query {
    let mut from_items = Vec::new();
    let mut joins = Vec::new();
    for (i, twj) in select.from.iter().enumerate() {
        let main_node = match lower_table_factor(&twj.relation) {
            Ok(node) => node,
            Err(reason) => return unsupported_query(reason),
        };
        if i == 0 {
            from_items.push(main_node);
        } else {
            // `FROM a, b` — a comma-separated item is an implicit CROSS
            // JOIN (spec's VERR_NO_TABLE_ALIAS / VERR_JOIN_NOT_INNER rules
            // apply to it exactly as they would to an explicit one).
            joins.push(crate::ir::Join { kind: JoinKind::Cross, right: main_node, on: None });
        }
        for j in &twj.joins {
            match lower_join(j) {
                Ok(join_ir) => joins.push(join_ir),
                Err(reason) => return unsupported_query(reason),
            }
        }
    }

    let mut select_items = Vec::with_capacity(select.projection.len());
    for item in &select.projection {
        match lower_select_item(item) {
            Ok(si) => select_items.push(si),
            Err(reason) => return unsupported_query(reason),
        }
    }

    let where_clause = match &select.selection {
        Some(e) => match lower_expr(e) {
            Ok(expr) => Some(expr),
            Err(reason) => return unsupported_query(reason),
        },
        None => None,
    };

    let mut group_by = Vec::new();
    if let ast::GroupByExpr::Expressions(exprs, _) = &select.group_by {
        for e in exprs {
            match lower_expr(e) {
                Ok(expr) => group_by.push(expr),
                Err(reason) => return unsupported_query(reason),
            }
        }
    }

    let having = match &select.having {
        Some(e) => match lower_expr(e) {
            Ok(expr) => Some(expr),
            Err(reason) => return unsupported_query(reason),
        },
        None => None,
    };

    Query {
        status: QueryStatus::Ok,
        select_items,
        from_items,
        joins,
        ctes: Vec::new(),
        where_clause,
        group_by,
        having,
        order_by: Vec::new(),
        limit_value: -1,
        flags: QueryFlags {
            has_distinct: select.distinct.is_some(),
            has_offset: false,
        },
    }
}

fn lower_select_item(item: &ast::SelectItem) -> Result<SelectItem, String> {
    use crate::ir::Expr;
    match item {
        ast::SelectItem::UnnamedExpr(e) => Ok(SelectItem { alias: None, value: lower_expr(e)? }),
        ast::SelectItem::ExprWithAlias { expr, alias } => Ok(SelectItem {
            alias: Some(ident_from(alias)),
            value: lower_expr(expr)?,
        }),
        ast::SelectItem::Wildcard(_) | ast::SelectItem::QualifiedWildcard(_, _) => {
            Ok(SelectItem { alias: None, value: Expr::Wildcard })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlparser::dialect::PostgreSqlDialect;

    fn lower_sql(sql: &str) -> Query {
        let mut stmts = sqlparser::parser::Parser::parse_sql(&PostgreSqlDialect {}, sql).unwrap();
        lower_statement(&stmts.remove(0))
    }

    #[test]
    fn simple_select_lowers_ok() {
        let q = lower_sql("SELECT u.name FROM users u WHERE u.id = 1");
        assert!(q.is_ok());
        assert_eq!(q.nselect(), 1);
        assert_eq!(q.from_items.len(), 1);
        assert!(q.where_clause.is_some());
    }

    #[test]
    fn select_star_preserved_as_wildcard() {
        let q = lower_sql("SELECT u.* FROM users u");
        assert!(q.is_ok());
        assert!(matches!(q.select_items[0].value, crate::ir::Expr::Wildcard));
    }

    #[test]
    fn limit_and_offset_flags() {
        let q = lower_sql("SELECT u.id FROM users u LIMIT 10 OFFSET 5");
        assert_eq!(q.limit_value, 10);
        assert!(q.flags.has_offset);
    }

    #[test]
    fn no_limit_is_sentinel_negative_one() {
        let q = lower_sql("SELECT u.id FROM users u");
        assert_eq!(q.limit_value, -1);
        assert!(!q.has_limit());
    }

    #[test]
    fn distinct_flag_set() {
        let q = lower_sql("SELECT DISTINCT u.id FROM users u");
        assert!(q.flags.has_distinct);
    }

    #[test]
    fn cte_lowers_into_ctes_vec() {
        let q = lower_sql("WITH t AS (SELECT u.id FROM users u) SELECT t.id FROM t");
        assert!(q.is_ok());
        assert_eq!(q.ctes.len(), 1);
        assert_eq!(q.ctes[0].name.as_str(), "t");
    }

    #[test]
    fn comma_join_becomes_cross_join() {
        let q = lower_sql("SELECT a.id FROM users a, expenses b");
        assert_eq!(q.joins.len(), 1);
        assert_eq!(q.joins[0].kind, crate::ir::JoinKind::Cross);
    }

    #[test]
    fn insert_statement_is_unsupported() {
        let q = lower_sql("INSERT INTO users (id) VALUES (1)");
        assert!(!q.is_ok());
    }

    #[test]
    fn left_join_kind_preserved() {
        let q = lower_sql("SELECT a.id FROM users a LEFT JOIN expenses b ON b.user_id = a.id");
        assert_eq!(q.joins.len(), 1);
        assert_eq!(q.joins[0].kind, crate::ir::JoinKind::Left);
    }
}
