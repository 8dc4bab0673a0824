use sqlparser::ast;

use queryguard_core::QualifiedName;

use crate::ir::{BinaryOp, CaseArm, Expr, Literal};

use super::ident;
use super::join::split_object_name;
use super::query::lower_query;

/// Lower one scalar expression. Returns `Err(reason)` only for shapes that
/// make the enclosing query itself unsupported (a subquery body lowering
/// hit bottom); anything merely outside scope at this node becomes
/// `Expr::Unsupported` so the validator can react to it in place instead of
/// aborting the whole statement.
pub(crate) fn lower_expr(e: &ast::Expr) -> Result<Expr, String> {
    Ok(match e {
        ast::Expr::Identifier(id) => Expr::BareIdent(ident(&id.value)),
        ast::Expr::CompoundIdentifier(parts) => lower_compound_identifier(parts),
        // `$n` bound parameters arrive from sqlparser as a `Value::Placeholder`
        // with text like `"$1"` rather than a dedicated AST node; recognized
        // here so every call site (SELECT list, WHERE, function args, ...)
        // sees a uniform `Expr::Param` regardless of where it occurs.
        ast::Expr::Value(ast::Value::Placeholder(p)) => match parse_param_index(p) {
            Some(index) => Expr::Param(index),
            None => Expr::Unsupported(format!("malformed parameter placeholder `{p}`")),
        },
        ast::Expr::Value(v) => Expr::Literal(lower_value(v)),
        ast::Expr::TypedString { value, .. } => Expr::Literal(Literal::String(value.clone())),
        ast::Expr::Nested(inner) => lower_expr(inner)?,
        ast::Expr::UnaryOp { op: ast::UnaryOperator::Not, expr } => {
            Expr::UnaryNot(Box::new(lower_expr(expr)?))
        }
        ast::Expr::UnaryOp { .. } => Expr::Unsupported("unary arithmetic operator".to_string()),
        ast::Expr::BinaryOp { left, op, right } => lower_binary_op(left, op, right)?,
        ast::Expr::Like { negated, expr, pattern, escape_char: _ } => Expr::Binary {
            kind: if *negated { BinaryOp::NotLike } else { BinaryOp::Like },
            lhs: Box::new(lower_expr(expr)?),
            rhs: Box::new(lower_expr(pattern)?),
        },
        ast::Expr::IsNull(inner) => Expr::Binary {
            kind: BinaryOp::Eq,
            lhs: Box::new(lower_expr(inner)?),
            rhs: Box::new(Expr::Literal(Literal::Null)),
        },
        ast::Expr::IsNotNull(inner) => Expr::UnaryNot(Box::new(Expr::Binary {
            kind: BinaryOp::Eq,
            lhs: Box::new(lower_expr(inner)?),
            rhs: Box::new(Expr::Literal(Literal::Null)),
        })),
        // BETWEEN low AND high desugars to (expr >= low AND expr <= high);
        // NOT BETWEEN wraps that in UnaryNot (spec §3: "BETWEEN/NOT-BETWEEN
        // ... are normalized to Binary/In trees by the parser").
        ast::Expr::Between { expr, negated, low, high } => {
            let lowered = lower_expr(expr)?;
            let ge = Expr::Binary {
                kind: BinaryOp::Ge,
                lhs: Box::new(lowered.clone()),
                rhs: Box::new(lower_expr(low)?),
            };
            let le = Expr::Binary {
                kind: BinaryOp::Le,
                lhs: Box::new(lowered),
                rhs: Box::new(lower_expr(high)?),
            };
            let conj = Expr::Binary { kind: BinaryOp::And, lhs: Box::new(ge), rhs: Box::new(le) };
            if *negated { Expr::UnaryNot(Box::new(conj)) } else { conj }
        }
        ast::Expr::InList { expr, list, negated } => {
            let lhs = Box::new(lower_expr(expr)?);
            let mut items = Vec::with_capacity(list.len());
            for item in list {
                items.push(lower_expr(item)?);
            }
            let in_expr = Expr::In { lhs, items };
            if *negated { Expr::UnaryNot(Box::new(in_expr)) } else { in_expr }
        }
        ast::Expr::InSubquery { expr, subquery, negated } => {
            let lhs = Box::new(lower_expr(expr)?);
            let subq = Expr::Subquery(Box::new(lower_query(subquery)));
            let in_expr = Expr::In { lhs, items: vec![subq] };
            if *negated { Expr::UnaryNot(Box::new(in_expr)) } else { in_expr }
        }
        // ANY/ALL desugar to an equivalent IN/comparison tree (spec §3).
        // `= ANY (list)` behaves like `IN (list)`; other comparison
        // operators against ANY/ALL have no single Binary/In equivalent
        // and are left unsupported for the validator to reject in place.
        ast::Expr::AnyOp { left, compare_op: ast::BinaryOperator::Eq, right, .. } => Expr::In {
            lhs: Box::new(lower_expr(left)?),
            items: vec![lower_expr(right)?],
        },
        ast::Expr::AnyOp { .. } | ast::Expr::AllOp { .. } => {
            Expr::Unsupported("ANY/ALL comparison other than `= ANY`".to_string())
        }
        ast::Expr::Case { operand, conditions, results, else_result } => {
            let arg = match operand {
                Some(o) => Some(Box::new(lower_expr(o)?)),
                None => None,
            };
            let mut arms = Vec::with_capacity(conditions.len());
            for (when, then) in conditions.iter().zip(results.iter()) {
                arms.push(CaseArm { when: lower_expr(when)?, then: lower_expr(then)? });
            }
            let else_expr = match else_result {
                Some(e) => Some(Box::new(lower_expr(e)?)),
                None => None,
            };
            Expr::Case { arg, arms, else_expr }
        }
        ast::Expr::Cast { expr, data_type, .. } => Expr::Cast {
            expr: Box::new(lower_expr(expr)?),
            type_name: data_type.to_string(),
        },
        ast::Expr::Function(func) => lower_function(func)?,
        ast::Expr::Subquery(q) => Expr::Subquery(Box::new(lower_query(q))),
        ast::Expr::Exists { subquery, negated } => {
            let sub = Expr::Subquery(Box::new(lower_query(subquery)));
            if *negated { Expr::UnaryNot(Box::new(sub)) } else { sub }
        }
        ast::Expr::Wildcard(_) | ast::Expr::QualifiedWildcard(_, _) => Expr::Wildcard,
        other => Expr::Unsupported(format!("expression shape not supported: {other}")),
    })
}

fn lower_compound_identifier(parts: &[ast::Ident]) -> Expr {
    if parts.len() < 2 {
        return Expr::Unsupported("compound identifier with fewer than two parts".to_string());
    }
    let column = ident(&parts[parts.len() - 1].value);
    let qualifier = ident(&parts[parts.len() - 2].value);
    Expr::ColRef { qualifier, column }
}

fn lower_value(v: &ast::Value) -> Literal {
    match v {
        ast::Value::Number(n, _) => {
            if let Ok(i) = n.parse::<i64>() {
                Literal::Int(i)
            } else {
                n.parse::<f64>().map(Literal::Float).unwrap_or(Literal::Null)
            }
        }
        ast::Value::SingleQuotedString(s) | ast::Value::DoubleQuotedString(s) => {
            Literal::String(s.clone())
        }
        ast::Value::Boolean(b) => Literal::Bool(*b),
        ast::Value::Null => Literal::Null,
        other => Literal::String(other.to_string()),
    }
}

fn parse_param_index(raw: &str) -> Option<u32> {
    raw.strip_prefix('$').and_then(|s| s.parse::<u32>().ok())
}

fn lower_binary_op(
    left: &ast::Expr,
    op: &ast::BinaryOperator,
    right: &ast::Expr,
) -> Result<Expr, String> {
    let kind = match op {
        ast::BinaryOperator::And => BinaryOp::And,
        ast::BinaryOperator::Or => BinaryOp::Or,
        ast::BinaryOperator::Eq => BinaryOp::Eq,
        ast::BinaryOperator::NotEq => BinaryOp::Ne,
        ast::BinaryOperator::Lt => BinaryOp::Lt,
        ast::BinaryOperator::LtEq => BinaryOp::Le,
        ast::BinaryOperator::Gt => BinaryOp::Gt,
        ast::BinaryOperator::GtEq => BinaryOp::Ge,
        _ => {
            return Ok(Expr::Unsupported(format!("binary operator not supported: {op}")));
        }
    };
    Ok(Expr::Binary {
        kind,
        lhs: Box::new(lower_expr(left)?),
        rhs: Box::new(lower_expr(right)?),
    })
}

fn lower_function(func: &ast::Function) -> Result<Expr, String> {
    let (schema, name) = split_object_name(&func.name);
    let qualname = match schema {
        Some(s) => QualifiedName::qualified(s, name),
        None => QualifiedName::unqualified(name),
    };

    let (args, is_distinct, is_star) = lower_function_args(&func.args);

    if let Some(over) = &func.over {
        let (partition_by, order_by) = lower_window_spec(over)?;
        return Ok(Expr::WindowFunc {
            func: Box::new(Expr::FuncCall { qualname, args, is_distinct, is_star }),
            partition_by,
            order_by,
            has_frame: true,
        });
    }

    Ok(Expr::FuncCall { qualname, args, is_distinct, is_star })
}

/// Lower a window's `PARTITION BY`/`ORDER BY` lists so the validator's
/// `scan_general` walk can see any sensitive column referenced only inside
/// an `OVER (...)` clause (spec §9 Open Question (c)). A named window
/// reference (`OVER window_name`, defined in a `WINDOW` clause this system
/// does not track) carries no inline expressions to lower, so it yields
/// empty lists rather than an error.
fn lower_window_spec(over: &ast::WindowType) -> Result<(Vec<Expr>, Vec<Expr>), String> {
    let ast::WindowType::WindowSpec(spec) = over else {
        return Ok((Vec::new(), Vec::new()));
    };

    let mut partition_by = Vec::with_capacity(spec.partition_by.len());
    for e in &spec.partition_by {
        partition_by.push(lower_expr(e)?);
    }

    let mut order_by = Vec::with_capacity(spec.order_by.len());
    for order_expr in &spec.order_by {
        order_by.push(lower_expr(&order_expr.expr)?);
    }

    Ok((partition_by, order_by))
}

/// sqlparser models call arguments as a `FunctionArguments` enum across a
/// few shapes (`None`, `Subquery`, `List`); we only need the argument
/// expressions, the DISTINCT flag, and whether the sole argument is `*`.
fn lower_function_args(args: &ast::FunctionArguments) -> (Vec<Expr>, bool, bool) {
    match args {
        ast::FunctionArguments::List(list) => {
            let is_distinct = matches!(list.duplicate_treatment, Some(ast::DuplicateTreatment::Distinct));
            let mut out = Vec::with_capacity(list.args.len());
            let mut is_star = false;
            for arg in &list.args {
                match arg {
                    ast::FunctionArg::Unnamed(ast::FunctionArgExpr::Wildcard) => {
                        is_star = true;
                    }
                    ast::FunctionArg::Unnamed(ast::FunctionArgExpr::Expr(e)) => {
                        out.push(lower_expr(e).unwrap_or_else(|reason| Expr::Unsupported(reason)));
                    }
                    ast::FunctionArg::Named { arg: ast::FunctionArgExpr::Expr(e), .. } => {
                        out.push(lower_expr(e).unwrap_or_else(|reason| Expr::Unsupported(reason)));
                    }
                    _ => out.push(Expr::Unsupported("unsupported function argument".to_string())),
                }
            }
            (out, is_distinct, is_star)
        }
        _ => (Vec::new(), false, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlparser::dialect::PostgreSqlDialect;
    use sqlparser::parser::Parser;

    fn parse_expr(sql: &str) -> ast::Expr {
        let full = format!("SELECT {sql}");
        let mut stmts = Parser::parse_sql(&PostgreSqlDialect {}, &full).unwrap();
        match stmts.remove(0) {
            ast::Statement::Query(q) => match *q.body {
                ast::SetExpr::Select(select) => match select.projection.into_iter().next().unwrap() {
                    ast::SelectItem::UnnamedExpr(e) => e,
                    other => panic!("unexpected projection item: {other:?}"),
                },
                other => panic!("unexpected query body: {other:?}"),
            },
            other => panic!("unexpected statement: {other:?}"),
        }
    }

    #[test]
    fn compound_identifier_becomes_colref() {
        let e = lower_expr(&parse_expr("u.fiscal_code")).unwrap();
        assert!(matches!(e, Expr::ColRef { .. }));
    }

    #[test]
    fn between_desugars_to_and_of_comparisons() {
        let e = lower_expr(&parse_expr("u.id BETWEEN 1 AND 10")).unwrap();
        match e {
            Expr::Binary { kind: BinaryOp::And, lhs, rhs } => {
                assert!(matches!(*lhs, Expr::Binary { kind: BinaryOp::Ge, .. }));
                assert!(matches!(*rhs, Expr::Binary { kind: BinaryOp::Le, .. }));
            }
            other => panic!("expected AND tree, got {other:?}"),
        }
    }

    #[test]
    fn not_between_wraps_in_unary_not() {
        let e = lower_expr(&parse_expr("u.id NOT BETWEEN 1 AND 10")).unwrap();
        assert!(matches!(e, Expr::UnaryNot(_)));
    }

    #[test]
    fn in_list_lowers_to_in_variant() {
        let e = lower_expr(&parse_expr("u.id IN (1, 2, 3)")).unwrap();
        match e {
            Expr::In { items, .. } => assert_eq!(items.len(), 3),
            other => panic!("expected In, got {other:?}"),
        }
    }

    #[test]
    fn not_in_wraps_in_unary_not() {
        let e = lower_expr(&parse_expr("u.id NOT IN (1, 2)")).unwrap();
        assert!(matches!(e, Expr::UnaryNot(_)));
    }

    #[test]
    fn any_eq_desugars_to_in() {
        let e = lower_expr(&parse_expr("u.id = ANY(vals)")).unwrap();
        assert!(matches!(e, Expr::In { .. }));
    }

    #[test]
    fn placeholder_becomes_param() {
        let e = lower_expr(&parse_expr("$1")).unwrap();
        assert!(matches!(e, Expr::Param(1)));
    }

    #[test]
    fn bare_identifier_lowers_to_bare_ident() {
        let e = lower_expr(&parse_expr("id")).unwrap();
        assert!(matches!(e, Expr::BareIdent(_)));
    }

    #[test]
    fn window_func_lowers_partition_and_order_by_expressions() {
        let e = lower_expr(&parse_expr("first_value(u.name) OVER (PARTITION BY u.dept ORDER BY u.fiscal_code)"))
            .unwrap();
        match e {
            Expr::WindowFunc { partition_by, order_by, .. } => {
                assert_eq!(partition_by.len(), 1);
                assert!(matches!(order_by.as_slice(), [Expr::ColRef { .. }]));
            }
            other => panic!("expected WindowFunc, got {other:?}"),
        }
    }

    #[test]
    fn unqualified_function_call_lowers() {
        let e = lower_expr(&parse_expr("count(*)")).unwrap();
        match e {
            Expr::FuncCall { qualname, is_star, .. } => {
                assert_eq!(qualname.to_canonical_string(), "count");
                assert!(is_star);
            }
            other => panic!("expected FuncCall, got {other:?}"),
        }
    }
}
