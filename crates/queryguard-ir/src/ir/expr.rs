//! Expression variants of the Query IR (spec: `Expr`).

use queryguard_core::QualifiedName;

use super::Query;

/// A scalar literal. Strings and numbers are kept in their original text
/// form where the source representation matters (e.g. large integers);
/// parsed numeric values are used only where the validator needs them.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
}

/// Binary operator kinds the validator distinguishes. BETWEEN, NOT BETWEEN,
/// ANY/ALL and NOT IN are desugared during lowering into trees of these
/// plus [`Expr::In`] and [`Expr::UnaryNot`] — there is no BETWEEN variant
/// here by design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
}

/// One `WHEN ... THEN ...` arm of a CASE expression.
#[derive(Debug, Clone)]
pub struct CaseArm {
    pub when: Expr,
    pub then: Expr,
}

/// A tagged node in the expression tree.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A column reference; `qualifier` is always non-empty — the parser
    /// collaborator never emits an unqualified ColRef (spec invariant).
    ColRef {
        qualifier: queryguard_core::Identifier,
        column: queryguard_core::Identifier,
    },
    /// An unqualified identifier. Never a valid column reference on its
    /// own (the IR invariant requires a qualifier) — but ORDER BY/GROUP BY
    /// may legally reference an output alias this way, so lowering keeps
    /// it distinct from `Unsupported` and leaves resolving it to the
    /// validator's alias/output-column tables.
    BareIdent(queryguard_core::Identifier),
    /// `$n`, one-based per the SQL surface syntax.
    Param(u32),
    Literal(Literal),
    UnaryNot(Box<Expr>),
    Binary {
        kind: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `lhs IN (items...)`. NOT IN lowers to `UnaryNot(In(..))`.
    In {
        lhs: Box<Expr>,
        items: Vec<Expr>,
    },
    Case {
        arg: Option<Box<Expr>>,
        arms: Vec<CaseArm>,
        else_expr: Option<Box<Expr>>,
    },
    FuncCall {
        qualname: QualifiedName,
        args: Vec<Expr>,
        is_distinct: bool,
        is_star: bool,
    },
    /// A function call carrying an `OVER (...)` clause. Kept distinct from
    /// `FuncCall` so the validator can reject it outright per §9 Open
    /// Question (c) without inspecting OVER internals.
    WindowFunc {
        func: Box<Expr>,
        partition_by: Vec<Expr>,
        order_by: Vec<Expr>,
        has_frame: bool,
    },
    Cast {
        expr: Box<Expr>,
        type_name: String,
    },
    Subquery(Box<Query>),
    /// `alias.*` or bare `*` inside a SELECT list. The validator's
    /// `VERR_STAR` rule matches this variant wherever it appears in a
    /// SELECT list; elsewhere it falls through to `VERR_ANALYZE_FAIL` or a
    /// shape rule depending on location.
    Wildcard,
    /// A construct lowering declined to model precisely: an unqualified
    /// column reference (the IR invariant requires every `ColRef` to carry
    /// a qualifier), a window frame, a LATERAL-only shape, or anything
    /// else outside scope. Carries a short label for diagnostics.
    Unsupported(String),
}

impl Expr {
    /// True for the shapes the sensitive-select-expr rule treats as "bare":
    /// a plain column reference with nothing wrapped around it.
    pub fn is_bare_colref(&self) -> bool {
        matches!(self, Expr::ColRef { .. })
    }
}
