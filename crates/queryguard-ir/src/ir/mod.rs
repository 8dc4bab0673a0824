//! The Query IR: a tagged tree representing one SELECT statement,
//! including nested sub-queries and CTE bodies (spec §3).
//!
//! Every `Query` here is owned by the validator for the duration of one
//! `validate` call — in this crate that simply means ordinary Rust
//! ownership; a `Query` tree is freed (its "arena" reset) the moment it is
//! dropped, with no separate allocator to manage.

pub mod expr;

pub use expr::{BinaryOp, CaseArm, Expr, Literal};

use queryguard_core::Identifier;

/// Outcome of the parser collaborator's attempt to produce this `Query`.
/// The validator treats both non-`Ok` statuses as an immediate reject
/// (`VERR_PARSE_FAIL` / `VERR_UNSUPPORTED_QUERY`) before it ever looks at
/// the rest of the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryStatus {
    Ok,
    ParseError { message: String },
    Unsupported { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryFlags {
    pub has_distinct: bool,
    pub has_offset: bool,
}

/// One SELECT statement: the root of the tree for the outermost query, or
/// the body of a CTE, or the target of a `FromItem::Subquery` /
/// `Expr::Subquery`.
#[derive(Debug, Clone)]
pub struct Query {
    pub status: QueryStatus,
    pub select_items: Vec<SelectItem>,
    pub from_items: Vec<FromItemNode>,
    pub joins: Vec<Join>,
    pub ctes: Vec<Cte>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<Expr>,
    /// Signed; `-1` means LIMIT is absent (spec §3).
    pub limit_value: i64,
    pub flags: QueryFlags,
}

impl Query {
    pub fn is_ok(&self) -> bool {
        matches!(self.status, QueryStatus::Ok)
    }

    /// `nselect` of this query — the number of entries the output plan
    /// must carry if this is the outermost query of an accepted request.
    pub fn nselect(&self) -> usize {
        self.select_items.len()
    }

    pub fn has_limit(&self) -> bool {
        self.limit_value >= 0
    }
}

/// A FROM or JOIN right-hand target, tagged by shape.
#[derive(Debug, Clone)]
pub enum FromItem {
    BaseRel {
        schema: Option<Identifier>,
        name: Identifier,
    },
    Subquery(Box<Query>),
    CteRef(Identifier),
    /// `VALUES (...) AS alias(col1, col2, ...)`.
    Values(Vec<Identifier>),
    /// A construct lowering declined to model precisely (e.g. a
    /// table-valued function call, a LATERAL join target).
    Unsupported,
}

/// A `FromItem` paired with its optional alias, exactly as it appeared in
/// one FROM-list or JOIN right-hand-side slot.
#[derive(Debug, Clone)]
pub struct FromItemNode {
    pub item: FromItem,
    pub alias: Option<Identifier>,
}

impl FromItemNode {
    /// The name the alias table should key this item under: the explicit
    /// alias if present, or the bare relation name for an unaliased
    /// `BaseRel` when it alone is unambiguous. Anything else has no usable
    /// name and the validator rejects it with `VERR_NO_TABLE_ALIAS`.
    pub fn alias_or_bare_name(&self) -> Option<&Identifier> {
        self.alias.as_ref().or_else(|| match &self.item {
            FromItem::BaseRel { name, .. } => Some(name),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
    Unsupported,
}

#[derive(Debug, Clone)]
pub struct Join {
    pub kind: JoinKind,
    pub right: FromItemNode,
    pub on: Option<Expr>,
}

/// One entry of a SELECT list.
#[derive(Debug, Clone)]
pub struct SelectItem {
    pub alias: Option<Identifier>,
    pub value: Expr,
}

/// One `WITH name AS (body)` entry.
#[derive(Debug, Clone)]
pub struct Cte {
    pub name: Identifier,
    pub body: Box<Query>,
}
