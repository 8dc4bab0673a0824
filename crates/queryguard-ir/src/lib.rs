//! queryguard-ir — the Query IR and the lowering pass that builds it from
//! a parsed `sqlparser` AST.

pub mod ir;
pub mod lowering;

pub use ir::{
    BinaryOp, CaseArm, Cte, Expr, FromItem, FromItemNode, Join, JoinKind, Literal, Query,
    QueryFlags, QueryStatus, SelectItem,
};
pub use lowering::lower_statement;
