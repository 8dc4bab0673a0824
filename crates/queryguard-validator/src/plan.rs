//! Output Plan (spec §3): produced on successful validation, one entry per
//! SELECT output column of the outermost Query.

/// One output column's disclosure tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanEntry {
    Plaintext,
    /// `source_col_id` is the canonical "[schema.]table.column" string of
    /// the originating base relation.
    Token { source_col_id: String },
}

/// An ordered sequence, one entry per SELECT output column of the
/// outermost Query. Invariant: `plan.len() == nselect` of the outermost
/// query on success; empty iff validation failed (spec §3, §6).
pub type OutputPlan = Vec<PlanEntry>;
