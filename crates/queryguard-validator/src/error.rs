//! The validator's closed error taxonomy (spec §4.4, §7). Every code maps
//! 1:1 to a user-visible message; `VERR_ANALYZE_FAIL` is the only code
//! reserved for internal invariant violations and is never expected to
//! fire on well-formed input.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerrCode {
    ParseFail,
    UnsupportedQuery,
    Star,
    NoTableAlias,
    NoColumnAlias,
    JoinNotInner,
    JoinOnInvalid,
    JoinOnSensitive,
    FuncUnsafe,
    SensitiveSelectExpr,
    SensitiveLoc,
    SensitiveCmp,
    WhereNotConj,
    ParamOutsideWhere,
    ParamNonSensitive,
    SensitiveOutsideMain,
    DistinctSensitive,
    OffsetSensitive,
    LimitRequired,
    LimitExceeds,
    AnalyzeFail,
}

impl VerrCode {
    /// The stable token embedded in diagnostics and asserted on by tests
    /// (spec §4.4: "exact wording is not part of the contract except for
    /// these tokens embedded verbatim").
    pub fn as_str(&self) -> &'static str {
        match self {
            VerrCode::ParseFail => "VERR_PARSE_FAIL",
            VerrCode::UnsupportedQuery => "VERR_UNSUPPORTED_QUERY",
            VerrCode::Star => "VERR_STAR",
            VerrCode::NoTableAlias => "VERR_NO_TABLE_ALIAS",
            VerrCode::NoColumnAlias => "VERR_NO_COLUMN_ALIAS",
            VerrCode::JoinNotInner => "VERR_JOIN_NOT_INNER",
            VerrCode::JoinOnInvalid => "VERR_JOIN_ON_INVALID",
            VerrCode::JoinOnSensitive => "VERR_JOIN_ON_SENSITIVE",
            VerrCode::FuncUnsafe => "VERR_FUNC_UNSAFE",
            VerrCode::SensitiveSelectExpr => "VERR_SENSITIVE_SELECT_EXPR",
            VerrCode::SensitiveLoc => "VERR_SENSITIVE_LOC",
            VerrCode::SensitiveCmp => "VERR_SENSITIVE_CMP",
            VerrCode::WhereNotConj => "VERR_WHERE_NOT_CONJ",
            VerrCode::ParamOutsideWhere => "VERR_PARAM_OUTSIDE_WHERE",
            VerrCode::ParamNonSensitive => "VERR_PARAM_NON_SENSITIVE",
            VerrCode::SensitiveOutsideMain => "VERR_SENSITIVE_OUTSIDE_MAIN",
            VerrCode::DistinctSensitive => "VERR_DISTINCT_SENSITIVE",
            VerrCode::OffsetSensitive => "VERR_OFFSET_SENSITIVE",
            VerrCode::LimitRequired => "VERR_LIMIT_REQUIRED",
            VerrCode::LimitExceeds => "VERR_LIMIT_EXCEEDS",
            VerrCode::AnalyzeFail => "VERR_ANALYZE_FAIL",
        }
    }
}

impl std::fmt::Display for VerrCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The validator's rejection: a code plus a human-readable message that
/// embeds the offending identifier where available (spec §4.4).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ValidationError {
    pub code: VerrCode,
    pub message: String,
}

impl ValidationError {
    pub fn new(code: VerrCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}
