//! ASCII-lowercased, non-empty identifier newtype and qualified names.
//!
//! Every SQL identifier the validator touches — a table, a column, a
//! function name — passes through [`Identifier::new`] exactly once, at the
//! point it enters the system (either the parser collaborator's lowering
//! pass or the policy catalog's config loader). After that, identifier
//! comparison is ordinary bytewise `==` on already-lowercased bytes; no
//! call site needs to remember to re-lowercase or re-compare
//! case-insensitively.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// A non-empty, ASCII-lowercased identifier (table, column, or function name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Identifier(String);

impl Identifier {
    /// Build an identifier, lowercasing ASCII bytes. Panics on empty input.
    ///
    /// Prefer [`try_new`](Self::try_new) for input that was not already
    /// validated non-empty upstream (e.g. raw config values).
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self::try_new(raw).expect("identifier must not be empty")
    }

    /// Build an identifier, returning `None` if `raw` is empty.
    pub fn try_new(raw: impl AsRef<str>) -> Option<Self> {
        let raw = raw.as_ref();
        if raw.is_empty() {
            return None;
        }
        Some(Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Identifier::try_new(&s).ok_or_else(|| serde::de::Error::custom("identifier must not be empty"))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Identifier {
    fn eq(&self, other: &str) -> bool {
        // `other` is compared as-is: callers that want case-insensitive
        // comparison against a raw string must lowercase it themselves.
        self.0 == other
    }
}

/// An ordered pair (schema, name). `schema` is `None` for an unqualified
/// reference — spec's "schema may be empty meaning unqualified".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub schema: Option<Identifier>,
    pub name: Identifier,
}

impl QualifiedName {
    pub fn unqualified(name: Identifier) -> Self {
        Self { schema: None, name }
    }

    pub fn qualified(schema: Identifier, name: Identifier) -> Self {
        Self {
            schema: Some(schema),
            name,
        }
    }

    /// Canonical "[schema.]table" or "[schema.]table.column" rendering, used
    /// for `source_col_id` in the output plan and for config lookups.
    pub fn to_canonical_string(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{schema}.{}", self.name),
            None => self.name.to_string(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

/// A canonical "[schema.]table.column" triple, used for `source_col_id` and
/// for matching against `column_policy` entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub schema: Option<Identifier>,
    pub table: Identifier,
    pub column: Identifier,
}

impl ColumnRef {
    pub fn new(schema: Option<Identifier>, table: Identifier, column: Identifier) -> Self {
        Self {
            schema,
            table,
            column,
        }
    }

    pub fn to_canonical_string(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{schema}.{}.{}", self.table, self.column),
            None => format!("{}.{}", self.table, self.column),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_on_construction() {
        let id = Identifier::new("Fiscal_Code");
        assert_eq!(id.as_str(), "fiscal_code");
    }

    #[test]
    fn rejects_empty() {
        assert!(Identifier::try_new("").is_none());
    }

    #[test]
    fn bytewise_equality_after_lowercasing() {
        assert_eq!(Identifier::new("Users"), Identifier::new("USERS"));
        assert_ne!(Identifier::new("Users"), Identifier::new("user"));
    }

    #[test]
    fn canonical_string_with_and_without_schema() {
        let qualified = ColumnRef::new(
            Some(Identifier::new("private")),
            Identifier::new("Users"),
            Identifier::new("Fiscal_Code"),
        );
        assert_eq!(qualified.to_canonical_string(), "private.users.fiscal_code");

        let unqualified = ColumnRef::new(None, Identifier::new("Users"), Identifier::new("Id"));
        assert_eq!(unqualified.to_canonical_string(), "users.id");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// spec §8: every canonical column id built out of `Identifier`s is
        /// "all identifiers ASCII-lowercased" — `try_new` must guarantee that
        /// for any non-empty input, not just the hand-picked cases above.
        #[test]
        fn try_new_lowercases_ascii_and_preserves_length(raw in "\\PC{1,64}") {
            let id = Identifier::try_new(&raw).expect("non-empty input must build an identifier");
            prop_assert_eq!(id.as_str().len(), raw.len());
            prop_assert_eq!(id.as_str(), raw.to_ascii_lowercase());
        }

        /// Re-lowercasing an already-lowercased identifier is a no-op —
        /// comparisons downstream never need to re-normalize.
        #[test]
        fn lowercasing_is_idempotent(raw in "\\PC{1,64}") {
            let once = Identifier::new(&raw);
            let twice = Identifier::new(once.as_str());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn empty_input_is_always_rejected(raw in "") {
            prop_assert!(Identifier::try_new(raw).is_none());
        }
    }
}
