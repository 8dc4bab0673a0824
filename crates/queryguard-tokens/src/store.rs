//! The Token Store itself (spec §3, §4.2): a per-session, per-connection
//! container mapping sensitive (column-identity, value-bytes) pairs to
//! opaque tokens.
//!
//! The spec's "arena allocation... each session owns one per-connection
//! arena for token keys and value copies" (§9) is realized here as
//! ordinary owned `Vec<u8>`/`String` data living inside `TokenEntry` —
//! there is no separate bump allocator to manage; a `TokenStore` dropping
//! frees everything it owns, which is the arena-reset spec describes.

use std::collections::HashMap;

use ahash::RandomState;

use crate::error::{TokenError, TokenResult};
use crate::wire::{format_token, parse_token_view};

/// Token-minting discipline (spec's `column_strategy`). Kept local to this
/// crate rather than importing `queryguard_policy::ColumnStrategy` — the
/// token store is a leaf component and the glue code that wires a
/// connection's policy into its store performs the one-line conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStrategy {
    Deterministic,
    Randomized,
}

/// One minted sensitive-value entry (spec's "Sensitive Token entry").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEntry {
    pub value_bytes: Vec<u8>,
    pub col_ref: String,
    pub pg_oid: u32,
    pub is_null: bool,
    /// The generation this entry was minted under. Not consulted by `get`
    /// — generation-based invalidation is a request-path decision (spec
    /// §9 Open Questions leave exact lifetime semantics to the caller);
    /// kept here so the full entry is inspectable for diagnostics.
    pub generation: u32,
}

impl TokenEntry {
    pub fn value_len(&self) -> usize {
        self.value_bytes.len()
    }
}

/// Input to [`TokenStore::create_token`].
pub struct CreateTokenInput {
    pub value_bytes: Vec<u8>,
    pub col_ref: String,
    pub pg_oid: u32,
    pub is_null: bool,
}

/// Per-connection token store, exclusively owned by one session thread
/// (spec §5: "requires no internal synchronization").
pub struct TokenStore {
    connection_name: String,
    strategy: TokenStrategy,
    entries: Vec<TokenEntry>,
    /// Deterministic-mode dedup index: seeded hash of (col_ref, value_bytes,
    /// generation) -> candidate entry indices sharing that hash (a `Vec`
    /// because the non-cryptographic hash can collide; every candidate is
    /// still checked for exact equality before being reused).
    dedup_index: HashMap<u64, Vec<usize>>,
    hasher: RandomState,
}

impl TokenStore {
    pub fn new(connection_name: impl Into<String>, strategy: TokenStrategy) -> Self {
        Self {
            connection_name: connection_name.into(),
            strategy,
            entries: Vec::new(),
            dedup_index: HashMap::new(),
            hasher: RandomState::new(),
        }
    }

    pub fn connection_name(&self) -> &str {
        &self.connection_name
    }

    pub fn strategy(&self) -> TokenStrategy {
        self.strategy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Logs and returns the fatal error for a store that has minted more
    /// than `u32::MAX` entries for one connection (spec §7: "allocation
    /// failures... are fatal for the call"). `idx` is logged as `usize`
    /// since the overflow means it no longer fits the wire format's `u32`.
    fn overflow(&self, idx: usize) -> TokenError {
        log::error!(
            "token store for connection `{}` exhausted its u32 index space at entry {idx}",
            self.connection_name
        );
        TokenError::IndexOverflow
    }

    fn dedup_key(&self, generation: u32, col_ref: &str, value_bytes: &[u8]) -> u64 {
        use std::hash::{BuildHasher, Hash, Hasher};
        let mut hasher = self.hasher.build_hasher();
        generation.hash(&mut hasher);
        col_ref.hash(&mut hasher);
        value_bytes.hash(&mut hasher);
        hasher.finish()
    }

    /// `create_token(store, generation, input) -> token_text` (spec §4.2).
    ///
    /// DETERMINISTIC mode: equal `(col_ref, value_bytes)` inputs under the
    /// same `generation` return byte-identical tokens. RANDOMIZED mode:
    /// every call mints a fresh entry and token, no deduplication.
    pub fn create_token(&mut self, generation: u32, input: CreateTokenInput) -> TokenResult<String> {
        if input.col_ref.is_empty() {
            return Err(TokenError::EmptyColRef);
        }
        if input.is_null && !input.value_bytes.is_empty() {
            return Err(TokenError::NullWithNonemptyValue);
        }

        if self.strategy == TokenStrategy::Deterministic {
            let key = self.dedup_key(generation, &input.col_ref, &input.value_bytes);
            if let Some(candidates) = self.dedup_index.get(&key) {
                for &idx in candidates {
                    let entry = &self.entries[idx];
                    if entry.generation == generation
                        && entry.col_ref == input.col_ref
                        && entry.value_bytes == input.value_bytes
                    {
                        let index = u32::try_from(idx).map_err(|_| self.overflow(idx))?;
                        return Ok(format_token(&self.connection_name, generation, index));
                    }
                }
            }

            let idx = self.entries.len();
            let index = u32::try_from(idx).map_err(|_| self.overflow(idx))?;
            self.entries.push(TokenEntry {
                value_bytes: input.value_bytes,
                col_ref: input.col_ref.clone(),
                pg_oid: input.pg_oid,
                is_null: input.is_null,
                generation,
            });
            self.dedup_index.entry(key).or_default().push(idx);
            return Ok(format_token(&self.connection_name, generation, index));
        }

        // RANDOMIZED mode: always a fresh entry, never consult the index.
        let idx = self.entries.len();
        let index = u32::try_from(idx).map_err(|_| self.overflow(idx))?;
        self.entries.push(TokenEntry {
            value_bytes: input.value_bytes,
            col_ref: input.col_ref,
            pg_oid: input.pg_oid,
            is_null: input.is_null,
            generation,
        });
        Ok(format_token(&self.connection_name, generation, index))
    }

    /// `get(store, index) -> entry` (spec §4.2): constant-time read by
    /// entry index.
    pub fn get(&self, index: u32) -> TokenResult<&TokenEntry> {
        self.entries.get(index as usize).ok_or(TokenError::UnknownIndex(index))
    }

    /// Resolve a wire-format token against this store: parses it, checks
    /// the connection name matches byte-exactly, and looks up the entry.
    pub fn resolve(&self, token: &str) -> TokenResult<&TokenEntry> {
        let parsed = parse_token_view(token)?;
        if parsed.connection_name != self.connection_name {
            return Err(TokenError::ConnectionMismatch);
        }
        self.get(parsed.index)
    }
}

/// A per-session container of per-connection token stores (spec's "Token
/// Store" lifecycle: "created lazily on first sensitive cell write for a
/// connection within a session; destroyed when the session ends").
#[derive(Default)]
pub struct SessionTokenStores {
    stores: HashMap<String, TokenStore>,
}

impl SessionTokenStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// `get_or_init(stores, profile) -> store` (spec §4.2). Keyed
    /// case-sensitively on `connection_name`, matching the token wire
    /// format's byte-exact connection-name comparison.
    pub fn get_or_init(&mut self, connection_name: &str, strategy: TokenStrategy) -> &mut TokenStore {
        self.stores
            .entry(connection_name.to_string())
            .or_insert_with(|| TokenStore::new(connection_name, strategy))
    }

    pub fn get(&self, connection_name: &str) -> Option<&TokenStore> {
        self.stores.get(connection_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(col_ref: &str, value: &[u8]) -> CreateTokenInput {
        CreateTokenInput {
            value_bytes: value.to_vec(),
            col_ref: col_ref.to_string(),
            pg_oid: 25,
            is_null: false,
        }
    }

    #[test]
    fn deterministic_mode_dedupes_identical_inputs() {
        let mut store = TokenStore::new("MyPostgres", TokenStrategy::Deterministic);
        let t1 = store.create_token(7, input("users.fiscal_code", b"ABCDEF")).unwrap();
        let t2 = store.create_token(7, input("users.fiscal_code", b"ABCDEF")).unwrap();
        assert_eq!(t1, t2);
        assert_eq!(t1, "tok_MyPostgres_7_0");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn deterministic_mode_distinguishes_different_values() {
        let mut store = TokenStore::new("MyPostgres", TokenStrategy::Deterministic);
        let t1 = store.create_token(7, input("users.fiscal_code", b"ABCDEF")).unwrap();
        let t2 = store.create_token(7, input("users.fiscal_code", b"GHIJKL")).unwrap();
        assert_ne!(t1, t2);
    }

    #[test]
    fn randomized_mode_never_dedupes() {
        let mut store = TokenStore::new("MyPostgres", TokenStrategy::Randomized);
        let t1 = store.create_token(1, input("users.fiscal_code", b"ABCDEF")).unwrap();
        let t2 = store.create_token(1, input("users.fiscal_code", b"ABCDEF")).unwrap();
        assert_ne!(t1, t2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn round_trip_resolves_original_value() {
        let mut store = TokenStore::new("MyPostgres", TokenStrategy::Deterministic);
        let token = store.create_token(7, input("users.fiscal_code", b"ABCDEF")).unwrap();
        let entry = store.resolve(&token).unwrap();
        assert_eq!(entry.col_ref, "users.fiscal_code");
        assert_eq!(entry.value_bytes, b"ABCDEF");
    }

    #[test]
    fn rejects_empty_col_ref() {
        let mut store = TokenStore::new("c", TokenStrategy::Deterministic);
        assert!(matches!(
            store.create_token(1, input("", b"x")),
            Err(TokenError::EmptyColRef)
        ));
    }

    #[test]
    fn rejects_null_with_nonempty_value() {
        let mut store = TokenStore::new("c", TokenStrategy::Deterministic);
        let mut bad = input("users.fiscal_code", b"not-empty");
        bad.is_null = true;
        assert!(matches!(
            store.create_token(1, bad),
            Err(TokenError::NullWithNonemptyValue)
        ));
    }

    #[test]
    fn resolve_rejects_foreign_connection_name() {
        let mut a = TokenStore::new("PostgresA", TokenStrategy::Deterministic);
        let token = a.create_token(1, input("users.id", b"1")).unwrap();
        let b = TokenStore::new("PostgresB", TokenStrategy::Deterministic);
        assert!(matches!(b.resolve(&token), Err(TokenError::ConnectionMismatch)));
    }

    #[test]
    fn session_stores_are_keyed_by_connection_name() {
        let mut session = SessionTokenStores::new();
        session.get_or_init("a", TokenStrategy::Deterministic);
        session.get_or_init("b", TokenStrategy::Randomized);
        assert!(session.get("a").is_some());
        assert!(session.get("b").is_some());
        assert!(session.get("c").is_none());
    }
}
