//! Token wire format (spec §6): `tok_<connection_name>_<generation>_<index>`.
//!
//! The original C-flavored spec describes `parse_token_view` mutating a
//! caller-owned buffer in place, replacing the two trailing `_` separators
//! with NUL so `connection_name` becomes an in-buffer substring. In Rust
//! there is no equivalent win to chasing that in-place trick — an owned
//! `ParsedToken` returned by value is simpler and just as cheap for a
//! string this short — so `parse_token_view` here borrows from the input
//! and returns a new struct instead of mutating anything.

use crate::error::{TokenError, TokenResult};

pub const TOKEN_PREFIX: &str = "tok_";
pub const CONN_NAME_MAX: usize = 64;

/// The three parts recovered by parsing a token's wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedToken<'a> {
    pub connection_name: &'a str,
    pub generation: u32,
    pub index: u32,
}

/// Format a token's wire form. Does not validate `connection_name` length;
/// callers mint tokens only for connections that already passed config
/// validation.
pub fn format_token(connection_name: &str, generation: u32, index: u32) -> String {
    format!("{TOKEN_PREFIX}{connection_name}_{generation}_{index}")
}

/// Parse a token's wire form. Proceeds right-to-left: locates the last two
/// `_` separators, parses the two trailing decimal `u32` fields, and
/// leaves everything between the prefix and the first of those separators
/// as `connection_name` (spec §4.2: "scanning right-to-left").
pub fn parse_token_view(token: &str) -> TokenResult<ParsedToken<'_>> {
    let rest = token.strip_prefix(TOKEN_PREFIX).ok_or(TokenError::MissingPrefix)?;

    let last_sep = rest.rfind('_').ok_or(TokenError::MissingSeparators)?;
    let (before_last, index_str) = rest.split_at(last_sep);
    let index_str = &index_str[1..];

    let second_last_sep = before_last.rfind('_').ok_or(TokenError::MissingSeparators)?;
    let (connection_name, gen_str) = before_last.split_at(second_last_sep);
    let gen_str = &gen_str[1..];

    if connection_name.is_empty() || connection_name.len() > CONN_NAME_MAX {
        return Err(TokenError::ConnectionNameLength { max: CONN_NAME_MAX });
    }

    let generation = gen_str.parse::<u32>().map_err(|_| TokenError::InvalidGeneration)?;
    let index = index_str.parse::<u32>().map_err(|_| TokenError::InvalidIndex)?;

    Ok(ParsedToken { connection_name, generation, index })
}
