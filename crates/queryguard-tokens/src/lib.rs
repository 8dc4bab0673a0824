//! queryguard-tokens — the sensitive-value Token Store: minting opaque
//! tokens for sensitive result cells and parsing them back to stored
//! plaintext on a subsequent request.

pub mod error;
pub mod store;
pub mod wire;

pub use error::{TokenError, TokenResult};
pub use store::{CreateTokenInput, SessionTokenStores, TokenEntry, TokenStore, TokenStrategy};
pub use wire::{format_token, parse_token_view, ParsedToken, CONN_NAME_MAX, TOKEN_PREFIX};
