//! Authentication module for the bearer token held in client storage.
//!
//! This module provides:
//! - `AuthGate`: local, unverified decoding of the token to drive UI affordances
//! - `TokenStore`: where the single bearer token lives between sessions
//!
//! The gate never verifies signatures. The API is the only place
//! authorization is enforced; the gate only decides what to show.

pub mod gate;
pub mod store;

pub use gate::{decode, is_authenticated, role, AuthGate, AuthStatus, TokenClaims};
pub use store::{KeyringTokenStore, MemoryTokenStore, TokenError, TokenStore};
