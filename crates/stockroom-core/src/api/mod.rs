//! REST transport for the grocery inventory API.
//!
//! This module provides the `Transport` seam the cache layer talks through,
//! the reqwest-backed `HttpTransport`, and the `ApiError` taxonomy every
//! failure is classified into.
//!
//! Requests carry `Authorization: Bearer <token>` whenever the auth gate
//! holds a usable token, and go out unauthenticated otherwise.

pub mod client;
pub mod error;

pub use client::{ApiRequest, HttpTransport, Transport};
pub use error::{ApiError, UserNotice};
