//! Stockroom core - client-side resource cache for the grocery inventory API.
//!
//! This crate contains everything the admin console builds its screens on:
//!
//! - `models`: the five resource types and their identifiers
//! - `pagination`: page descriptors derived from a total count
//! - `auth`: unverified bearer-token decoding and token storage
//! - `cache`: keyed query cache, deduplicating executor, stale-response rejection
//! - `mutation`: writes with declared invalidation sets
//! - `api`: the REST transport and the error taxonomy
//! - `resources`: one generic resource client per entity type
//! - `context`: the explicit cache context wiring it all together

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod models;
pub mod mutation;
pub mod pagination;
pub mod resources;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{ApiError, ApiRequest, HttpTransport, Transport, UserNotice};
pub use auth::{AuthGate, AuthStatus, TokenClaims, TokenStore};
pub use cache::{CacheEntry, KeyPattern, QueryCache, QueryExecutor, QueryKey, QueryStatus};
pub use config::ClientConfig;
pub use context::ConsoleContext;
pub use models::{Resource, ResourceId, ResourceKind};
pub use mutation::{Mutation, MutationCoordinator, MutationState, WriteKind, WriteRequest};
pub use pagination::{describe, PageDescriptor, PageRequest, PaginatedResult};
pub use resources::ResourceClient;
