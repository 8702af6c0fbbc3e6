//! Writes against the inventory API and the cache invalidation they cause.
//!
//! A `Mutation` is defined once per (resource, operation) with the set of
//! keys it invalidates, then executed any number of times. Each execution
//! issues exactly one request. Nothing is retried and nothing is written into
//! the read cache directly; on success the declared keys are invalidated so
//! the next read refetches what the server actually stored.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::api::{ApiError, ApiRequest, Transport};
use crate::cache::{KeyPattern, QueryCache};
use crate::models::{ResourceId, ResourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKind {
    Create,
    Replace,
    Patch,
    Delete,
}

/// Payload of one write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Create { body: Value },
    /// Full entity body.
    Replace { id: ResourceId, body: Value },
    /// Only the changed fields.
    Patch { id: ResourceId, body: Value },
    Delete { id: ResourceId },
}

impl WriteRequest {
    pub fn kind(&self) -> WriteKind {
        match self {
            WriteRequest::Create { .. } => WriteKind::Create,
            WriteRequest::Replace { .. } => WriteKind::Replace,
            WriteRequest::Patch { .. } => WriteKind::Patch,
            WriteRequest::Delete { .. } => WriteKind::Delete,
        }
    }

    pub fn id(&self) -> Option<&ResourceId> {
        match self {
            WriteRequest::Create { .. } => None,
            WriteRequest::Replace { id, .. }
            | WriteRequest::Patch { id, .. }
            | WriteRequest::Delete { id } => Some(id),
        }
    }

    fn into_api_request(self, resource: ResourceKind) -> ApiRequest {
        match self {
            WriteRequest::Create { body } => ApiRequest::create(resource, body),
            WriteRequest::Replace { id, body } => ApiRequest::replace(resource, &id, body),
            WriteRequest::Patch { id, body } => ApiRequest::patch(resource, &id, body),
            WriteRequest::Delete { id } => ApiRequest::delete(resource, &id),
        }
    }
}

/// One member of a mutation's declared invalidation set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationTarget {
    /// Every page of the mutation's own collection.
    Collection,
    /// The single item the request addresses.
    Item,
    /// Any other declared key set, e.g. a dependent resource.
    Pattern(KeyPattern),
}

/// Observable lifecycle of a mutation instance.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationState {
    Idle,
    Pending,
    Success(Arc<Value>),
    Error(ApiError),
}

impl MutationState {
    pub fn is_pending(&self) -> bool {
        matches!(self, MutationState::Pending)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("{0} does not support full replacement")]
    ReplaceUnsupported(ResourceKind),
}

/// Defines mutations bound to the shared cache and transport.
pub struct MutationCoordinator {
    cache: Arc<QueryCache>,
    transport: Arc<dyn Transport>,
}

impl MutationCoordinator {
    pub fn new(cache: Arc<QueryCache>, transport: Arc<dyn Transport>) -> Self {
        Self { cache, transport }
    }

    /// Define a mutation with its default invalidation set:
    ///
    /// - create: the collection (a new item has no item entry yet)
    /// - replace / patch: the item and the collection
    /// - delete: the collection and the item
    pub fn define(&self, resource: ResourceKind, kind: WriteKind) -> Result<Mutation, DefinitionError> {
        if kind == WriteKind::Replace && !resource.supports_replace() {
            return Err(DefinitionError::ReplaceUnsupported(resource));
        }

        let targets = match kind {
            WriteKind::Create => vec![InvalidationTarget::Collection],
            WriteKind::Replace | WriteKind::Patch => {
                vec![InvalidationTarget::Item, InvalidationTarget::Collection]
            }
            WriteKind::Delete => vec![InvalidationTarget::Collection, InvalidationTarget::Item],
        };

        let (state, _) = watch::channel(MutationState::Idle);
        Ok(Mutation {
            resource,
            kind,
            targets,
            cache: Arc::clone(&self.cache),
            transport: Arc::clone(&self.transport),
            state: Arc::new(state),
            flight: Arc::new(Mutex::new(())),
        })
    }
}

/// One write operation with a fixed invalidation set.
///
/// Executions on the same instance are single-flight: a call made while
/// another is pending waits for it to finish before issuing its request.
/// Once issued, a write is not cancelled by dropping the `execute` future.
pub struct Mutation {
    resource: ResourceKind,
    kind: WriteKind,
    targets: Vec<InvalidationTarget>,
    cache: Arc<QueryCache>,
    transport: Arc<dyn Transport>,
    state: Arc<watch::Sender<MutationState>>,
    flight: Arc<Mutex<()>>,
}

impl Mutation {
    /// Declare an additional key set to invalidate on success.
    pub fn also_invalidates(mut self, pattern: KeyPattern) -> Self {
        self.targets.push(InvalidationTarget::Pattern(pattern));
        self
    }

    pub fn resource(&self) -> ResourceKind {
        self.resource
    }

    pub fn kind(&self) -> WriteKind {
        self.kind
    }

    pub fn targets(&self) -> &[InvalidationTarget] {
        &self.targets
    }

    /// The concrete key set invalidated for a request addressing `id`.
    pub fn invalidation_set(&self, id: Option<&ResourceId>) -> Vec<KeyPattern> {
        self.targets
            .iter()
            .filter_map(|target| match target {
                InvalidationTarget::Collection => Some(KeyPattern::Collection(self.resource)),
                InvalidationTarget::Item => id.map(|id| KeyPattern::item(self.resource, id.clone())),
                InvalidationTarget::Pattern(pattern) => Some(pattern.clone()),
            })
            .collect()
    }

    pub fn state(&self) -> MutationState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MutationState> {
        self.state.subscribe()
    }

    /// Run one write.
    ///
    /// A request that does not match this mutation's operation or carries a
    /// malformed id is rejected as a validation error without touching the
    /// network or the lifecycle state.
    pub async fn execute(&self, request: WriteRequest) -> Result<Arc<Value>, ApiError> {
        if request.kind() != self.kind {
            return Err(ApiError::Validation(format!(
                "{:?} {} cannot run a {:?} request",
                self.kind,
                self.resource,
                request.kind()
            )));
        }
        if let Some(id) = request.id() {
            id.check(self.resource)
                .map_err(|e| ApiError::Validation(e.to_string()))?;
        }

        // The write runs on its own task holding the flight guard, so it
        // finishes and publishes its outcome even if this future is dropped.
        let flight = Arc::clone(&self.flight).lock_owned().await;
        let invalidates = self.invalidation_set(request.id());
        let resource = self.resource;
        let kind = self.kind;
        let cache = Arc::clone(&self.cache);
        let transport = Arc::clone(&self.transport);
        let state = Arc::clone(&self.state);

        state.send_replace(MutationState::Pending);
        info!(resource = %resource, kind = ?kind, id = ?request.id(), "Mutation started");

        let write = tokio::spawn(async move {
            let _flight = flight;
            match transport.send(request.into_api_request(resource)).await {
                Ok(body) => {
                    for pattern in &invalidates {
                        cache.invalidate(pattern);
                    }
                    debug!(resource = %resource, kind = ?kind, invalidated = invalidates.len(), "Mutation succeeded");
                    let body = Arc::new(body);
                    state.send_replace(MutationState::Success(Arc::clone(&body)));
                    Ok(body)
                }
                Err(e) => {
                    warn!(resource = %resource, kind = ?kind, error = %e, "Mutation failed");
                    state.send_replace(MutationState::Error(e.clone()));
                    Err(e)
                }
            }
        });

        match write.await {
            Ok(result) => result,
            Err(e) => {
                let error = ApiError::Unknown {
                    status: 0,
                    detail: format!("write task failed: {}", e),
                };
                self.state.send_replace(MutationState::Error(error.clone()));
                Err(error)
            }
        }
    }

    /// Back to `Idle`, e.g. when a form is closed. Ignored while pending.
    pub fn reset(&self) {
        self.state.send_if_modified(|state| {
            if state.is_pending() || *state == MutationState::Idle {
                false
            } else {
                *state = MutationState::Idle;
                true
            }
        });
    }
}
