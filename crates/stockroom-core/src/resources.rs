//! Generic resource client.
//!
//! One `ResourceClient<T>` is instantiated per entity type. The entity's
//! `ResourceKind` supplies the path, id format and whether replacement is
//! allowed, so every collection shares the same read and invalidation logic.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::{ApiError, Transport};
use crate::cache::{CacheEntry, QueryExecutor, QueryHandle, QueryKey, QueryStatus};
use crate::models::{Resource, ResourceId, ResourceKind};
use crate::mutation::{DefinitionError, Mutation, MutationCoordinator, WriteKind, WriteRequest};
use crate::pagination::{PageRequest, PaginatedResult};

pub struct ResourceClient<T> {
    executor: Arc<QueryExecutor>,
    transport: Arc<dyn Transport>,
    create: Mutation,
    patch: Mutation,
    delete: Mutation,
    replace: Option<Mutation>,
    _resource: PhantomData<fn() -> T>,
}

impl<T: Resource> ResourceClient<T> {
    pub fn new(
        executor: Arc<QueryExecutor>,
        coordinator: &MutationCoordinator,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, DefinitionError> {
        let kind = T::KIND;
        let replace = if kind.supports_replace() {
            Some(coordinator.define(kind, WriteKind::Replace)?)
        } else {
            None
        };
        Ok(Self {
            executor,
            transport,
            create: coordinator.define(kind, WriteKind::Create)?,
            patch: coordinator.define(kind, WriteKind::Patch)?,
            delete: coordinator.define(kind, WriteKind::Delete)?,
            replace,
            _resource: PhantomData,
        })
    }

    pub fn kind(&self) -> ResourceKind {
        T::KIND
    }

    pub fn supports_replace(&self) -> bool {
        self.replace.is_some()
    }

    /// Resolve one page of the collection.
    pub fn list(&self, page: PageRequest) -> QueryHandle {
        self.executor
            .resolve_remote(QueryKey::list(T::KIND, page), Arc::clone(&self.transport))
    }

    /// Resolve a single item.
    pub fn get(&self, id: ResourceId) -> Result<QueryHandle, ApiError> {
        id.check(T::KIND)
            .map_err(|e| ApiError::Validation(e.to_string()))?;
        Ok(self
            .executor
            .resolve_remote(QueryKey::item(T::KIND, id), Arc::clone(&self.transport)))
    }

    /// Resolve a page and wait for it to settle.
    pub async fn fetch_list(&self, page: PageRequest) -> Result<PaginatedResult<T>, ApiError> {
        let entry = self.list(page).settled().await;
        let data = settled_data(entry)?;
        decode(&data)
    }

    /// Resolve an item and wait for it to settle.
    pub async fn fetch_one(&self, id: ResourceId) -> Result<T, ApiError> {
        let entry = self.get(id)?.settled().await;
        let data = settled_data(entry)?;
        decode(&data)
    }

    pub async fn create(&self, fields: Value) -> Result<Option<T>, ApiError> {
        let body = self.create.execute(WriteRequest::Create { body: fields }).await?;
        decode_optional(&body)
    }

    /// Send only the changed fields.
    pub async fn patch(&self, id: ResourceId, changes: Value) -> Result<Option<T>, ApiError> {
        let body = self
            .patch
            .execute(WriteRequest::Patch { id, body: changes })
            .await?;
        decode_optional(&body)
    }

    /// Replace the whole entity. Only products and inventories allow this.
    pub async fn replace(&self, id: ResourceId, entity: &T) -> Result<Option<T>, ApiError> {
        let Some(ref replace) = self.replace else {
            return Err(ApiError::Validation(format!(
                "{} does not support full replacement",
                T::KIND
            )));
        };
        let body = serde_json::to_value(entity)
            .map_err(|e| ApiError::Validation(format!("Failed to encode {}: {}", T::KIND, e)))?;
        let body = replace.execute(WriteRequest::Replace { id, body }).await?;
        decode_optional(&body)
    }

    pub async fn delete(&self, id: ResourceId) -> Result<(), ApiError> {
        self.delete.execute(WriteRequest::Delete { id }).await?;
        Ok(())
    }

    /// The mutation instance for an operation, for observing its state.
    pub fn mutation(&self, kind: WriteKind) -> Option<&Mutation> {
        match kind {
            WriteKind::Create => Some(&self.create),
            WriteKind::Patch => Some(&self.patch),
            WriteKind::Delete => Some(&self.delete),
            WriteKind::Replace => self.replace.as_ref(),
        }
    }
}

fn settled_data(entry: CacheEntry) -> Result<Arc<Value>, ApiError> {
    match entry.status {
        QueryStatus::Success => entry
            .data
            .ok_or_else(|| ApiError::InvalidResponse(format!("{} settled without data", entry.key))),
        QueryStatus::Error => Err(entry.error.unwrap_or_else(|| ApiError::Unknown {
            status: 0,
            detail: format!("{} failed without an error", entry.key),
        })),
        QueryStatus::Idle | QueryStatus::Loading => Err(ApiError::Network(format!(
            "{} was evicted before the request completed",
            entry.key
        ))),
    }
}

fn decode<D: DeserializeOwned>(value: &Value) -> Result<D, ApiError> {
    D::deserialize(value).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}

fn decode_optional<D: DeserializeOwned>(value: &Value) -> Result<Option<D>, ApiError> {
    if value.is_null() {
        Ok(None)
    } else {
        decode(value).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{QueryCache, RetryPolicy};
    use crate::models::{Category, Inventory, Product};
    use crate::test_support::ScriptedTransport;
    use reqwest::Method;
    use serde_json::json;

    fn client<T: Resource>() -> (ResourceClient<T>, Arc<ScriptedTransport>) {
        let cache = Arc::new(QueryCache::new());
        let transport = Arc::new(ScriptedTransport::new());
        let executor = Arc::new(QueryExecutor::new(cache.clone(), RetryPolicy::none()));
        let coordinator = MutationCoordinator::new(cache, transport.clone());
        let client = ResourceClient::new(executor, &coordinator, transport.clone()).unwrap();
        (client, transport)
    }

    fn category_page() -> Value {
        json!({
            "data": [{"categoryId": 1, "name": "Produce"}, {"categoryId": 2, "name": "Dairy"}],
            "totalCount": 2, "pageNumber": 1, "pageSize": 20, "totalPages": 1,
            "hasNextPage": false, "hasPreviousPage": false,
            "previousPageNumber": 1, "nextPageNumber": 1
        })
    }

    #[tokio::test]
    async fn test_fetch_list_decodes_and_caches() {
        let (categories, transport) = client::<Category>();
        transport.push_ok(category_page());

        let page = categories.fetch_list(PageRequest::default()).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[1].name, "Dairy");

        let again = categories.fetch_list(PageRequest::default()).await.unwrap();
        assert_eq!(again, page);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_patch_forces_list_refetch() {
        let (categories, transport) = client::<Category>();
        transport.push_ok(category_page());
        categories.fetch_list(PageRequest::default()).await.unwrap();

        transport.push_ok(json!({"categoryId": 2, "name": "Dairy & Eggs"}));
        let patched = categories
            .patch(ResourceId::Number(2), json!({"name": "Dairy & Eggs"}))
            .await
            .unwrap();
        assert_eq!(patched.map(|c| c.name), Some("Dairy & Eggs".to_string()));

        transport.push_ok(category_page());
        categories.fetch_list(PageRequest::default()).await.unwrap();

        let methods: Vec<Method> = transport.requests().into_iter().map(|r| r.method).collect();
        assert_eq!(methods, vec![Method::GET, Method::PATCH, Method::GET]);
    }

    #[tokio::test]
    async fn test_fetch_one_rejects_bad_id_locally() {
        let (products, transport) = client::<Product>();
        let result = products.fetch_one(ResourceId::Number(4)).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_one_surfaces_not_found() {
        let (inventories, transport) = client::<Inventory>();
        transport.push_err(ApiError::NotFound("inventory 8".to_string()));
        let result = inventories.fetch_one(ResourceId::Number(8)).await;
        assert_eq!(result, Err(ApiError::NotFound("inventory 8".to_string())));
    }

    #[tokio::test]
    async fn test_replace_only_where_supported() {
        let (categories, transport) = client::<Category>();
        assert!(!categories.supports_replace());
        let category = Category {
            category_id: 1,
            name: "Produce".to_string(),
            description: None,
        };
        let result = categories.replace(ResourceId::Number(1), &category).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
        assert!(transport.requests().is_empty());

        let (inventories, transport) = client::<Inventory>();
        assert!(inventories.supports_replace());
        let inventory = Inventory {
            inventory_id: 5,
            product_id: "PRD-0000042".to_string(),
            warehouse_id: 2,
            quantity: 40,
        };
        transport.push_ok(Value::Null);
        let result = inventories.replace(ResourceId::Number(5), &inventory).await;
        assert_eq!(result, Ok(None));

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::PUT);
        assert_eq!(requests[0].path, "/inventories/5");
        assert_eq!(requests[0].body.as_ref().unwrap()["quantity"], json!(40));
    }

    #[tokio::test]
    async fn test_invalid_body_is_reported() {
        let (categories, transport) = client::<Category>();
        transport.push_ok(json!({"unexpected": true}));
        let result = categories.fetch_one(ResourceId::Number(1)).await;
        assert!(matches!(result, Err(ApiError::InvalidResponse(_))));
    }
}
