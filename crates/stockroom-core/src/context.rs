//! The console's cache context.
//!
//! Everything that would otherwise be process-global lives here: the query
//! cache, its fetch sequence counter, the executor, the mutation coordinator
//! and the auth gate. Tests build as many independent contexts as they like.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::api::{ApiError, HttpTransport, Transport, UserNotice};
use crate::auth::{AuthGate, KeyringTokenStore, MemoryTokenStore, TokenStore};
use crate::cache::{QueryCache, QueryExecutor};
use crate::config::{ClientConfig, TokenStoreKind};
use crate::models::{Category, Inventory, Product, Supplier, Warehouse};
use crate::mutation::MutationCoordinator;
use crate::resources::ResourceClient;

pub struct ConsoleContext {
    config: ClientConfig,
    gate: AuthGate,
    cache: Arc<QueryCache>,
    executor: Arc<QueryExecutor>,
    coordinator: MutationCoordinator,
    categories: ResourceClient<Category>,
    products: ResourceClient<Product>,
    suppliers: ResourceClient<Supplier>,
    warehouses: ResourceClient<Warehouse>,
    inventories: ResourceClient<Inventory>,
}

impl ConsoleContext {
    /// Build a context talking to the configured API over HTTP.
    pub fn new(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let gate = AuthGate::new(store, config.write_roles.clone());
        let transport = HttpTransport::new(
            config.api_base_url.clone(),
            config.request_timeout(),
            gate.clone(),
        )?;
        Self::with_transport(config, gate, Arc::new(transport))
    }

    /// Build a context using the token store named in `config`.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let store: Arc<dyn TokenStore> = match config.token_store {
            TokenStoreKind::Keyring => Arc::new(KeyringTokenStore::new()),
            TokenStoreKind::Memory => Arc::new(MemoryTokenStore::new()),
        };
        Self::new(config, store)
    }

    pub fn with_transport(
        config: ClientConfig,
        gate: AuthGate,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let cache = Arc::new(QueryCache::new());
        let executor = Arc::new(QueryExecutor::new(cache.clone(), config.retry_policy()));
        let coordinator = MutationCoordinator::new(cache.clone(), transport.clone());

        let categories = ResourceClient::new(executor.clone(), &coordinator, transport.clone())
            .context("Failed to set up categories")?;
        let products = ResourceClient::new(executor.clone(), &coordinator, transport.clone())
            .context("Failed to set up products")?;
        let suppliers = ResourceClient::new(executor.clone(), &coordinator, transport.clone())
            .context("Failed to set up suppliers")?;
        let warehouses = ResourceClient::new(executor.clone(), &coordinator, transport.clone())
            .context("Failed to set up warehouses")?;
        let inventories = ResourceClient::new(executor.clone(), &coordinator, transport)
            .context("Failed to set up inventories")?;

        tracing::debug!("Console context ready for {}", config.api_base_url);

        Ok(Self {
            config,
            gate,
            cache,
            executor,
            coordinator,
            categories,
            products,
            suppliers,
            warehouses,
            inventories,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn executor(&self) -> &Arc<QueryExecutor> {
        &self.executor
    }

    pub fn coordinator(&self) -> &MutationCoordinator {
        &self.coordinator
    }

    pub fn categories(&self) -> &ResourceClient<Category> {
        &self.categories
    }

    pub fn products(&self) -> &ResourceClient<Product> {
        &self.products
    }

    pub fn suppliers(&self) -> &ResourceClient<Supplier> {
        &self.suppliers
    }

    pub fn warehouses(&self) -> &ResourceClient<Warehouse> {
        &self.warehouses
    }

    pub fn inventories(&self) -> &ResourceClient<Inventory> {
        &self.inventories
    }

    /// What to tell the user about a failed request.
    pub fn notice_for(&self, error: &ApiError) -> UserNotice {
        let has_token = self.gate.bearer(Utc::now()).is_some();
        error.notice(has_token)
    }

    /// Drop every cached entry. The token is left alone.
    pub fn shutdown(&self) {
        let dropped = self.cache.len();
        self.cache.clear();
        tracing::debug!("Cleared {} cached queries", dropped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceId;
    use crate::pagination::PageRequest;
    use crate::test_support::{make_token, ScriptedTransport};
    use serde_json::json;

    fn context(store: MemoryTokenStore) -> (ConsoleContext, Arc<ScriptedTransport>) {
        let config = ClientConfig {
            read_retries: 0,
            ..ClientConfig::default()
        };
        let gate = AuthGate::new(Arc::new(store), config.write_roles.clone());
        let transport = Arc::new(ScriptedTransport::new());
        let context = ConsoleContext::with_transport(config, gate, transport.clone()).unwrap();
        (context, transport)
    }

    fn valid_token() -> String {
        let exp = Utc::now().timestamp() + 3600;
        make_token(json!({"sub": "sam", "role": "Viewer", "exp": exp}))
    }

    #[test]
    fn test_contexts_are_isolated() {
        let (first, _) = context(MemoryTokenStore::new());
        let (second, _) = context(MemoryTokenStore::new());
        assert!(!Arc::ptr_eq(first.cache(), second.cache()));
        assert!(first.products().supports_replace());
        assert!(!first.suppliers().supports_replace());
    }

    #[test]
    fn test_forbidden_notice_depends_on_token() {
        let (signed_out, _) = context(MemoryTokenStore::new());
        let forbidden = ApiError::Forbidden("write denied".to_string());
        assert_eq!(signed_out.notice_for(&forbidden), UserNotice::SignIn);

        let (signed_in, _) = context(MemoryTokenStore::with_token(valid_token()));
        assert_eq!(signed_in.notice_for(&forbidden), UserNotice::InsufficientRole);
    }

    #[tokio::test]
    async fn test_shutdown_clears_cache() {
        let (context, transport) = context(MemoryTokenStore::new());
        transport.push_ok(json!({"warehouseId": 3, "name": "North"}));
        let warehouse = context
            .warehouses()
            .fetch_one(ResourceId::Number(3))
            .await
            .unwrap();
        assert_eq!(warehouse.name, "North");
        assert_eq!(context.cache().len(), 1);

        context.shutdown();
        assert!(context.cache().is_empty());
    }

    #[tokio::test]
    async fn test_resources_share_one_cache() {
        let (context, transport) = context(MemoryTokenStore::new());
        transport.push_ok(json!({
            "data": [], "totalCount": 0, "pageNumber": 1, "pageSize": 20, "totalPages": 1,
            "hasNextPage": false, "hasPreviousPage": false,
            "previousPageNumber": 1, "nextPageNumber": 1
        }));
        transport.push_ok(json!({"supplierId": "SUP-0000009", "name": "Acme Farms"}));

        context.categories().fetch_list(PageRequest::default()).await.unwrap();
        let supplier = context
            .suppliers()
            .fetch_one(ResourceId::Code("SUP-0000009".to_string()))
            .await
            .unwrap();
        assert_eq!(supplier.name, "Acme Farms");
        assert_eq!(context.cache().len(), 2);
    }
}
