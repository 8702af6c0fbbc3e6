use std::fmt;

use crate::api::ApiRequest;
use crate::models::{ResourceId, ResourceKind};
use crate::pagination::PageRequest;

/// What part of a collection a read addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryScope {
    /// One page of the collection.
    List(PageRequest),
    /// A single item by primary key.
    Item(ResourceId),
}

/// Immutable address of one cacheable read: `(resourceType, ...params)`.
///
/// Two keys are equal iff the resource and every parameter match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    resource: ResourceKind,
    scope: QueryScope,
}

impl QueryKey {
    pub fn list(resource: ResourceKind, page: PageRequest) -> Self {
        Self {
            resource,
            scope: QueryScope::List(page),
        }
    }

    pub fn item(resource: ResourceKind, id: ResourceId) -> Self {
        Self {
            resource,
            scope: QueryScope::Item(id),
        }
    }

    pub fn resource(&self) -> ResourceKind {
        self.resource
    }

    pub fn scope(&self) -> &QueryScope {
        &self.scope
    }

    pub fn is_list(&self) -> bool {
        matches!(self.scope, QueryScope::List(_))
    }

    /// The GET request that fills this key.
    pub fn to_request(&self) -> ApiRequest {
        match &self.scope {
            QueryScope::List(page) => ApiRequest::list(self.resource, *page),
            QueryScope::Item(id) => ApiRequest::get(self.resource, id),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            QueryScope::List(page) => write!(
                f,
                "{}?pageNumber={}&pageSize={}",
                self.resource,
                page.page_number(),
                page.page_size()
            ),
            QueryScope::Item(id) => write!(f, "{}/{}", self.resource, id),
        }
    }
}

/// A declared set of keys, used for invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern {
    /// Exactly one key.
    Exact(QueryKey),
    /// Every page of a collection: `(kind, pageNumber=*, pageSize=*)`.
    Collection(ResourceKind),
    /// Every key of a resource type, pages and items alike.
    Resource(ResourceKind),
}

impl KeyPattern {
    pub fn item(resource: ResourceKind, id: ResourceId) -> Self {
        KeyPattern::Exact(QueryKey::item(resource, id))
    }

    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            KeyPattern::Exact(exact) => exact == key,
            KeyPattern::Collection(kind) => key.resource == *kind && key.is_list(),
            KeyPattern::Resource(kind) => key.resource == *kind,
        }
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPattern::Exact(key) => write!(f, "{}", key),
            KeyPattern::Collection(kind) => write!(f, "{}?pageNumber=*&pageSize=*", kind),
            KeyPattern::Resource(kind) => write!(f, "{}/*", kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: i64, size: i64) -> PageRequest {
        PageRequest::new(n, size).unwrap()
    }

    #[test]
    fn test_key_equality_is_by_value() {
        let a = QueryKey::list(ResourceKind::Products, page(2, 20));
        let b = QueryKey::list(ResourceKind::Products, page(2, 20));
        let c = QueryKey::list(ResourceKind::Products, page(2, 50));
        let d = QueryKey::list(ResourceKind::Suppliers, page(2, 20));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_ne!(
            QueryKey::item(ResourceKind::Categories, ResourceId::Number(7)),
            QueryKey::item(ResourceKind::Warehouses, ResourceId::Number(7))
        );
    }

    #[test]
    fn test_pattern_matching() {
        let list = QueryKey::list(ResourceKind::Inventories, page(3, 10));
        let item = QueryKey::item(ResourceKind::Inventories, ResourceId::Number(5));
        let other = QueryKey::item(ResourceKind::Inventories, ResourceId::Number(6));
        let foreign = QueryKey::list(ResourceKind::Warehouses, page(1, 10));

        let collection = KeyPattern::Collection(ResourceKind::Inventories);
        assert!(collection.matches(&list));
        assert!(!collection.matches(&item));
        assert!(!collection.matches(&foreign));

        let exact = KeyPattern::item(ResourceKind::Inventories, ResourceId::Number(5));
        assert!(exact.matches(&item));
        assert!(!exact.matches(&other));

        let all = KeyPattern::Resource(ResourceKind::Inventories);
        assert!(all.matches(&list) && all.matches(&item) && all.matches(&other));
        assert!(!all.matches(&foreign));
    }

    #[test]
    fn test_key_display() {
        assert_eq!(
            QueryKey::list(ResourceKind::Products, page(2, 20)).to_string(),
            "products?pageNumber=2&pageSize=20"
        );
        assert_eq!(
            QueryKey::item(ResourceKind::Categories, ResourceId::Number(7)).to_string(),
            "categories/7"
        );
    }
}
