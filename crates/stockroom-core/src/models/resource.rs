use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Length of the formatted string keys used by products and suppliers.
pub const CODE_ID_LENGTH: usize = 11;

/// The five resource collections exposed by the inventory API.
///
/// Each variant carries the configuration a generic resource client needs:
/// its URL segment, the name of its primary-key field, the shape of that key,
/// and whether the API accepts full-entity replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Categories,
    Products,
    Suppliers,
    Warehouses,
    Inventories,
}

/// Shape of a resource's primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdFormat {
    /// Positive integer key.
    Number,
    /// Fixed-length formatted string key.
    Code,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Categories,
        ResourceKind::Products,
        ResourceKind::Suppliers,
        ResourceKind::Warehouses,
        ResourceKind::Inventories,
    ];

    /// URL path segment, e.g. `/products`.
    pub fn path(&self) -> &'static str {
        match self {
            ResourceKind::Categories => "categories",
            ResourceKind::Products => "products",
            ResourceKind::Suppliers => "suppliers",
            ResourceKind::Warehouses => "warehouses",
            ResourceKind::Inventories => "inventories",
        }
    }

    /// Name of the primary-key field in the JSON payload.
    pub fn id_field(&self) -> &'static str {
        match self {
            ResourceKind::Categories => "categoryId",
            ResourceKind::Products => "productId",
            ResourceKind::Suppliers => "supplierId",
            ResourceKind::Warehouses => "warehouseId",
            ResourceKind::Inventories => "inventoryId",
        }
    }

    pub fn id_format(&self) -> IdFormat {
        match self {
            ResourceKind::Products | ResourceKind::Suppliers => IdFormat::Code,
            ResourceKind::Categories | ResourceKind::Warehouses | ResourceKind::Inventories => {
                IdFormat::Number
            }
        }
    }

    /// Only products and inventories accept `PUT` with a full entity body.
    pub fn supports_replace(&self) -> bool {
        matches!(self, ResourceKind::Products | ResourceKind::Inventories)
    }

    /// Parse a resource kind from its path segment (case-insensitive,
    /// singular forms accepted).
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        match lower.as_str() {
            "categories" | "category" => Some(ResourceKind::Categories),
            "products" | "product" => Some(ResourceKind::Products),
            "suppliers" | "supplier" => Some(ResourceKind::Suppliers),
            "warehouses" | "warehouse" => Some(ResourceKind::Warehouses),
            "inventories" | "inventory" => Some(ResourceKind::Inventories),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("{kind} ids are positive integers, got {value:?}")]
    NotANumber { kind: ResourceKind, value: String },

    #[error("{kind} ids are {expected}-character codes, got {value:?}")]
    BadCode {
        kind: ResourceKind,
        expected: usize,
        value: String,
    },

    #[error("{kind} expects a {expected:?} id")]
    WrongFormat { kind: ResourceKind, expected: IdFormat },
}

/// Primary key of a single resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    Number(i64),
    Code(String),
}

impl ResourceId {
    /// Parse user input into the id format expected by `kind`.
    pub fn parse(kind: ResourceKind, raw: &str) -> Result<Self, IdError> {
        let raw = raw.trim();
        match kind.id_format() {
            IdFormat::Number => match raw.parse::<i64>() {
                Ok(n) if n > 0 => Ok(ResourceId::Number(n)),
                _ => Err(IdError::NotANumber {
                    kind,
                    value: raw.to_string(),
                }),
            },
            IdFormat::Code => {
                if is_valid_code(raw) {
                    Ok(ResourceId::Code(raw.to_string()))
                } else {
                    Err(IdError::BadCode {
                        kind,
                        expected: CODE_ID_LENGTH,
                        value: raw.to_string(),
                    })
                }
            }
        }
    }

    /// Check that an already-typed id has the shape `kind` expects.
    pub fn check(&self, kind: ResourceKind) -> Result<(), IdError> {
        match (self, kind.id_format()) {
            (ResourceId::Number(n), IdFormat::Number) if *n > 0 => Ok(()),
            (ResourceId::Number(n), IdFormat::Number) => Err(IdError::NotANumber {
                kind,
                value: n.to_string(),
            }),
            (ResourceId::Code(code), IdFormat::Code) if is_valid_code(code) => Ok(()),
            (ResourceId::Code(code), IdFormat::Code) => Err(IdError::BadCode {
                kind,
                expected: CODE_ID_LENGTH,
                value: code.clone(),
            }),
            (_, expected) => Err(IdError::WrongFormat { kind, expected }),
        }
    }
}

/// Codes are used verbatim as a path segment, so they must not contain
/// whitespace or separators.
fn is_valid_code(s: &str) -> bool {
    s.chars().count() == CODE_ID_LENGTH
        && s.chars()
            .all(|c| !c.is_whitespace() && c != '/' && c != '?' && c != '#')
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Number(n) => write!(f, "{}", n),
            ResourceId::Code(code) => f.write_str(code),
        }
    }
}

impl From<i64> for ResourceId {
    fn from(n: i64) -> Self {
        ResourceId::Number(n)
    }
}

/// A typed entity served by one resource collection.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: ResourceKind;

    fn id(&self) -> ResourceId;
}
