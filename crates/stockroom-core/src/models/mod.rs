//! Data models for grocery inventory entities.
//!
//! This module contains the resource types served by the inventory API:
//!
//! - `Category`, `Product`, `Supplier`: the catalog
//! - `Warehouse`, `Inventory`: stock locations and quantities
//! - `ResourceKind`, `ResourceId`: per-type routing and identifier rules
//!
//! The cache layer treats all of these as opaque JSON; only the typed
//! resource client deserializes them.

pub mod catalog;
pub mod resource;
pub mod storage;

pub use catalog::{Category, Product, Supplier};
pub use resource::{IdError, IdFormat, Resource, ResourceId, ResourceKind};
pub use storage::{Inventory, Warehouse};
