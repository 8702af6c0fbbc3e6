//! Stock locations and quantities.

use serde::{Deserialize, Serialize};

use super::resource::{Resource, ResourceId, ResourceKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Warehouse {
    pub warehouse_id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Resource for Warehouse {
    const KIND: ResourceKind = ResourceKind::Warehouses;

    fn id(&self) -> ResourceId {
        ResourceId::Number(self.warehouse_id)
    }
}

/// Quantity of one product held at one warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub inventory_id: i64,
    pub product_id: String,
    pub warehouse_id: i64,
    pub quantity: i64,
}

impl Inventory {
    pub fn is_out_of_stock(&self) -> bool {
        self.quantity <= 0
    }
}

impl Resource for Inventory {
    const KIND: ResourceKind = ResourceKind::Inventories;

    fn id(&self) -> ResourceId {
        ResourceId::Number(self.inventory_id)
    }
}
