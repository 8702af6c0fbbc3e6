//! Catalog entities: categories, products and suppliers.

use serde::{Deserialize, Serialize};

use super::resource::{Resource, ResourceId, ResourceKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub category_id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Resource for Category {
    const KIND: ResourceKind = ResourceKind::Categories;

    fn id(&self) -> ResourceId {
        ResourceId::Number(self.category_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub category_id: i64,
    pub supplier_id: String,
    pub unit_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Resource for Product {
    const KIND: ResourceKind = ResourceKind::Products;

    fn id(&self) -> ResourceId {
        ResourceId::Code(self.product_id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub supplier_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Supplier {
    /// Contact line for list views, falling back to whatever is present.
    pub fn contact_display(&self) -> String {
        match (&self.contact_email, &self.phone) {
            (Some(email), Some(phone)) => format!("{} / {}", email, phone),
            (Some(email), None) => email.clone(),
            (None, Some(phone)) => phone.clone(),
            (None, None) => "-".to_string(),
        }
    }
}

impl Resource for Supplier {
    const KIND: ResourceKind = ResourceKind::Suppliers;

    fn id(&self) -> ResourceId {
        ResourceId::Code(self.supplier_id.clone())
    }
}
