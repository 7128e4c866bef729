//! The normalized job description driving pricing and document generation.
//!
//! Orders arrive from intake (chat extraction or the web form), live in the
//! session store while the user corrects them, and end their life when the
//! user confirms (documents generated) or cancels.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{Money, ProductId, ServiceKey, SoilType};

pub const UNSPECIFIED: &str = "unspecified";
pub const DEFAULT_PRODUCT: &str = "tver_08";
pub const DEFAULT_PIPE_LENGTH_M: u32 = 5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(default = "unspecified")]
    pub client_name: String,
    #[serde(default = "unspecified")]
    pub address: String,
    #[serde(default = "default_product_id")]
    pub product_id: ProductId,
    #[serde(default)]
    pub soil: SoilType,
    #[serde(default = "default_pipe_length", rename = "pipe_length")]
    pub pipe_length_m: u32,
    #[serde(default)]
    pub diamond_drilling: bool,
    #[serde(default)]
    pub custom_items: Vec<CustomItem>,
}

/// A user- or model-supplied addition to the order. The two resolution
/// paths are explicit variants rather than runtime field-presence checks:
/// either a reference into the price catalog, or a fully free-form item.
/// A catalog reference still carries any supplied name and price so they
/// survive when the key fails to resolve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomItem {
    CatalogRef {
        service_key: ServiceKey,
        #[serde(default)]
        name: Option<String>,
        #[serde(default, rename = "price")]
        unit_price: Option<Money>,
        #[serde(default)]
        qty: Option<u32>,
    },
    FreeForm {
        #[serde(default)]
        name: Option<String>,
        #[serde(default, rename = "price")]
        unit_price: Option<Money>,
        #[serde(default)]
        qty: Option<u32>,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("custom item `{name}` has negative unit price {price}")]
    NegativeUnitPrice { name: String, price: Money },
    #[error("pipe length {0} m is implausible")]
    PipeLengthOutOfRange(u32),
}

/// Upper bound used purely as a data-entry sanity check.
const MAX_PIPE_LENGTH_M: u32 = 1_000;

impl Default for Order {
    fn default() -> Self {
        Self {
            client_name: unspecified(),
            address: unspecified(),
            product_id: default_product_id(),
            soil: SoilType::default(),
            pipe_length_m: DEFAULT_PIPE_LENGTH_M,
            diamond_drilling: false,
            custom_items: Vec::new(),
        }
    }
}

impl Order {
    /// Reject malformed priced input instead of silently defaulting it.
    /// Absent quantities are not an error: the estimate builder treats
    /// them as 1.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.pipe_length_m > MAX_PIPE_LENGTH_M {
            return Err(OrderError::PipeLengthOutOfRange(self.pipe_length_m));
        }

        for item in &self.custom_items {
            let (name, price) = match item {
                CustomItem::FreeForm { name, unit_price: Some(price), .. }
                | CustomItem::CatalogRef { name, unit_price: Some(price), .. } => (name, *price),
                _ => continue,
            };
            if price < 0 {
                return Err(OrderError::NegativeUnitPrice {
                    name: name.clone().unwrap_or_else(unspecified),
                    price,
                });
            }
        }

        Ok(())
    }

    /// Apply a correction: scalar fields are overwritten when the patch
    /// carries them, custom items are appended, never removed.
    pub fn apply(&mut self, patch: OrderPatch) {
        if let Some(client_name) = patch.client_name {
            self.client_name = client_name;
        }
        if let Some(address) = patch.address {
            self.address = address;
        }
        if let Some(product_id) = patch.product_id {
            self.product_id = product_id;
        }
        if let Some(soil) = patch.soil {
            self.soil = soil;
        }
        if let Some(pipe_length_m) = patch.pipe_length_m {
            self.pipe_length_m = pipe_length_m;
        }
        if let Some(diamond_drilling) = patch.diamond_drilling {
            self.diamond_drilling = diamond_drilling;
        }
        self.custom_items.extend(patch.custom_items);
    }
}

/// Field-level correction to an existing order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderPatch {
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub soil: Option<SoilType>,
    #[serde(default, rename = "pipe_length")]
    pub pipe_length_m: Option<u32>,
    #[serde(default)]
    pub diamond_drilling: Option<bool>,
    #[serde(default)]
    pub custom_items: Vec<CustomItem>,
}

fn unspecified() -> String {
    UNSPECIFIED.to_string()
}

fn default_product_id() -> ProductId {
    ProductId(DEFAULT_PRODUCT.to_string())
}

fn default_pipe_length() -> u32 {
    DEFAULT_PIPE_LENGTH_M
}

#[cfg(test)]
mod tests {
    use crate::catalog::{ProductId, ServiceKey, SoilType};

    use super::{CustomItem, Order, OrderError, OrderPatch};

    #[test]
    fn deserializes_partial_json_with_defaults() {
        let order: Order =
            serde_json::from_str(r#"{"client_name": "Ivan", "soil": "clay"}"#).expect("order");
        assert_eq!(order.client_name, "Ivan");
        assert_eq!(order.address, "unspecified");
        assert_eq!(order.product_id, ProductId("tver_08".to_string()));
        assert_eq!(order.soil, SoilType::Clay);
        assert_eq!(order.pipe_length_m, 5);
        assert!(!order.diamond_drilling);
        assert!(order.custom_items.is_empty());
    }

    #[test]
    fn service_key_presence_selects_catalog_ref_variant() {
        let item: CustomItem =
            serde_json::from_str(r#"{"service_key": "cable_laying", "qty": 3}"#).expect("item");
        assert_eq!(
            item,
            CustomItem::CatalogRef {
                service_key: ServiceKey("cable_laying".to_string()),
                name: None,
                unit_price: None,
                qty: Some(3),
            }
        );
    }

    #[test]
    fn conflicting_name_and_price_still_resolve_to_catalog_ref() {
        let item: CustomItem = serde_json::from_str(
            r#"{"service_key": "cable_laying", "name": "Cheap cable", "price": 1, "qty": 2}"#,
        )
        .expect("item");
        assert_eq!(
            item,
            CustomItem::CatalogRef {
                service_key: ServiceKey("cable_laying".to_string()),
                name: Some("Cheap cable".to_string()),
                unit_price: Some(1),
                qty: Some(2),
            }
        );
    }

    #[test]
    fn free_form_item_without_key() {
        let item: CustomItem =
            serde_json::from_str(r#"{"name": "Remove old structure", "price": 3000}"#)
                .expect("item");
        assert_eq!(
            item,
            CustomItem::FreeForm {
                name: Some("Remove old structure".to_string()),
                unit_price: Some(3000),
                qty: None,
            }
        );
    }

    #[test]
    fn non_numeric_pipe_length_is_rejected_at_the_boundary() {
        assert!(serde_json::from_str::<Order>(r#"{"pipe_length": "twelve"}"#).is_err());
    }

    #[test]
    fn negative_pipe_length_is_rejected_at_the_boundary() {
        assert!(serde_json::from_str::<Order>(r#"{"pipe_length": -3}"#).is_err());
    }

    #[test]
    fn unknown_soil_is_rejected_at_the_boundary() {
        assert!(serde_json::from_str::<Order>(r#"{"soil": "granite"}"#).is_err());
    }

    #[test]
    fn validate_rejects_negative_free_form_price() {
        let order = Order {
            custom_items: vec![CustomItem::FreeForm {
                name: Some("Remove shed".to_string()),
                unit_price: Some(-500),
                qty: None,
            }],
            ..Order::default()
        };
        assert_eq!(
            order.validate(),
            Err(OrderError::NegativeUnitPrice { name: "Remove shed".to_string(), price: -500 })
        );
    }

    #[test]
    fn validate_rejects_negative_price_on_a_keyed_item() {
        let order = Order {
            custom_items: vec![CustomItem::CatalogRef {
                service_key: ServiceKey("no_such_service".to_string()),
                name: Some("Remove shed".to_string()),
                unit_price: Some(-1),
                qty: None,
            }],
            ..Order::default()
        };
        assert_eq!(
            order.validate(),
            Err(OrderError::NegativeUnitPrice { name: "Remove shed".to_string(), price: -1 })
        );
    }

    #[test]
    fn correction_overwrites_fields_and_appends_custom_items() {
        let mut order = Order {
            custom_items: vec![CustomItem::FreeForm {
                name: Some("Old item".to_string()),
                unit_price: Some(1000),
                qty: None,
            }],
            ..Order::default()
        };

        order.apply(OrderPatch {
            diamond_drilling: Some(true),
            pipe_length_m: Some(12),
            custom_items: vec![CustomItem::CatalogRef {
                service_key: ServiceKey("socket_install".to_string()),
                name: None,
                unit_price: None,
                qty: None,
            }],
            ..OrderPatch::default()
        });

        assert!(order.diamond_drilling);
        assert_eq!(order.pipe_length_m, 12);
        assert_eq!(order.custom_items.len(), 2);
        assert!(matches!(order.custom_items[0], CustomItem::FreeForm { .. }));
    }

    #[test]
    fn negation_correction_clears_the_drilling_flag() {
        let mut order = Order { diamond_drilling: true, ..Order::default() };
        order.apply(OrderPatch { diamond_drilling: Some(false), ..OrderPatch::default() });
        assert!(!order.diamond_drilling);
    }
}
