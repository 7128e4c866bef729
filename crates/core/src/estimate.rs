//! The estimate builder: a pure, deterministic transformation of one order
//! and the price catalog into an ordered list of priced line items plus a
//! grand total. No I/O, no randomness, no external calls; both document
//! renderers consume the same result.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{Catalog, Money, PriceListEntry};
use crate::order::{CustomItem, Order};

pub const FREE_FORM_NAME: &str = "Additional service";
pub const FREE_FORM_UNIT: &str = "pcs";

const STATION_UNIT: &str = "pcs";
const STATION_DESCRIPTION: &str =
    "Complete package: tank body, covers, compressor, filter media.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub unit: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total: Money,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimateResult {
    pub lines: Vec<LineItem>,
    pub grand_total: Money,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EstimateError {
    #[error("line `{name}` has negative unit price {price}")]
    NegativeUnitPrice { name: String, price: Money },
    #[error("amount overflow while totaling `{name}`")]
    AmountOverflow { name: String },
}

pub trait EstimateEngine: Send + Sync {
    fn build(&self, order: &Order, catalog: &Catalog) -> Result<EstimateResult, EstimateError>;
}

#[derive(Default)]
pub struct DeterministicEstimateEngine;

impl EstimateEngine for DeterministicEstimateEngine {
    fn build(&self, order: &Order, catalog: &Catalog) -> Result<EstimateResult, EstimateError> {
        build_estimate(order, catalog)
    }
}

/// Assemble the priced line items for an order in fixed emission order:
/// station, base installation, trenching, delivery, drilling (conditional),
/// then custom items in input order.
pub fn build_estimate(order: &Order, catalog: &Catalog) -> Result<EstimateResult, EstimateError> {
    let mut lines = Vec::with_capacity(5 + order.custom_items.len());

    let product = catalog.product(&order.product_id);
    lines.push(line(
        format!("Treatment station {}", product.name),
        Some(STATION_DESCRIPTION.to_string()),
        STATION_UNIT.to_string(),
        1,
        product.unit_price,
    )?);

    let base_install = catalog.base_install();
    lines.push(line(
        base_install.name.clone(),
        base_install.description.clone(),
        base_install.unit.clone(),
        1,
        product.install_price.unwrap_or(base_install.unit_price),
    )?);

    // Trenching is always present, even for zero meters: the row documents
    // that the run was priced, not forgotten.
    let pipe = catalog.pipe_service(order.soil);
    lines.push(service_line(pipe, order.pipe_length_m)?);

    lines.push(service_line(catalog.delivery(), 1)?);

    if order.diamond_drilling {
        lines.push(service_line(catalog.drilling(), 1)?);
    }

    for item in &order.custom_items {
        lines.push(custom_line(item, catalog)?);
    }

    let mut grand_total: Money = 0;
    for item in &lines {
        grand_total = grand_total
            .checked_add(item.total)
            .ok_or_else(|| EstimateError::AmountOverflow { name: item.name.clone() })?;
    }

    Ok(EstimateResult { lines, grand_total })
}

fn custom_line(item: &CustomItem, catalog: &Catalog) -> Result<LineItem, EstimateError> {
    match item {
        CustomItem::CatalogRef { service_key, name, unit_price, qty } => {
            match catalog.service(service_key) {
                // Catalog name/unit/price take precedence over anything the
                // intake side supplied alongside the key.
                Some(service) => service_line(service, normalize_qty(*qty)),
                // Unresolved key: price the item from whatever the intake
                // side supplied, as for a free-form item.
                None => free_form_line(name.as_deref(), *unit_price, *qty),
            }
        }
        CustomItem::FreeForm { name, unit_price, qty } => {
            free_form_line(name.as_deref(), *unit_price, *qty)
        }
    }
}

fn service_line(service: &PriceListEntry, quantity: u32) -> Result<LineItem, EstimateError> {
    line(
        service.name.clone(),
        service.description.clone(),
        service.unit.clone(),
        quantity,
        service.unit_price,
    )
}

fn free_form_line(
    name: Option<&str>,
    unit_price: Option<Money>,
    qty: Option<u32>,
) -> Result<LineItem, EstimateError> {
    line(
        name.unwrap_or(FREE_FORM_NAME).to_string(),
        None,
        FREE_FORM_UNIT.to_string(),
        normalize_qty(qty),
        unit_price.unwrap_or(0),
    )
}

fn line(
    name: String,
    description: Option<String>,
    unit: String,
    quantity: u32,
    unit_price: Money,
) -> Result<LineItem, EstimateError> {
    if unit_price < 0 {
        return Err(EstimateError::NegativeUnitPrice { name, price: unit_price });
    }
    let total = unit_price
        .checked_mul(Money::from(quantity))
        .ok_or_else(|| EstimateError::AmountOverflow { name: name.clone() })?;

    Ok(LineItem { name, description, unit, quantity, unit_price, total })
}

/// Absent or non-positive quantities mean "one of it".
fn normalize_qty(qty: Option<u32>) -> u32 {
    match qty {
        Some(qty) if qty > 0 => qty,
        _ => 1,
    }
}
