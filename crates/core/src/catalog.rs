//! Static price catalog: products, fixed-fee services and soil-dependent
//! per-meter trenching rates. Built once at startup, read-only afterwards.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whole currency units (rubles). All pricing arithmetic stays integral.
pub type Money = i64;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceKey(pub String);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoilType {
    #[default]
    Sand,
    Clay,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub marketing_title: String,
    pub unit_price: Money,
    /// Product-specific installation price; the catalog's generic base
    /// installation price applies when absent.
    pub install_price: Option<Money>,
    #[serde(default)]
    pub specs: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    pub image: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceListEntry {
    pub key: ServiceKey,
    pub name: String,
    pub unit: String,
    pub unit_price: Money,
    #[serde(default)]
    pub description: Option<String>,
    /// One-line usage hint surfaced to the LLM prompt. Entries without a
    /// hint are not offered as extraction targets.
    #[serde(default)]
    pub hint: Option<String>,
}

pub const SERVICE_INSTALL_BASE: &str = "install_base";
pub const SERVICE_PIPE_SAND: &str = "pipe_sand";
pub const SERVICE_PIPE_CLAY: &str = "pipe_clay";
pub const SERVICE_DELIVERY: &str = "delivery_fix";
pub const SERVICE_DRILLING: &str = "diamond_drilling_40";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read catalog file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse catalog data: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("catalog has no products")]
    NoProducts,
    #[error("default product `{0}` is not in the catalog")]
    UnknownDefaultProduct(String),
    #[error("required price list entry `{0}` is missing")]
    MissingEntry(&'static str),
    #[error("`{name}` has a negative price {price}")]
    NegativePrice { name: String, price: Money },
    #[error("sand and clay trenching rates must differ")]
    IndistinctPipeRates,
}

#[derive(Debug, Deserialize)]
struct CatalogData {
    default_product: String,
    products: Vec<Product>,
    services: Vec<PriceListEntry>,
}

/// Immutable lookup table for products and priced services.
#[derive(Clone, Debug)]
pub struct Catalog {
    products: Vec<Product>,
    services: Vec<PriceListEntry>,
    default_product: usize,
    install_base: usize,
    pipe_sand: usize,
    pipe_clay: usize,
    delivery: usize,
    drilling: usize,
}

impl Catalog {
    /// The compiled-in catalog. Infallible because the embedded data is
    /// validated by the crate's own tests.
    pub fn builtin() -> Self {
        Self::from_toml_str(include_str!("../data/catalog.toml"))
            .expect("embedded catalog data must be valid")
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| CatalogError::ReadFile { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, CatalogError> {
        let data: CatalogData = toml::from_str(raw)?;
        Self::new(data.products, data.services, &data.default_product)
    }

    pub fn new(
        products: Vec<Product>,
        services: Vec<PriceListEntry>,
        default_product: &str,
    ) -> Result<Self, CatalogError> {
        if products.is_empty() {
            return Err(CatalogError::NoProducts);
        }

        for product in &products {
            if product.unit_price < 0 {
                return Err(CatalogError::NegativePrice {
                    name: product.name.clone(),
                    price: product.unit_price,
                });
            }
            if let Some(install_price) = product.install_price {
                if install_price < 0 {
                    return Err(CatalogError::NegativePrice {
                        name: product.name.clone(),
                        price: install_price,
                    });
                }
            }
        }
        for service in &services {
            if service.unit_price < 0 {
                return Err(CatalogError::NegativePrice {
                    name: service.name.clone(),
                    price: service.unit_price,
                });
            }
        }

        let default_product = products
            .iter()
            .position(|product| product.id.0 == default_product)
            .ok_or_else(|| CatalogError::UnknownDefaultProduct(default_product.to_string()))?;

        let position = |key: &'static str| {
            services
                .iter()
                .position(|service| service.key.0 == key)
                .ok_or(CatalogError::MissingEntry(key))
        };
        let install_base = position(SERVICE_INSTALL_BASE)?;
        let pipe_sand = position(SERVICE_PIPE_SAND)?;
        let pipe_clay = position(SERVICE_PIPE_CLAY)?;
        let delivery = position(SERVICE_DELIVERY)?;
        let drilling = position(SERVICE_DRILLING)?;

        if services[pipe_sand].unit_price == services[pipe_clay].unit_price {
            return Err(CatalogError::IndistinctPipeRates);
        }

        Ok(Self {
            products,
            services,
            default_product,
            install_base,
            pipe_sand,
            pipe_clay,
            delivery,
            drilling,
        })
    }

    /// Resolve a product id, silently falling back to the default product
    /// when the id is unknown. An unknown id is not an error: the intake
    /// side may hand us ids the catalog revision no longer carries.
    pub fn product(&self, id: &ProductId) -> &Product {
        self.products.iter().find(|product| &product.id == id).unwrap_or(self.default_product())
    }

    pub fn default_product(&self) -> &Product {
        &self.products[self.default_product]
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn services(&self) -> &[PriceListEntry] {
        &self.services
    }

    /// Look up a named service. Absence is `None`; the estimate builder
    /// routes unresolved keys to free-form handling.
    pub fn service(&self, key: &ServiceKey) -> Option<&PriceListEntry> {
        self.services.iter().find(|service| &service.key == key)
    }

    pub fn base_install(&self) -> &PriceListEntry {
        &self.services[self.install_base]
    }

    pub fn delivery(&self) -> &PriceListEntry {
        &self.services[self.delivery]
    }

    pub fn drilling(&self) -> &PriceListEntry {
        &self.services[self.drilling]
    }

    /// Soil selection is total: every `SoilType` maps to a rate.
    pub fn pipe_service(&self, soil: SoilType) -> &PriceListEntry {
        match soil {
            SoilType::Sand => &self.services[self.pipe_sand],
            SoilType::Clay => &self.services[self.pipe_clay],
        }
    }

    pub fn pipe_unit_price(&self, soil: SoilType) -> Money {
        self.pipe_service(soil).unit_price
    }

    /// (key, hint) pairs for the extraction prompt, in catalog order.
    pub fn service_hints(&self) -> Vec<(&str, &str)> {
        self.services
            .iter()
            .filter_map(|service| {
                service.hint.as_deref().map(|hint| (service.key.0.as_str(), hint))
            })
            .collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::{Catalog, CatalogError, ProductId, ServiceKey, SoilType};

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = Catalog::builtin();
        assert!(!catalog.products().is_empty());
        assert_eq!(catalog.default_product().id, ProductId("tver_08".to_string()));
    }

    #[test]
    fn unknown_product_falls_back_to_default() {
        let catalog = Catalog::builtin();
        let product = catalog.product(&ProductId("no_such_station".to_string()));
        assert_eq!(product.id, catalog.default_product().id);
    }

    #[test]
    fn unknown_service_is_none() {
        let catalog = Catalog::builtin();
        assert!(catalog.service(&ServiceKey("no_such_service".to_string())).is_none());
    }

    #[test]
    fn soil_rates_are_distinct_and_total() {
        let catalog = Catalog::builtin();
        assert_ne!(
            catalog.pipe_unit_price(SoilType::Sand),
            catalog.pipe_unit_price(SoilType::Clay)
        );
        assert_eq!(
            catalog.pipe_unit_price(SoilType::default()),
            catalog.pipe_unit_price(SoilType::Sand)
        );
    }

    #[test]
    fn service_hints_skip_well_known_entries_without_hints() {
        let catalog = Catalog::builtin();
        let hints = catalog.service_hints();
        assert!(hints.iter().any(|(key, _)| *key == "cable_laying"));
        assert!(!hints.iter().any(|(key, _)| *key == "install_base"));
    }

    #[test]
    fn rejects_catalog_missing_required_entry() {
        let raw = r#"
            default_product = "p1"

            [[products]]
            id = "p1"
            name = "P1"
            marketing_title = "t"
            unit_price = 100
            install_price = 10
            image = "p1.png"

            [[services]]
            key = "pipe_sand"
            name = "Trenching in sand"
            unit = "m"
            unit_price = 1500

            [[services]]
            key = "pipe_clay"
            name = "Trenching in clay"
            unit = "m"
            unit_price = 2000

            [[services]]
            key = "delivery_fix"
            name = "Delivery"
            unit = "pcs"
            unit_price = 5000

            [[services]]
            key = "diamond_drilling_40"
            name = "Diamond drilling"
            unit = "pcs"
            unit_price = 3500
        "#;
        let error = Catalog::from_toml_str(raw).expect_err("missing install_base must fail");
        assert!(matches!(error, CatalogError::MissingEntry("install_base")));
    }

    #[test]
    fn rejects_catalog_without_a_services_table() {
        let raw = r#"
            default_product = "p1"

            [[products]]
            id = "p1"
            name = "P1"
            marketing_title = "t"
            unit_price = 100
            install_price = 10
            image = "p1.png"
        "#;
        let error = Catalog::from_toml_str(raw).expect_err("missing services must fail");
        assert!(matches!(error, CatalogError::Parse(_)));
    }

    #[test]
    fn rejects_negative_price() {
        let mut services = Catalog::builtin().services().to_vec();
        services[0].unit_price = -1;
        let products = Catalog::builtin().products().to_vec();
        let error =
            Catalog::new(products, services, "tver_08").expect_err("negative price must fail");
        assert!(matches!(error, CatalogError::NegativePrice { .. }));
    }
}
