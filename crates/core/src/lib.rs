pub mod catalog;
pub mod config;
pub mod errors;
pub mod estimate;
pub mod order;
pub mod session;

pub use catalog::{
    Catalog, CatalogError, Money, PriceListEntry, Product, ProductId, ServiceKey, SoilType,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use estimate::{
    build_estimate, DeterministicEstimateEngine, EstimateEngine, EstimateError, EstimateResult,
    LineItem,
};
pub use order::{CustomItem, Order, OrderError, OrderPatch};
pub use session::{ChatId, SessionStore};
