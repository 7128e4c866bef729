//! Template context assembly: flatten an order, its priced estimate, and the
//! catalog product card into the JSON shape the Tera templates expect.

use std::path::Path;

use serde_json::json;

use smeta_core::catalog::{Catalog, SoilType};
use smeta_core::config::CompanyConfig;
use smeta_core::estimate::EstimateResult;
use smeta_core::order::Order;

pub fn soil_label(soil: SoilType) -> &'static str {
    match soil {
        SoilType::Sand => "Sand (standard)",
        SoilType::Clay => "Clay/loam (difficult ground)",
    }
}

/// Build the rendering context shared by both document templates.
///
/// The product card always resolves: an unknown product id falls back to the
/// catalog default, same as pricing does.
pub fn document_context(
    order: &Order,
    catalog: &Catalog,
    estimate: &EstimateResult,
    company: &CompanyConfig,
    asset_dir: &Path,
) -> tera::Context {
    let product = catalog.product(&order.product_id);

    let lines: Vec<serde_json::Value> = estimate
        .lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            json!({
                "n": index + 1,
                "name": line.name,
                "description": line.description,
                "unit": line.unit,
                "quantity": line.quantity,
                "unit_price": line.unit_price,
                "total": line.total,
            })
        })
        .collect();

    let mut context = tera::Context::new();
    context.insert("company", company);
    context.insert(
        "client",
        &json!({
            "name": order.client_name,
            "address": order.address,
        }),
    );
    context.insert(
        "site",
        &json!({
            "soil": soil_label(order.soil),
            "pipe_length_m": order.pipe_length_m,
        }),
    );
    context.insert(
        "product",
        &json!({
            "name": product.name,
            "marketing_title": product.marketing_title,
            "specs": product.specs,
            "features": product.features,
            "image": asset_dir.join(&product.image).to_string_lossy(),
        }),
    );
    context.insert("lines", &lines);
    context.insert("grand_total", &estimate.grand_total);
    context.insert("date", &chrono::Local::now().format("%d.%m.%Y").to_string());
    context
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use smeta_core::catalog::{Catalog, ProductId, SoilType};
    use smeta_core::config::CompanyConfig;
    use smeta_core::estimate::build_estimate;
    use smeta_core::order::Order;

    use super::{document_context, soil_label};

    fn company() -> CompanyConfig {
        CompanyConfig {
            name: "VLG Septik".to_string(),
            phone: "+7 (960) 879-13-62".to_string(),
            email: "vlg-septik@yandex.ru".to_string(),
            website: "www.vlg-septik.ru".to_string(),
        }
    }

    #[test]
    fn context_carries_numbered_lines_and_total() {
        let catalog = Catalog::builtin();
        let order = Order::default();
        let estimate = build_estimate(&order, &catalog).expect("estimate");

        let context =
            document_context(&order, &catalog, &estimate, &company(), Path::new("assets"));
        let value = context.into_json();

        let lines = value["lines"].as_array().expect("lines array");
        assert_eq!(lines.len(), estimate.lines.len());
        assert_eq!(lines[0]["n"], 1);
        assert_eq!(value["grand_total"], estimate.grand_total);
        assert_eq!(value["site"]["pipe_length_m"], 5);
    }

    #[test]
    fn unknown_product_renders_the_default_card() {
        let catalog = Catalog::builtin();
        let order = Order { product_id: ProductId("gone".to_string()), ..Order::default() };
        let estimate = build_estimate(&order, &catalog).expect("estimate");

        let context =
            document_context(&order, &catalog, &estimate, &company(), Path::new("assets"));
        let value = context.into_json();

        assert_eq!(value["product"]["name"], catalog.default_product().name);
    }

    #[test]
    fn soil_labels_are_distinct() {
        assert_ne!(soil_label(SoilType::Sand), soil_label(SoilType::Clay));
    }
}
