use smeta_core::catalog::Catalog;
use smeta_core::config::{AppConfig, LoadOptions};

pub fn run(json_output: bool) -> String {
    let catalog_path = AppConfig::load(LoadOptions::default())
        .ok()
        .and_then(|config| config.catalog.path);

    let catalog = match super::load_catalog(catalog_path.as_deref()) {
        Ok(catalog) => catalog,
        Err(error) => return format!("catalog failed to load: {error}"),
    };

    if json_output {
        let payload = serde_json::json!({
            "products": catalog.products(),
            "services": catalog.services(),
        });
        return serde_json::to_string_pretty(&payload)
            .unwrap_or_else(|error| format!("catalog serialization failed: {error}"));
    }

    render_human(&catalog)
}

fn render_human(catalog: &Catalog) -> String {
    let mut lines = Vec::new();

    lines.push("products:".to_string());
    for product in catalog.products() {
        let install = match product.install_price {
            Some(price) => format!("{price} rub install"),
            None => "base install".to_string(),
        };
        lines.push(format!(
            "- {} = {} ({} rub, {install})",
            product.id.0, product.name, product.unit_price
        ));
    }

    lines.push("services:".to_string());
    for service in catalog.services() {
        lines.push(format!(
            "- {} = {} ({} rub per {})",
            service.key.0, service.name, service.unit_price, service.unit
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_output_lists_builtin_products_and_services() {
        let output = run(false);

        assert!(output.contains("products:"), "output: {output}");
        assert!(output.contains("services:"), "output: {output}");
        assert!(output.contains("install_base"), "output: {output}");
    }

    #[test]
    fn json_output_parses_back() {
        let output = run(true);

        let payload: serde_json::Value = serde_json::from_str(&output).expect("json");
        assert!(!payload["products"].as_array().expect("products").is_empty());
        assert!(!payload["services"].as_array().expect("services").is_empty());
    }
}
